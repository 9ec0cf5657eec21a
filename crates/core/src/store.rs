use crate::error::SyncError;
use crate::presign::PresignedPost;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A bucket of objects addressed by flat keys.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    async fn list_keys(&self) -> Result<Vec<String>, SyncError>;

    /// Writes the object's bytes to `dest`, replacing anything there.
    async fn download(&self, key: &str, dest: &Path) -> Result<(), SyncError>;

    fn presign_upload(&self, key: &str) -> Result<PresignedPost, SyncError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub downloaded: Vec<String>,
    pub skipped: Vec<String>,
}

/// Keys that map onto a single file name inside the mirror directory.
pub fn is_flat_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains('/')
        && !key.contains('\\')
}

/// Mirrors `store` into `local_dir`, fetching only keys with no local file of the same name.
///
/// Existing files are never refreshed, even when the remote object changed.
pub async fn sync_bucket(store: &dyn ObjectStore, local_dir: &Path) -> Result<SyncReport, SyncError> {
    tokio::fs::create_dir_all(local_dir).await?;

    let mut report = SyncReport::default();
    for key in store.list_keys().await? {
        if !is_flat_key(&key) {
            warn!(bucket = store.bucket(), key = %key, "skipping nested object key");
            report.skipped.push(key);
            continue;
        }

        let dest = local_dir.join(&key);
        if tokio::fs::try_exists(&dest).await? {
            debug!(key = %key, "already mirrored");
            report.skipped.push(key);
            continue;
        }

        info!(bucket = store.bucket(), key = %key, "downloading object");
        let staging = staging_path(local_dir, &key);
        if let Err(error) = store.download(&key, &staging).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(error);
        }
        tokio::fs::rename(&staging, &dest).await?;
        report.downloaded.push(key);
    }

    info!(
        downloaded = report.downloaded.len(),
        skipped = report.skipped.len(),
        dir = %local_dir.display(),
        "bucket sync finished"
    );
    Ok(report)
}

fn staging_path(local_dir: &Path, key: &str) -> PathBuf {
    local_dir.join(format!(".{key}.part"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryObjectStore;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn second_sync_downloads_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = MemoryObjectStore::new("bucket");
        store.insert("a.pdf", b"first".to_vec());
        store.insert("b.pdf", b"second".to_vec());

        let first = sync_bucket(&store, dir.path()).await?;
        assert_eq!(first.downloaded, vec!["a.pdf", "b.pdf"]);
        assert_eq!(store.download_count(), 2);

        let second = sync_bucket(&store, dir.path()).await?;
        assert!(second.downloaded.is_empty());
        assert_eq!(second.skipped, vec!["a.pdf", "b.pdf"]);
        assert_eq!(store.download_count(), 2);
        assert_eq!(fs::read(dir.path().join("a.pdf"))?, b"first");

        let mut names: Vec<_> = fs::read_dir(dir.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
        Ok(())
    }

    #[tokio::test]
    async fn existing_local_files_are_not_refreshed() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.pdf"), b"stale")?;
        let store = MemoryObjectStore::new("bucket");
        store.insert("a.pdf", b"fresh".to_vec());

        let report = sync_bucket(&store, dir.path()).await?;

        assert!(report.downloaded.is_empty());
        assert_eq!(fs::read(dir.path().join("a.pdf"))?, b"stale");
        Ok(())
    }

    #[tokio::test]
    async fn nested_keys_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let store = MemoryObjectStore::new("bucket");
        store.insert("folder/", Vec::new());
        store.insert("../escape.pdf", b"x".to_vec());
        store.insert("ok.pdf", b"x".to_vec());

        let report = sync_bucket(&store, dir.path()).await?;

        assert_eq!(report.downloaded, vec!["ok.pdf"]);
        assert_eq!(report.skipped.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn creates_the_mirror_directory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let target = dir.path().join("data");
        let store = MemoryObjectStore::new("bucket");

        sync_bucket(&store, &target).await?;
        assert!(target.is_dir());
        Ok(())
    }

    #[test]
    fn flat_keys() {
        assert!(is_flat_key("report.pdf"));
        assert!(!is_flat_key("a/b.pdf"));
        assert!(!is_flat_key(".."));
        assert!(!is_flat_key(""));
    }
}
