use crate::error::SyncError;
use crate::presign::{PostPolicySigner, PresignedPost};
use crate::store::ObjectStore;
use crate::stores::sigv4::Credentials;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Bucket held in process memory. Upload descriptors are signed with fixed local credentials.
pub struct MemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    downloads: AtomicUsize,
    signer: PostPolicySigner,
}

impl MemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let signer = PostPolicySigner::new(
            bucket.clone(),
            "us-east-1",
            format!("memory://{bucket}/"),
            Credentials::new("memory-access-key", "memory-secret-key", None),
        );

        Self {
            bucket,
            objects: RwLock::new(BTreeMap::new()),
            downloads: AtomicUsize::new(0),
            signer,
        }
    }

    pub fn insert(&self, key: impl Into<String>, bytes: Vec<u8>) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(key.into(), bytes);
        }
    }

    /// Number of successful `download` calls so far.
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_keys(&self) -> Result<Vec<String>, SyncError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| SyncError::Listing("object map poisoned".to_string()))?;
        Ok(objects.keys().cloned().collect())
    }

    async fn download(&self, key: &str, dest: &Path) -> Result<(), SyncError> {
        let bytes = {
            let objects = self
                .objects
                .read()
                .map_err(|_| SyncError::Listing("object map poisoned".to_string()))?;
            objects
                .get(key)
                .cloned()
                .ok_or_else(|| SyncError::NotFound(key.to_string()))?
        };

        tokio::fs::write(dest, bytes).await?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn presign_upload(&self, key: &str) -> Result<PresignedPost, SyncError> {
        Ok(self.signer.presign_pdf_upload(key))
    }
}
