use crate::error::{IngestError, Result};
use crate::extractor::PdfExtractor;
use crate::models::{count_words, Extraction, Passage, PdfStats};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// PDFs directly inside `folder`, sorted by path. Subdirectories are not searched.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        } else {
            debug!(path = %entry.path().display(), "ignoring non-pdf file");
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Content fingerprint of the PDF set in `folder`: names and bytes of every file.
pub fn fingerprint_folder(folder: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    for path in discover_pdf_files(folder) {
        let name = file_name(&path)?;
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(digest_file(&path)?.as_bytes());
        hasher.update([b'\n']);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Extracts passages and per-file stats from every PDF in `folder`.
///
/// Blank pages count toward `pages` but produce no passage. The first file
/// that fails to parse aborts the whole pass.
pub fn extract_folder(
    folder: &Path,
    extractor: &dyn PdfExtractor,
) -> Result<Extraction> {
    let mut passages = Vec::new();
    let mut stats = Vec::new();

    for path in discover_pdf_files(folder) {
        let filename = file_name(&path)?.to_string();
        let pages = extractor.extract_pages(&path)?;
        let total_pages = pages.len() as u32;
        let mut word_count = 0u64;

        for page in pages {
            if page.text.trim().is_empty() {
                continue;
            }

            let words = count_words(&page.text);
            word_count += words;
            passages.push(Passage {
                source: filename.clone(),
                page: page.number,
                words,
                total_pages,
                total_words: word_count,
                text: page.text,
            });
        }

        info!(file = %filename, pages = total_pages, words = word_count, "extracted pdf");
        stats.push(PdfStats {
            filename,
            pages: total_pages,
            words: word_count,
        });
    }

    Ok(Extraction { passages, stats })
}

fn file_name(path: &Path) -> Result<&str> {
    path.file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::{digest_file, discover_pdf_files, extract_folder, fingerprint_folder};
    use crate::error::IngestError;
    use crate::extractor::fixtures::write_text_pdf;
    use crate::extractor::{LopdfExtractor, PageText, PdfExtractor};
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    struct FakeExtractor {
        pages: HashMap<String, Vec<&'static str>>,
    }

    impl PdfExtractor for FakeExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let pages = self
                .pages
                .get(name)
                .ok_or_else(|| IngestError::PdfParse {
                    path: name.to_string(),
                    details: "unknown".to_string(),
                })?;
            Ok(pages
                .iter()
                .enumerate()
                .map(|(index, text)| PageText {
                    number: index as u32 + 1,
                    text: text.to_string(),
                })
                .collect())
        }
    }

    #[test]
    fn discovery_is_flat_and_sorted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(dir.path().join("b.pdf"), b"x")?;
        fs::write(dir.path().join("A.PDF"), b"x")?;
        fs::write(dir.path().join("notes.txt"), b"x")?;
        fs::write(nested.join("c.pdf"), b"x")?;

        let files = discover_pdf_files(dir.path());
        let names: Vec<_> = files
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .collect();
        assert_eq!(names, vec!["A.PDF", "b.pdf"]);
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.pdf");
        fs::write(&file_path, b"abc")?;

        assert_eq!(digest_file(&file_path)?, digest_file(&file_path)?);
        Ok(())
    }

    #[test]
    fn fingerprint_tracks_file_content() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.pdf"), b"one")?;
        let first = fingerprint_folder(dir.path())?;
        assert_eq!(first, fingerprint_folder(dir.path())?);

        fs::write(dir.path().join("a.pdf"), b"two")?;
        assert_ne!(first, fingerprint_folder(dir.path())?);
        Ok(())
    }

    #[test]
    fn stats_match_passage_word_counts() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.pdf"), b"x")?;
        fs::write(dir.path().join("b.pdf"), b"x")?;
        let extractor = FakeExtractor {
            pages: HashMap::from([
                ("a.pdf".to_string(), vec!["one two", "  \n", "three four five"]),
                ("b.pdf".to_string(), vec!["solo"]),
            ]),
        };

        let extraction = extract_folder(dir.path(), &extractor)?;

        assert_eq!(extraction.stats.len(), 2);
        assert_eq!(extraction.stats[0].filename, "a.pdf");
        assert_eq!(extraction.stats[0].pages, 3);
        assert_eq!(extraction.stats[0].words, 5);
        assert_eq!(extraction.passages.len(), 3);

        for stats in &extraction.stats {
            let passages: Vec<_> = extraction
                .passages
                .iter()
                .filter(|passage| passage.source == stats.filename)
                .collect();
            let sum: u64 = passages.iter().map(|passage| passage.words).sum();
            assert_eq!(sum, stats.words);
            assert_eq!(passages.last().map(|p| p.total_words), Some(stats.words));
        }

        assert_eq!(extraction.passages[1].page, 3);
        assert_eq!(extraction.passages[1].total_words, 5);
        Ok(())
    }

    #[test]
    fn one_bad_file_aborts_the_pass() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        write_text_pdf(&dir.path().join("good.pdf"), &["Hello world"]);
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let result = extract_folder(dir.path(), &LopdfExtractor);
        assert!(matches!(result, Err(IngestError::PdfParse { .. })));
        Ok(())
    }

    #[test]
    fn empty_folder_yields_empty_extraction() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let extraction = extract_folder(dir.path(), &LopdfExtractor)?;
        assert!(extraction.passages.is_empty());
        assert!(extraction.stats.is_empty());
        Ok(())
    }

    #[test]
    fn two_page_document_totals() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        write_text_pdf(&dir.path().join("doc.pdf"), &["Hello world", "Foo bar baz"]);

        let extraction = extract_folder(dir.path(), &LopdfExtractor)?;

        assert_eq!(extraction.stats.len(), 1);
        assert_eq!(extraction.stats[0].filename, "doc.pdf");
        assert_eq!(extraction.stats[0].pages, 2);
        assert_eq!(extraction.stats[0].words, 5);
        Ok(())
    }
}
