use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;

/// Text of one page; `text` may be empty for image-only or blank pages.
#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    /// Returns every page of the document in page order, including blank ones.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let parse_error = |details: String| IngestError::PdfParse {
            path: path.display().to_string(),
            details,
        };

        let document = Document::load(path).map_err(|error| parse_error(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| parse_error(format!("page {page_no}: {error}")))?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, IngestError> {
    LopdfExtractor.extract_pages(path)
}


#[cfg(test)]
mod tests {
    use super::fixtures::write_text_pdf;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lopdf_extractor_keeps_blank_pages() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("doc.pdf");
        write_text_pdf(&path, &["Hello world", ""]);

        let pages = extract_page_texts(&path)?;

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("Hello"));
        assert!(pages[1].text.trim().is_empty());
        Ok(())
    }

    #[test]
    fn unreadable_pdf_is_a_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\n%broken")?;

        let result = extract_page_texts(&path);
        assert!(matches!(result, Err(IngestError::PdfParse { .. })));
        Ok(())
    }
}
