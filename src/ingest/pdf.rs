//! PDF page loading
//!
//! Extracts the text of every page with `lopdf`. Pages are kept separate
//! so each chunk can cite the page it came from.

use std::path::{Path, PathBuf};

use lopdf::Document;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("failed to load {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("{} is encrypted", path.display())]
    Encrypted { path: PathBuf },
}

/// Text of one PDF page.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfPage {
    /// 1-based page number.
    pub page_number: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct PdfDocument {
    pub path: PathBuf,
    /// Pages in the file, including ones without extractable text.
    pub page_count: usize,
    /// Pages that produced text, in page order.
    pub pages: Vec<PdfPage>,
}

/// Load a PDF and extract the text of each page.
///
/// A page whose text cannot be decoded is logged and skipped; a file that
/// cannot be parsed at all is an error.
pub fn load_pdf(path: &Path) -> Result<PdfDocument, PdfError> {
    let doc = Document::load(path).map_err(|e| PdfError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if doc.is_encrypted() {
        return Err(PdfError::Encrypted {
            path: path.to_path_buf(),
        });
    }

    let page_numbers: Vec<u32> = doc.get_pages().into_keys().collect();
    let page_count = page_numbers.len();
    let mut pages = Vec::with_capacity(page_count);

    for page_number in page_numbers {
        match doc.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => pages.push(PdfPage { page_number, text }),
            Ok(_) => {}
            Err(e) => warn!(
                "Skipping page {page_number} of {}: {e}",
                path.display()
            ),
        }
    }

    Ok(PdfDocument {
        path: path.to_path_buf(),
        page_count,
        pages,
    })
}

/// Fixture writer shared by unit and integration tests.
#[doc(hidden)]
pub mod test_support {
    use std::path::Path;

    use anyhow::Result;
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    /// Write a minimal PDF with one Courier text line per page.
    /// An empty string produces a page without text.
    pub fn write_pdf(path: &Path, pages: &[&str]) -> Result<()> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let mut operations = Vec::new();
            if !text.is_empty() {
                operations = vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ];
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::write_pdf;
    use super::*;

    #[test]
    fn test_load_pdf_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.pdf");
        write_pdf(&path, &["Annual leave is granted yearly.", "", "Study leave with pay."]).unwrap();

        let doc = load_pdf(&path).unwrap();
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.pages.len(), 2, "blank page is skipped");
        assert_eq!(doc.pages[0].page_number, 1);
        assert!(doc.pages[0].text.contains("Annual leave"));
        assert_eq!(doc.pages[1].page_number, 3);
        assert!(doc.pages[1].text.contains("Study leave"));
    }

    #[test]
    fn test_load_pdf_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();

        let err = load_pdf(&path).unwrap_err();
        assert!(matches!(err, PdfError::Load { .. }));
    }
}
