use crate::error::{RagError, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use std::fs;
use std::path::{Path, PathBuf};

/// Byte range of one page inside a document's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpan {
    /// 1-based page number
    pub number: usize,
    pub start: usize,
    pub end: usize,
}

/// Represents a document with its content and metadata
#[derive(Debug, Clone)]
pub struct Document {
    /// The document's file name (used as document ID)
    pub document_id: String,
    /// Where the document was read from
    pub path: PathBuf,
    /// The actual text content of the document
    pub content: String,
    /// The document's MIME type
    pub mime_type: String,
    /// Page boundaries; plain text files are a single page
    pub pages: Vec<PageSpan>,
}

impl Document {
    /// Create a new document from a file path
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let document_id = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| RagError::Document {
                path: path.to_path_buf(),
                reason: "invalid file name".to_string(),
            })?
            .to_string();

        // Detect MIME type
        let mime_type = from_path(path).first_or_octet_stream().to_string();
        debug!("Detected MIME type: {}", mime_type);

        let (content, pages) = read_document_content(path, &mime_type)?;

        Ok(Document {
            document_id,
            path: path.to_path_buf(),
            content,
            mime_type,
            pages,
        })
    }

    /// Build a single-page document from in-memory text
    pub fn from_text(document_id: impl Into<String>, content: impl Into<String>) -> Self {
        let document_id = document_id.into();
        let content = content.into();
        let pages = vec![PageSpan {
            number: 1,
            start: 0,
            end: content.len(),
        }];

        Document {
            path: PathBuf::from(&document_id),
            document_id,
            content,
            mime_type: "text/plain".to_string(),
            pages,
        }
    }

    /// Page number containing the given byte offset
    pub fn page_at(&self, offset: usize) -> Option<usize> {
        if offset > self.content.len() {
            return None;
        }
        // Offsets in a page separator belong to the preceding page
        self.pages
            .iter()
            .rev()
            .find(|page| page.start <= offset)
            .map(|page| page.number)
    }
}

/// Whether the loader knows how to extract text from this MIME type
pub fn is_supported(mime_type: &str) -> bool {
    mime_type.starts_with("application/pdf") || mime_type.starts_with("text/")
}

/// Load every supported document from a folder, sorted by file name
pub fn load_folder<P: AsRef<Path>>(folder: P) -> Result<Vec<Document>> {
    let folder = folder.as_ref();

    if !folder.exists() {
        return Err(RagError::NotFound(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(RagError::Configuration(format!(
            "source path is not a directory: {}",
            folder.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }

        let mime_type = from_path(&path).first_or_octet_stream();
        if is_supported(mime_type.essence_str()) {
            paths.push(path);
        } else {
            debug!("Skipping unsupported file: {}", path.display());
        }
    }

    if paths.is_empty() {
        return Err(RagError::EmptyInput(format!(
            "no PDF or text files in {}",
            folder.display()
        )));
    }

    paths.sort();

    let documents = paths
        .iter()
        .map(Document::from_file)
        .collect::<Result<Vec<_>>>()?;

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        folder.display()
    );

    Ok(documents)
}

/// Read content from a document based on its MIME type
pub fn read_document_content<P: AsRef<Path>>(
    file_path: P,
    mime_type: &str,
) -> Result<(String, Vec<PageSpan>)> {
    let path = file_path.as_ref();

    match mime_type {
        // Handle PDF documents
        mime if mime.starts_with("application/pdf") => {
            info!("Processing PDF document: {}", path.display());
            let pages =
                pdf_extract::extract_text_by_pages(path).map_err(|e| RagError::Document {
                    path: path.to_path_buf(),
                    reason: format!("failed to extract text from PDF: {}", e),
                })?;

            // PDF extraction can sometimes include excessive whitespace
            let pages: Vec<String> = pages.iter().map(|page| normalize_whitespace(page)).collect();
            let (content, spans) = join_pages(&pages);

            if content.trim().is_empty() {
                warn!(
                    "Extracted PDF content is empty or contains only whitespace: {}",
                    path.display()
                );
            }

            Ok((content, spans))
        }

        // Handle plain text documents
        mime if mime.starts_with("text/") => {
            info!("Processing text document: {}", path.display());
            let content = fs::read_to_string(path).map_err(|e| RagError::Document {
                path: path.to_path_buf(),
                reason: format!("failed to read text file: {}", e),
            })?;
            let spans = vec![PageSpan {
                number: 1,
                start: 0,
                end: content.len(),
            }];
            Ok((content, spans))
        }

        // Unsupported format
        _ => Err(RagError::Document {
            path: path.to_path_buf(),
            reason: format!(
                "unsupported document format: {}. Only text and PDF files are supported.",
                mime_type
            ),
        }),
    }
}

/// Concatenate pages with paragraph breaks, recording where each one lands
fn join_pages(pages: &[String]) -> (String, Vec<PageSpan>) {
    let mut content = String::new();
    let mut spans = Vec::with_capacity(pages.len());

    for (idx, page) in pages.iter().enumerate() {
        if idx > 0 {
            content.push_str("\n\n");
        }
        let start = content.len();
        content.push_str(page);
        spans.push(PageSpan {
            number: idx + 1,
            start,
            end: content.len(),
        });
    }

    (content, spans)
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    // Replace multiple consecutive newlines with double newlines (paragraph separator)
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                // Add at most two newlines (paragraph break)
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            // Don't add consecutive spaces
            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    normalized.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_whitespace() {
        let text = "This  has   multiple    spaces.\n\n\nAnd multiple newlines.\r\nAnd Windows line endings.";
        let expected =
            "This has multiple spaces.\n\nAnd multiple newlines.\nAnd Windows line endings.";
        assert_eq!(normalize_whitespace(text), expected);
    }

    #[test]
    fn test_join_pages_records_spans() {
        let pages = vec!["first".to_string(), "second".to_string()];
        let (content, spans) = join_pages(&pages);

        assert_eq!(content, "first\n\nsecond");
        assert_eq!(&content[spans[0].start..spans[0].end], "first");
        assert_eq!(&content[spans[1].start..spans[1].end], "second");
        assert_eq!(spans[1].number, 2);
    }

    #[test]
    fn test_page_at() {
        let doc = Document {
            document_id: "report.pdf".into(),
            path: PathBuf::from("report.pdf"),
            content: "first\n\nsecond".into(),
            mime_type: "application/pdf".into(),
            pages: join_pages(&["first".to_string(), "second".to_string()]).1,
        };

        assert_eq!(doc.page_at(0), Some(1));
        assert_eq!(doc.page_at(6), Some(1));
        assert_eq!(doc.page_at(8), Some(2));
        assert_eq!(doc.page_at(13), Some(2));
        assert_eq!(doc.page_at(100), None);
    }

    #[test]
    fn test_load_folder_missing() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");

        assert!(matches!(load_folder(&missing), Err(RagError::NotFound(_))));
    }

    #[test]
    fn test_load_folder_without_eligible_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("image.png"), [0u8, 1, 2]).unwrap();

        assert!(matches!(
            load_folder(tmp.path()),
            Err(RagError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_load_folder_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "bravo").unwrap();
        fs::write(tmp.path().join("a.md"), "alpha").unwrap();
        fs::write(tmp.path().join("c.bin"), [0u8, 159, 146]).unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();

        let docs = load_folder(tmp.path()).unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.document_id.as_str()).collect();

        assert_eq!(ids, vec!["a.md", "b.txt"]);
        assert_eq!(docs[1].content, "bravo");
        assert_eq!(docs[1].pages.len(), 1);
    }
}
