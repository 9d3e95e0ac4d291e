//! Document text extraction, dispatched by file extension.
//!
//! Each format is a [`DocumentExtractor`]; the [`ExtractorRegistry`] maps
//! extension to extractor so new formats plug in without touching the
//! ingestion pipeline.

use std::{collections::HashMap, path::Path, sync::Arc};

use crate::error::{Error, Result};

/// Extracts raw text from one document format.
pub trait DocumentExtractor {
    /// Lowercase extensions (without the dot) this extractor handles.
    fn extensions(&self) -> &[&str];

    /// Extract the document's text.
    ///
    /// Fails with [`Error::NotFound`] for a missing file and
    /// [`Error::Extraction`] for malformed content.
    fn extract(&self, path: &Path) -> Result<String>;
}

/// Registry of extractors keyed by file extension.
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn DocumentExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    /// A registry with the built-in extractors: plain text and PDF.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TextExtractor);
        registry.register(PdfExtractor);
        registry
    }

    pub fn register<E: DocumentExtractor + 'static>(&mut self, extractor: E) {
        let extractor = Arc::new(extractor);
        for ext in extractor.extensions() {
            self.by_extension
                .insert((*ext).to_ascii_lowercase(), extractor.clone());
        }
    }

    /// Look up the extractor for a file, by its extension.
    pub fn get_for_file(&self, path: &Path) -> Option<Arc<dyn DocumentExtractor>> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(&ext).cloned()
    }

    /// Extract text from a file, failing with [`Error::Unsupported`] when no
    /// extractor handles its extension.
    pub fn extract(&self, path: &Path) -> Result<String> {
        let extractor = self
            .get_for_file(path)
            .ok_or_else(|| Error::Unsupported(path.to_path_buf()))?;
        extractor.extract(path)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Plain-text files: the content is the text.
pub struct TextExtractor;

impl DocumentExtractor for TextExtractor {
    fn extensions(&self) -> &[&str] {
        &["txt", "md"]
    }

    fn extract(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

/// PDF files, via `pdf-extract`, with cleanup for embedding.
pub struct PdfExtractor;

impl DocumentExtractor for PdfExtractor {
    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }

    fn extract(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let raw = pdf_extract::extract_text(path).map_err(|e| Error::Extraction {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(clean_pdf_text(&raw))
    }
}

/// Normalize extracted PDF text into one flat string suitable for chunking:
/// collapse whitespace runs, drop standalone digit tokens (page numbers),
/// and straighten curly quotes.
pub fn clean_pdf_text(raw: &str) -> String {
    let tokens: Vec<String> = raw
        .split_whitespace()
        .filter(|token| !token.chars().all(|c| c.is_ascii_digit()))
        .map(|token| {
            token
                .chars()
                .map(|c| match c {
                    '\u{201c}' | '\u{201d}' => '"',
                    '\u{2018}' | '\u{2019}' => '\'',
                    other => other,
                })
                .collect()
        })
        .collect();
    tokens.join(" ")
}
