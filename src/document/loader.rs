use anyhow::{Context, Result};
use std::fs;
use std::ops::Range;
use std::path::Path;
use tracing::{info, warn};

use super::splitter::TextSplitter;
use crate::config::RagConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusKind {
    Pdf,
    Text,
}

impl CorpusKind {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("pdf") => CorpusKind::Pdf,
            _ => CorpusKind::Text,
        }
    }

    /// Chunk size and overlap, in characters.
    pub fn default_chunking(self) -> (usize, usize) {
        match self {
            CorpusKind::Pdf => (500, 50),
            CorpusKind::Text => (100, 50),
        }
    }
}

/// Raw page texts of a source document, in reading order.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub kind: CorpusKind,
    pub pages: Vec<String>,
}

impl Corpus {
    /// Splitter for this corpus, honouring any size/overlap override.
    pub fn splitter(&self, config: &RagConfig) -> TextSplitter {
        let (size, overlap) = self.kind.default_chunking();
        TextSplitter::new(
            config.chunk_size.unwrap_or(size),
            config.chunk_overlap.unwrap_or(overlap),
        )
    }
}

pub fn load_text_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read text file: {}", path.display()))?;
    Ok(vec![content])
}

fn page_window(total: usize, drop_first: usize, drop_last: usize) -> Range<usize> {
    let end = total.saturating_sub(drop_last);
    drop_first.min(end)..end
}

/// Per-page text of a PDF with front and back matter skipped.
pub fn load_pdf_pages(path: &Path, drop_first: usize, drop_last: usize) -> Result<Vec<String>> {
    let pages = pdf_extract::extract_text_by_pages(path)
        .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

    let window = page_window(pages.len(), drop_first, drop_last);
    if window.is_empty() {
        warn!(
            "{} has {} pages; nothing left after dropping {} + {}",
            path.display(),
            pages.len(),
            drop_first,
            drop_last
        );
    }

    Ok(pages[window].to_vec())
}

pub fn load_corpus(path: &Path, config: &RagConfig) -> Result<Corpus> {
    let kind = CorpusKind::from_path(path);
    info!("Loading {:?} corpus from {}", kind, path.display());

    let pages = match kind {
        CorpusKind::Pdf => {
            load_pdf_pages(path, config.drop_first_pages, config.drop_last_pages)?
        }
        CorpusKind::Text => load_text_file(path)?,
    };

    info!("Loaded {} page(s)", pages.len());
    Ok(Corpus { kind, pages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn page_window_skips_front_and_back_matter() {
        assert_eq!(page_window(20, 7, 5), 7..15);
        assert!(page_window(10, 7, 5).is_empty());
        assert_eq!(page_window(3, 0, 0), 0..3);
    }

    #[test]
    fn text_corpus_is_a_single_page() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "Logic gates are the basic building blocks of digital circuits.").unwrap();

        let corpus = load_corpus(file.path(), &RagConfig::default()).unwrap();
        assert_eq!(corpus.kind, CorpusKind::Text);
        assert_eq!(corpus.pages.len(), 1);
        assert!(corpus.pages[0].starts_with("Logic gates"));
    }

    #[test]
    fn extension_selects_chunking() {
        assert_eq!(CorpusKind::from_path(Path::new("book.PDF")), CorpusKind::Pdf);
        assert_eq!(CorpusKind::from_path(Path::new("notes.md")), CorpusKind::Text);

        let config = RagConfig {
            chunk_size: Some(800),
            ..RagConfig::default()
        };
        let corpus = Corpus {
            kind: CorpusKind::Pdf,
            pages: vec![],
        };
        let splitter = corpus.splitter(&config);
        assert_eq!((splitter.chunk_size(), splitter.chunk_overlap()), (800, 50));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_text_file(Path::new("/nonexistent/corpus.txt")).is_err());
    }
}
