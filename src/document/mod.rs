mod cleaner;
mod loader;
mod splitter;

pub use cleaner::clean_text;
pub use loader::{load_corpus, load_pdf_pages, load_text_file, Corpus, CorpusKind};
pub use splitter::{Chunk, TextSplitter};
