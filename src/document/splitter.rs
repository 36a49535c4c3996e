use serde::Serialize;
use std::collections::VecDeque;

use super::cleaner::clean_text;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A retrievable slice of the corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub text: String,
    /// 1-based, counted after front matter is dropped.
    pub page: usize,
    /// Position of the chunk within its page.
    pub index: usize,
}

/// Recursive character splitter.
///
/// Text is cut on the coarsest separator present (paragraphs, then lines,
/// then words, then characters); pieces that are still too long are split
/// again with the next separator. Neighbouring pieces are merged back into
/// chunks of at most `chunk_size` characters, each chunk repeating up to
/// `chunk_overlap` characters from the end of the previous one.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    /// Cleans every page and chunks it, numbering pages from 1.
    pub fn split_pages(&self, pages: &[String]) -> Vec<Chunk> {
        pages
            .iter()
            .enumerate()
            .flat_map(|(page_idx, page)| {
                self.split_text(&clean_text(page))
                    .into_iter()
                    .enumerate()
                    .map(move |(index, text)| Chunk {
                        text,
                        page: page_idx + 1,
                        index,
                    })
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|piece| !piece.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }
        chunks
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_joined(&mut chunks, &current, separator);

                // Keep a tail of the previous chunk as overlap.
                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(first) + if current.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if current.is_empty() { 0 } else { sep_len };
            current.push_back(piece);
        }

        push_joined(&mut chunks, &current, separator);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, pieces: &VecDeque<&str>, separator: &str) {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_size_and_overlap() {
        let words: Vec<String> = (1..=40).map(|i| format!("w{:03}", i)).collect();
        let text = words.join(" ");
        let splitter = TextSplitter::new(20, 10);

        let chunks = splitter.split_text(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks[0], "w001 w002 w003 w004");
        assert_eq!(chunks[1], "w003 w004 w005 w006");
        assert!(chunks.last().unwrap().ends_with("w040"));
    }

    #[test]
    fn short_paragraphs_stay_together() {
        let splitter = TextSplitter::new(500, 50);
        let chunks = splitter.split_text("First paragraph.\n\nSecond paragraph.");
        assert_eq!(chunks, vec!["First paragraph.\n\nSecond paragraph."]);
    }

    #[test]
    fn long_words_fall_back_to_characters() {
        let splitter = TextSplitter::new(4, 0);
        let chunks = splitter.split_text("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn pages_are_numbered_from_one() {
        let splitter = TextSplitter::new(100, 50);
        let pages = vec![
            "An AND gate outputs 1 only when all inputs are 1.".to_string(),
            "A NOT gate inverts its single input.".to_string(),
        ];
        let chunks = splitter.split_pages(&pages);
        assert_eq!(chunks.len(), 2);
        assert_eq!((chunks[0].page, chunks[0].index), (1, 0));
        assert_eq!((chunks[1].page, chunks[1].index), (2, 0));
    }

    #[test]
    fn overlap_is_clamped_below_size() {
        let splitter = TextSplitter::new(10, 50);
        assert_eq!(splitter.chunk_overlap(), 9);
    }
}
