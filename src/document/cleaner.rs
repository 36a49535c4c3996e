use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

const ALLOWED_SYMBOLS: &str = "+-=*/()[]{}<>|&^.,:;";
const MIN_LINE_LEN: usize = 4;
const MAX_JUNK_RATIO: f64 = 0.45;
const MIN_ALNUM_RATIO: f64 = 0.2;

lazy_static! {
    static ref NON_ASCII: Regex = Regex::new(r"[^\x00-\x7F]+").unwrap();
    static ref CID_GLYPH: Regex = Regex::new(r"\(cid:\d+\)").unwrap();
    static ref TABS: Regex = Regex::new(r"\t+").unwrap();
    static ref SPACES: Regex = Regex::new(r" {2,}").unwrap();
}

/// Strips extraction noise from a page of textbook text.
///
/// Runs outside ASCII become a space before NFKD normalization, so a
/// ligature such as `ﬁ` splits its word. Line breaks are kept so the
/// splitter can still cut on them. Lines that look like OCR debris,
/// barcodes or page furniture are dropped.
pub fn clean_text(text: &str) -> String {
    let text = NON_ASCII.replace_all(text, " ");
    let text = CID_GLYPH.replace_all(&text, " ");
    let text: String = text.nfkd().collect();
    let text = TABS.replace_all(&text, " ");
    let text = SPACES.replace_all(&text, " ");

    text.lines()
        .map(str::trim)
        .filter(|line| keep_line(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn keep_line(line: &str) -> bool {
    let total = line.chars().count();
    if total < MIN_LINE_LEN {
        return false;
    }

    let mut alnum = 0usize;
    let mut allowed = 0usize;
    let mut spaces = 0usize;
    for c in line.chars() {
        if c.is_ascii_alphanumeric() {
            alnum += 1;
        } else if ALLOWED_SYMBOLS.contains(c) {
            allowed += 1;
        } else if c == ' ' {
            spaces += 1;
        }
    }
    let junk = total - alnum - allowed - spaces;

    let junk_ratio = junk as f64 / total as f64;
    let alnum_ratio = alnum as f64 / total as f64;
    junk_ratio <= MAX_JUNK_RATIO && alnum_ratio >= MIN_ALNUM_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_glyph_artefacts_and_non_ascii() {
        let cleaned = clean_text("An AND gate\u{2014}outputs 1 (cid:12) only when   all inputs are 1");
        assert_eq!(cleaned, "An AND gate outputs 1 only when all inputs are 1");
    }

    #[test]
    fn non_ascii_is_stripped_before_normalizing() {
        assert_eq!(clean_text("simpli\u{FB01}ed circuit"), "simpli ed circuit");
        assert_eq!(clean_text("caf\u{E9} latch"), "caf latch");
    }

    #[test]
    fn junk_and_short_lines_are_dropped() {
        let page = "Chapter 3 Boolean Algebra\n\n  \n12\n#@!$%~#@!$%~ab\n...........\nA + B = B + A\n";
        assert_eq!(clean_text(page), "Chapter 3 Boolean Algebra\nA + B = B + A");
    }

    #[test]
    fn tabs_become_single_spaces() {
        assert_eq!(clean_text("X\t\tY\tZ  out"), "X Y Z out");
    }
}
