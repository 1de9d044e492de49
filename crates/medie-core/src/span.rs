//! Character-offset helpers
//!
//! Entity spans are counted in Unicode scalar values while Rust strings are
//! indexed by byte. `CharText` keeps the byte offset of every character so
//! spans can be sliced without re-scanning the text.

/// Text indexed by character position
#[derive(Debug, Clone)]
pub struct CharText<'a> {
    text: &'a str,
    /// Byte offset of each char, plus one trailing entry for `text.len()`
    offsets: Vec<usize>,
}

impl<'a> CharText<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        offsets.push(text.len());
        Self { text, offsets }
    }

    /// Number of characters
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_str(&self) -> &'a str {
        self.text
    }

    /// Slice `[start, end)` in characters
    ///
    /// Bounds are clamped to the text; an inverted or empty range yields "".
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let end = end.min(self.len());
        if start >= end {
            return "";
        }
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    /// Character position of a byte offset (rounded down to a char boundary)
    pub fn char_at_byte(&self, byte: usize) -> usize {
        match self.offsets.binary_search(&byte) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    /// Find `needle` at or after character position `from`
    ///
    /// Returns the character position of the first match.
    pub fn find(&self, needle: &str, from: usize) -> Option<usize> {
        if from > self.len() {
            return None;
        }
        let from_byte = self.offsets[from];
        self.text[from_byte..]
            .find(needle)
            .map(|b| self.char_at_byte(from_byte + b))
    }
}

/// Length of a string in characters
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_counts_characters() {
        let text = CharText::new("Bệnh nhân sốt");
        assert_eq!(text.len(), 13);
        assert_eq!(text.slice(0, 4), "Bệnh");
        assert_eq!(text.slice(10, 13), "sốt");
    }

    #[test]
    fn test_slice_clamps_and_inverts_to_empty() {
        let text = CharText::new("ho khan");
        assert_eq!(text.slice(3, 100), "khan");
        assert_eq!(text.slice(5, 2), "");
        assert_eq!(text.slice(50, 60), "");
    }

    #[test]
    fn test_find_returns_char_position() {
        let text = CharText::new("Hà Nội, Hà Nội");
        assert_eq!(text.find("Hà", 0), Some(0));
        assert_eq!(text.find("Hà", 1), Some(8));
        assert_eq!(text.find("Huế", 0), None);
        assert_eq!(text.find("Hà", 99), None);
    }

    #[test]
    fn test_char_at_byte() {
        let text = CharText::new("đi");
        // 'đ' is two bytes
        assert_eq!(text.char_at_byte(0), 0);
        assert_eq!(text.char_at_byte(2), 1);
        assert_eq!(text.char_at_byte(3), 2);
    }

    #[test]
    fn test_char_len() {
        assert_eq!(char_len("tuổi"), 4);
        assert_eq!(char_len(""), 0);
    }
}
