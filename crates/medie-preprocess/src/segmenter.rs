//! Dictionary-based Vietnamese word segmentation
//!
//! Vietnamese writes every syllable as a separate whitespace-delimited unit,
//! so "bệnh nhân" (patient) is two tokens to a whitespace split. Word-level
//! models expect compounds joined with `_` ("bệnh_nhân"). This segmenter does
//! a greedy longest match of syllable runs against a compound dictionary.

use std::collections::HashSet;

use crate::{SegmentError, Segmenter};

/// Compounds common in Vietnamese epidemiological narratives
const DEFAULT_COMPOUNDS: &[&str] = &[
    "bệnh nhân",
    "bệnh viện",
    "trú tại",
    "ở tại",
    "địa chỉ",
    "thường trú",
    "triệu chứng",
    "biểu hiện",
    "di chuyển",
    "có mặt",
    "đi đến",
    "ho khan",
    "sốt cao",
    "đau họng",
    "đau đầu",
    "khó thở",
    "mệt mỏi",
    "viêm phổi",
    "hà nội",
    "thành phố",
    "hồ chí minh",
    "cầu giấy",
    "bạch mai",
    "xe buýt",
    "máy bay",
    "nhân viên",
    "công nhân",
    "giáo viên",
    "sinh viên",
];

/// Greedy longest-match compound segmenter
#[derive(Debug, Clone)]
pub struct CompoundSegmenter {
    /// Lowercased compounds, syllables separated by a single space
    compounds: HashSet<String>,
    /// Longest compound, in syllables
    max_syllables: usize,
}

impl CompoundSegmenter {
    /// Create a segmenter with the built-in compound list
    pub fn new() -> Self {
        Self::with_compounds(DEFAULT_COMPOUNDS.iter().copied())
    }

    /// Create a segmenter from a custom compound list
    pub fn with_compounds<I, S>(compounds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compounds: HashSet<String> = compounds
            .into_iter()
            .map(|c| {
                c.as_ref()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase()
            })
            .filter(|c| c.contains(' '))
            .collect();

        let max_syllables = compounds
            .iter()
            .map(|c| c.split(' ').count())
            .max()
            .unwrap_or(1);

        Self {
            compounds,
            max_syllables,
        }
    }

    /// Number of compounds known
    pub fn len(&self) -> usize {
        self.compounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compounds.is_empty()
    }

    fn is_compound(&self, syllables: &[&str]) -> bool {
        let (last, init) = match syllables.split_last() {
            Some(parts) => parts,
            None => return false,
        };

        // Only the final syllable may carry trailing punctuation
        if init.iter().any(|s| s.ends_with(is_punct)) {
            return false;
        }

        let mut key: Vec<String> = init.iter().map(|s| s.to_lowercase()).collect();
        key.push(last.trim_end_matches(is_punct).to_lowercase());
        self.compounds.contains(&key.join(" "))
    }
}

impl Default for CompoundSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

fn is_punct(c: char) -> bool {
    c.is_ascii_punctuation()
}

impl Segmenter for CompoundSegmenter {
    fn segment(&self, text: &str) -> Result<Vec<String>, SegmentError> {
        let syllables: Vec<&str> = text.split_whitespace().collect();
        let mut tokens = Vec::with_capacity(syllables.len());
        let mut i = 0;

        while i < syllables.len() {
            let longest = self.max_syllables.min(syllables.len() - i);
            let width = (2..=longest)
                .rev()
                .find(|&n| self.is_compound(&syllables[i..i + n]))
                .unwrap_or(1);

            tokens.push(syllables[i..i + width].join("_"));
            i += width;
        }

        Ok(tokens)
    }

    fn name(&self) -> &str {
        "compound-dictionary"
    }
}
