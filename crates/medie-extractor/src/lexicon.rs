//! Lexicon-based recognizer for Vietnamese medical narratives
//!
//! A regex + gazetteer model that needs no inference server. It backs both
//! recognition strategies: as a [`SpanModel`] it reports labeled spans, as a
//! [`TokenClassifier`] it tags word tokens with BIO labels.

use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::ner::{SpanModel, SpanPrediction, TokenClassifier, TokenTag};
use medie_core::{CharText, EntityLabel, Result};

/// Regex + gazetteer recognizer
pub struct LexiconModel {
    /// (pattern, label, confidence); capture group 1, when present, is the span
    patterns: Vec<(Regex, EntityLabel, f32)>,
}

impl LexiconModel {
    /// Create a model with the built-in Vietnamese medical lexicon
    pub fn new() -> Self {
        let mut model = Self {
            patterns: Vec::new(),
        };
        model.init_patterns();
        model.init_gazetteer();
        model
    }

    /// Create an empty model; populate it with `add_pattern` / `add_term`
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    fn init_patterns(&mut self) {
        // Identifiers and numbers
        self.add_pattern(r"\b(?:BN|bn)\s?\d+\b", EntityLabel::PatientId, 0.95);
        self.add_pattern(r"\b\d{1,3}\s?tuổi\b", EntityLabel::Age, 0.9);
        self.add_pattern(r"\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b", EntityLabel::Date, 0.9);

        // Person names follow a form of address, segmented or not
        self.add_pattern(
            r"\b(?:[Bb]ệnh[\s_]nhân|[Ôô]ng|[Bb]à|[Aa]nh|[Cc]hị)\s+(\p{Lu}\p{Ll}*(?:\s+\p{Lu}\p{Ll}*){0,3})",
            EntityLabel::Name,
            0.92,
        );

        // Administrative units and facilities
        self.add_pattern(
            r"(?:[Qq]uận|[Hh]uyện|[Pp]hường|[Xx]ã|[Tt]ỉnh|[Tt]hị xã|[Bb]ệnh viện|[Cc]hợ)\s+(?:\p{Lu}\p{Ll}*|\d+)(?:\s+\p{Lu}\p{Ll}*){0,3}",
            EntityLabel::Location,
            0.85,
        );
        self.add_pattern(
            r"(?:[Cc]ông ty|[Tt]rường|[Ss]ở Y tế|[Tt]rung tâm)\s+\p{Lu}\p{Ll}*(?:\s+\p{Lu}\p{Ll}*){0,3}",
            EntityLabel::Organization,
            0.8,
        );
        self.add_pattern(
            r"[Cc]huyến bay\s+[A-Z]{2}\d+",
            EntityLabel::Transportation,
            0.9,
        );
    }

    fn init_gazetteer(&mut self) {
        for term in [
            "sốt cao",
            "sốt",
            "ho khan",
            "ho",
            "đau họng",
            "đau đầu",
            "khó thở",
            "mệt mỏi",
            "tiêu chảy",
            "mất vị giác",
            "viêm phổi",
            "covid-19",
        ] {
            self.add_term(term, EntityLabel::SymptomAndDisease);
        }

        for term in ["nam", "nữ"] {
            self.add_term(term, EntityLabel::Gender);
        }

        for term in [
            "hà nội",
            "đà nẵng",
            "hải phòng",
            "thành phố hồ chí minh",
            "việt nam",
        ] {
            self.add_term(term, EntityLabel::Location);
        }

        for term in [
            "nhân viên văn phòng",
            "nhân viên",
            "công nhân",
            "giáo viên",
            "sinh viên",
            "bác sĩ",
            "điều dưỡng",
            "tài xế",
            "kỹ sư",
        ] {
            self.add_term(term, EntityLabel::Job);
        }

        for term in ["xe buýt", "xe khách", "taxi", "máy bay", "tàu hỏa"] {
            self.add_term(term, EntityLabel::Transportation);
        }
    }

    /// Add a regex pattern
    pub fn add_pattern(&mut self, pattern: &str, label: EntityLabel, confidence: f32) {
        match Regex::new(pattern) {
            Ok(regex) => self.patterns.push((regex, label, confidence)),
            Err(e) => warn!(pattern, error = %e, "Skipping invalid lexicon pattern"),
        }
    }

    /// Add a case-insensitive whole-word term
    pub fn add_term(&mut self, term: &str, label: EntityLabel) {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
        self.add_pattern(&pattern, label, 0.9);
    }

    /// Recognize every span, resolving overlaps
    ///
    /// Offsets are in characters. Among overlapping candidates the earliest
    /// start wins, then the longest span, then the higher confidence.
    pub fn recognize(&self, text: &str) -> Vec<SpanPrediction> {
        let chars = CharText::new(text);
        let mut candidates = Vec::new();

        for (regex, label, confidence) in &self.patterns {
            for caps in regex.captures_iter(text) {
                let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                if m.as_str().is_empty() {
                    continue;
                }
                candidates.push(SpanPrediction {
                    text: m.as_str().to_string(),
                    label: *label,
                    start: chars.char_at_byte(m.start()),
                    end: chars.char_at_byte(m.end()),
                    score: *confidence,
                });
            }
        }

        candidates.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then((b.end - b.start).cmp(&(a.end - a.start)))
                .then(b.score.total_cmp(&a.score))
        });

        let mut kept: Vec<SpanPrediction> = Vec::new();
        let mut covered_until = 0;
        for span in candidates {
            if kept.is_empty() || span.start >= covered_until {
                covered_until = span.end;
                kept.push(span);
            }
        }
        kept
    }
}

impl Default for LexiconModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SpanModel for LexiconModel {
    fn predict_spans(&self, text: &str, labels: &[EntityLabel]) -> Result<Vec<SpanPrediction>> {
        Ok(self
            .recognize(text)
            .into_iter()
            .filter(|span| labels.contains(&span.label))
            .collect())
    }
}

impl TokenClassifier for LexiconModel {
    /// Tag word and punctuation tokens with BIO labels
    ///
    /// A token overlapping a recognized span takes the span's label; the
    /// first such token is `B-`, the rest `I-`.
    fn classify(&self, text: &str) -> Result<Vec<TokenTag>> {
        let chars = CharText::new(text);
        let spans = self.recognize(text);
        let token_pattern = word_or_punct();

        let mut tags = Vec::new();
        let mut span_iter = spans.iter().peekable();
        let mut open_span: Option<usize> = None;

        for m in token_pattern.find_iter(text) {
            let start = chars.char_at_byte(m.start());
            let end = chars.char_at_byte(m.end());

            while span_iter.peek().is_some_and(|s| s.end <= start) {
                span_iter.next();
            }

            let (tag, score) = match span_iter.peek() {
                Some(span) if span.start < end => {
                    let prefix = if open_span == Some(span.start) { "I" } else { "B" };
                    open_span = Some(span.start);
                    (format!("{prefix}-{}", span.label), span.score)
                }
                _ => {
                    open_span = None;
                    ("O".to_string(), 1.0)
                }
            };

            tags.push(TokenTag {
                word: m.as_str().to_string(),
                tag,
                score,
                start: Some(start),
                end: Some(end),
            });
        }

        Ok(tags)
    }
}

fn word_or_punct() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    // Word characters include '_' so segmented compounds stay whole
    TOKEN.get_or_init(|| Regex::new(r"\w+|[^\w\s]").expect("token pattern is valid"))
}
