use regex::Regex;
use std::collections::HashSet;
use url::Url;

use crate::pipeline::task::{ContentRecord, MediaKind, MetricMap, MetricValue};
use crate::utils::urls;

/// Flesch Reading Ease constants; fixed so scores are reproducible
const FLESCH_BASE: f64 = 206.835;
const FLESCH_SENTENCE_WEIGHT: f64 = 1.015;
const FLESCH_SYLLABLE_WEIGHT: f64 = 84.6;

/// Words counted as positive polarity by the sentiment scan
const POSITIVE_WORDS: [&str; 40] = [
    "good", "great", "excellent", "best", "better", "easy", "easily", "simple", "clear",
    "clearly", "helpful", "useful", "powerful", "fast", "reliable", "robust", "improve",
    "improved", "improvement", "success", "successful", "successfully", "benefit", "benefits",
    "effective", "efficient", "recommended", "intuitive", "flexible", "convenient", "secure",
    "stable", "love", "like", "perfect", "smooth", "seamless", "rich", "valuable", "win",
];

/// Words counted as negative polarity by the sentiment scan
const NEGATIVE_WORDS: [&str; 40] = [
    "bad", "worse", "worst", "poor", "difficult", "hard", "confusing", "confused", "unclear",
    "complex", "complicated", "problem", "problems", "issue", "issues", "error", "errors",
    "fail", "fails", "failed", "failure", "broken", "break", "breaks", "slow", "unreliable",
    "unstable", "deprecated", "warning", "danger", "dangerous", "wrong", "missing", "lack",
    "lacks", "limitation", "limitations", "bug", "bugs", "hate",
];

/// Pure metric computation over a structured content record
///
/// Holds only compiled regexes and the sentiment lexicon; analyzing the
/// same record twice always yields identical metrics.
pub struct ContentAnalyzer {
    word_re: Regex,
    sentence_re: Regex,
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
}

impl ContentAnalyzer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            word_re: Regex::new(r"[A-Za-z0-9']+")?,
            sentence_re: Regex::new(r"[.!?]+")?,
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
        })
    }

    /// Compute the full metric set for a content record
    pub fn analyze(&self, record: &ContentRecord) -> MetricMap {
        let text = record.text_blocks.join(" ");
        let words: Vec<&str> = self.word_re.find_iter(&text).map(|m| m.as_str()).collect();
        let word_count = words.len();
        let sentence_count = self.count_sentences(&text, word_count);

        let mut metrics = MetricMap::new();
        if let Some(title) = &record.title {
            metrics.insert("title".to_string(), MetricValue::Text(title.clone()));
        }
        metrics.insert(
            "word_count".to_string(),
            MetricValue::Integer(word_count as i64),
        );
        metrics.insert(
            "sentence_count".to_string(),
            MetricValue::Integer(sentence_count as i64),
        );
        metrics.insert(
            "avg_word_length".to_string(),
            MetricValue::Float(average_word_length(&words)),
        );

        self.heading_metrics(record, &mut metrics);
        self.media_metrics(record, &mut metrics);
        self.link_metrics(record, &mut metrics);

        metrics.insert(
            "readability_score".to_string(),
            MetricValue::Float(self.readability(&words, sentence_count)),
        );
        metrics.insert(
            "sentiment_score".to_string(),
            MetricValue::Float(self.sentiment(&words)),
        );
        metrics.insert(
            "structural_complexity".to_string(),
            MetricValue::Float(structural_complexity(record)),
        );

        metrics
    }

    /// Sentences are terminator-separated segments that contain words;
    /// non-empty text without a terminator counts as one sentence.
    fn count_sentences(&self, text: &str, word_count: usize) -> usize {
        if word_count == 0 {
            return 0;
        }
        let count = self
            .sentence_re
            .split(text)
            .filter(|segment| self.word_re.is_match(segment))
            .count();
        count.max(1)
    }

    fn heading_metrics(&self, record: &ContentRecord, metrics: &mut MetricMap) {
        metrics.insert(
            "heading_count".to_string(),
            MetricValue::Integer(record.headings.len() as i64),
        );

        // Depth distribution flattened to one key per level so records
        // stay a flat name -> scalar mapping.
        for level in 1..=6u8 {
            let count = record
                .headings
                .iter()
                .filter(|h| h.level == level)
                .count();
            metrics.insert(
                format!("heading_depth_h{}", level),
                MetricValue::Integer(count as i64),
            );
        }
    }

    fn media_metrics(&self, record: &ContentRecord, metrics: &mut MetricMap) {
        let image_count = record
            .media
            .iter()
            .filter(|m| m.kind == MediaKind::Image)
            .count();
        metrics.insert(
            "image_count".to_string(),
            MetricValue::Integer(image_count as i64),
        );
        metrics.insert(
            "media_count".to_string(),
            MetricValue::Integer(record.media.len() as i64),
        );
    }

    fn link_metrics(&self, record: &ContentRecord, metrics: &mut MetricMap) {
        metrics.insert(
            "link_count".to_string(),
            MetricValue::Integer(record.links.len() as i64),
        );

        let ratio = match Url::parse(&record.url) {
            Ok(page_url) if !record.links.is_empty() => {
                let internal = record
                    .links
                    .iter()
                    .filter_map(|link| Url::parse(link).ok())
                    .filter(|link| urls::same_site(&page_url, link))
                    .count();
                internal as f64 / record.links.len() as f64
            }
            _ => 0.0,
        };
        metrics.insert(
            "internal_link_ratio".to_string(),
            MetricValue::Float(ratio),
        );
    }

    /// Flesch Reading Ease over word, sentence and syllable counts
    fn readability(&self, words: &[&str], sentence_count: usize) -> f64 {
        if words.is_empty() || sentence_count == 0 {
            return 0.0;
        }
        let word_count = words.len() as f64;
        let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

        FLESCH_BASE
            - FLESCH_SENTENCE_WEIGHT * (word_count / sentence_count as f64)
            - FLESCH_SYLLABLE_WEIGHT * (syllables as f64 / word_count)
    }

    /// Lexicon polarity score in [-1.0, 1.0]; text with no polarity
    /// matches (or a tie) scores 0.0.
    fn sentiment(&self, words: &[&str]) -> f64 {
        let mut positive = 0usize;
        let mut negative = 0usize;

        for word in words {
            let lower = word.to_lowercase();
            if self.positive.contains(lower.as_str()) {
                positive += 1;
            } else if self.negative.contains(lower.as_str()) {
                negative += 1;
            }
        }

        let matched = positive + negative;
        if matched == 0 {
            return 0.0;
        }
        (positive as f64 - negative as f64) / matched as f64
    }
}

fn average_word_length(words: &[&str]) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let total_chars: usize = words.iter().map(|w| w.chars().count()).sum();
    total_chars as f64 / words.len() as f64
}

/// Vowel-group syllable heuristic; every word counts at least one
fn count_syllables(word: &str) -> usize {
    let lower = word.to_lowercase();
    let mut count = 0usize;
    let mut previous_was_vowel = false;

    for c in lower.chars() {
        let is_vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if is_vowel && !previous_was_vowel {
            count += 1;
        }
        previous_was_vowel = is_vowel;
    }

    // A trailing silent 'e' rarely forms its own syllable
    if count > 1 && lower.ends_with('e') && !lower.ends_with("le") {
        count -= 1;
    }

    count.max(1)
}

/// Heading depth variance plus a log term for block count
///
/// Monotonic in heading-depth variance when the block count is fixed.
fn structural_complexity(record: &ContentRecord) -> f64 {
    let variance = if record.headings.is_empty() {
        0.0
    } else {
        let levels: Vec<f64> = record.headings.iter().map(|h| h.level as f64).collect();
        let mean = levels.iter().sum::<f64>() / levels.len() as f64;
        levels.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / levels.len() as f64
    };

    variance + (record.text_blocks.len() as f64).ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::task::{Heading, MediaRef};
    use std::collections::BTreeSet;

    fn empty_record(url: &str) -> ContentRecord {
        ContentRecord {
            url: url.to_string(),
            title: None,
            text_blocks: vec![],
            headings: vec![],
            links: BTreeSet::new(),
            media: vec![],
            raw_text_length: 0,
        }
    }

    fn analyzer() -> ContentAnalyzer {
        ContentAnalyzer::new().unwrap()
    }

    fn as_int(metrics: &MetricMap, name: &str) -> i64 {
        match metrics.get(name) {
            Some(MetricValue::Integer(v)) => *v,
            other => panic!("expected integer metric {}, got {:?}", name, other),
        }
    }

    fn as_float(metrics: &MetricMap, name: &str) -> f64 {
        match metrics.get(name) {
            Some(MetricValue::Float(v)) => *v,
            other => panic!("expected float metric {}, got {:?}", name, other),
        }
    }

    #[test]
    fn test_word_and_sentence_counts() {
        let mut record = empty_record("https://example.com/");
        record.text_blocks = vec![
            "The quick brown fox jumps over the lazy dog.".to_string(),
            "It runs fast! Does it rest?".to_string(),
        ];

        let metrics = analyzer().analyze(&record);
        assert_eq!(as_int(&metrics, "word_count"), 15);
        assert_eq!(as_int(&metrics, "sentence_count"), 3);
        assert!(as_float(&metrics, "avg_word_length") > 0.0);
    }

    #[test]
    fn test_text_without_terminator_is_one_sentence() {
        let mut record = empty_record("https://example.com/");
        record.text_blocks = vec!["no terminator here".to_string()];

        let metrics = analyzer().analyze(&record);
        assert_eq!(as_int(&metrics, "sentence_count"), 1);
    }

    #[test]
    fn test_empty_record_yields_zero_metrics() {
        let metrics = analyzer().analyze(&empty_record("https://example.com/"));

        assert_eq!(as_int(&metrics, "word_count"), 0);
        assert_eq!(as_int(&metrics, "sentence_count"), 0);
        assert_eq!(as_float(&metrics, "avg_word_length"), 0.0);
        assert_eq!(as_float(&metrics, "readability_score"), 0.0);
        assert_eq!(as_float(&metrics, "sentiment_score"), 0.0);
        assert_eq!(as_float(&metrics, "internal_link_ratio"), 0.0);
        assert_eq!(as_int(&metrics, "heading_count"), 0);
        assert_eq!(as_int(&metrics, "media_count"), 0);
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let mut record = empty_record("https://example.com/docs");
        record.text_blocks = vec!["A great and simple page. It has clear problems too.".to_string()];
        record.headings.push(Heading {
            level: 2,
            text: "Intro".to_string(),
        });

        let a = analyzer();
        assert_eq!(a.analyze(&record), a.analyze(&record));
    }

    #[test]
    fn test_title_metric() {
        let mut record = empty_record("https://example.com/");
        record.title = Some("Getting Started".to_string());

        let metrics = analyzer().analyze(&record);
        assert_eq!(
            metrics.get("title"),
            Some(&MetricValue::Text("Getting Started".to_string()))
        );

        // No title element means no title metric
        let metrics = analyzer().analyze(&empty_record("https://example.com/"));
        assert!(!metrics.contains_key("title"));
    }

    #[test]
    fn test_heading_metrics() {
        let mut record = empty_record("https://example.com/");
        for level in [1u8, 2, 2, 3] {
            record.headings.push(Heading {
                level,
                text: format!("h{}", level),
            });
        }

        let metrics = analyzer().analyze(&record);
        assert_eq!(as_int(&metrics, "heading_count"), 4);
        assert_eq!(as_int(&metrics, "heading_depth_h1"), 1);
        assert_eq!(as_int(&metrics, "heading_depth_h2"), 2);
        assert_eq!(as_int(&metrics, "heading_depth_h3"), 1);
        assert_eq!(as_int(&metrics, "heading_depth_h6"), 0);
    }

    #[test]
    fn test_media_metrics() {
        let mut record = empty_record("https://example.com/");
        record.media = vec![
            MediaRef {
                url: "https://example.com/a.png".to_string(),
                kind: MediaKind::Image,
            },
            MediaRef {
                url: "https://example.com/b.png".to_string(),
                kind: MediaKind::Image,
            },
            MediaRef {
                url: "https://example.com/v.mp4".to_string(),
                kind: MediaKind::Video,
            },
        ];

        let metrics = analyzer().analyze(&record);
        assert_eq!(as_int(&metrics, "image_count"), 2);
        assert_eq!(as_int(&metrics, "media_count"), 3);
    }

    #[test]
    fn test_internal_link_ratio() {
        let mut record = empty_record("https://docs.example.com/guide");
        record.links = [
            "https://docs.example.com/other",
            "https://www.example.com/pricing",
            "https://unrelated.org/page",
            "https://another.net/",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let metrics = analyzer().analyze(&record);
        assert_eq!(as_int(&metrics, "link_count"), 4);
        assert!((as_float(&metrics, "internal_link_ratio") - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_readability_is_finite_and_in_range() {
        let mut record = empty_record("https://example.com/");
        let sentence = "This page describes the setup in plain words. ";
        record.text_blocks = vec![sentence.repeat(60)];

        let metrics = analyzer().analyze(&record);
        let score = as_float(&metrics, "readability_score");
        assert!(score.is_finite());
        // Flesch Reading Ease is bounded by its constants
        assert!(score <= FLESCH_BASE);
        assert!(score > -200.0);
    }

    #[test]
    fn test_sentiment_bounds_and_neutrality() {
        let a = analyzer();

        let mut positive = empty_record("https://example.com/");
        positive.text_blocks = vec!["great excellent helpful reliable".to_string()];
        assert_eq!(as_float(&a.analyze(&positive), "sentiment_score"), 1.0);

        let mut negative = empty_record("https://example.com/");
        negative.text_blocks = vec!["broken confusing errors bugs".to_string()];
        assert_eq!(as_float(&a.analyze(&negative), "sentiment_score"), -1.0);

        let mut tied = empty_record("https://example.com/");
        tied.text_blocks = vec!["great but broken".to_string()];
        assert_eq!(as_float(&a.analyze(&tied), "sentiment_score"), 0.0);

        let mut neutral = empty_record("https://example.com/");
        neutral.text_blocks = vec!["the chapter describes widgets".to_string()];
        assert_eq!(as_float(&a.analyze(&neutral), "sentiment_score"), 0.0);
    }

    #[test]
    fn test_structural_complexity_monotonic_in_depth_variance() {
        let a = analyzer();

        let mut flat = empty_record("https://example.com/");
        flat.text_blocks = vec!["one".to_string(), "two".to_string()];
        flat.headings = vec![
            Heading { level: 2, text: "a".to_string() },
            Heading { level: 2, text: "b".to_string() },
            Heading { level: 2, text: "c".to_string() },
        ];

        let mut varied = flat.clone();
        varied.headings = vec![
            Heading { level: 1, text: "a".to_string() },
            Heading { level: 3, text: "b".to_string() },
            Heading { level: 6, text: "c".to_string() },
        ];

        let flat_score = as_float(&a.analyze(&flat), "structural_complexity");
        let varied_score = as_float(&a.analyze(&varied), "structural_complexity");
        assert!(varied_score > flat_score);
    }

    #[test]
    fn test_syllable_heuristic() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("describe"), 2);
        assert_eq!(count_syllables("analyzer"), 4);
        // Degenerate input still counts one syllable
        assert_eq!(count_syllables("xyz"), 1);
    }
}
