//! Text-similarity metrics for judging a transcription against a manual one.
//!
//! Two complementary scores:
//!
//! * [`jaccard`]: overlap of the stemmed, stop-word-free vocabularies. Ignores
//!   word order and frequency; answers "did the model find the same words?".
//! * [`cosine`]: TF-IDF cosine over raw word counts. Frequency-aware, no
//!   stemming or stop-word removal.

mod cosine;
mod jaccard;
mod stopwords;

pub use cosine::cosine;
pub use jaccard::jaccard;

use crate::error::PlumaError;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use unicode_segmentation::UnicodeSegmentation;

/// Language used for stop words and stemming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Italian,
    English,
}

impl Language {
    fn stopwords(self) -> &'static std::collections::HashSet<&'static str> {
        match self {
            Language::Italian => &stopwords::ITALIAN_STOPWORDS,
            Language::English => &stopwords::ENGLISH_STOPWORDS,
        }
    }

    fn stemmer(self) -> Stemmer {
        Stemmer::create(match self {
            Language::Italian => Algorithm::Italian,
            Language::English => Algorithm::English,
        })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::Italian => "italian",
            Language::English => "english",
        })
    }
}

impl FromStr for Language {
    type Err = PlumaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "it" | "ita" | "italian" | "italiano" => Ok(Language::Italian),
            "en" | "eng" | "english" => Ok(Language::English),
            other => Err(PlumaError::InvalidConfig(format!(
                "Unsupported language '{other}' (expected italian or english)"
            ))),
        }
    }
}

/// Which scores [`compare_files`] computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Jaccard,
    Cosine,
    #[default]
    Both,
}

impl FromStr for Metric {
    type Err = PlumaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "jaccard" => Ok(Metric::Jaccard),
            "cosine" => Ok(Metric::Cosine),
            "both" | "all" => Ok(Metric::Both),
            other => Err(PlumaError::InvalidConfig(format!(
                "Unknown metric '{other}' (expected jaccard, cosine or both)"
            ))),
        }
    }
}

/// Scores for one pair of texts, each in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jaccard: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cosine: Option<f64>,
    pub language: Language,
}

/// Lower-case word tokens with punctuation and stop words removed, stemmed.
///
/// Elided articles and prepositions (`dell'anno`, `l'integrale`) are split at
/// the apostrophe so the stop-word list sees them.
pub fn preprocess(text: &str, language: Language) -> Vec<String> {
    let stopwords = language.stopwords();
    let stemmer = language.stemmer();

    text.to_lowercase()
        .unicode_words()
        .flat_map(|word| word.split(['\'', '’']))
        .filter(|token| !token.is_empty() && token.chars().any(char::is_alphanumeric))
        .filter(|token| !stopwords.contains(*token))
        .map(|token| stemmer.stem(token).into_owned())
        .collect()
}

/// Score two texts.
pub fn compare_texts(a: &str, b: &str, metric: Metric, language: Language) -> SimilarityReport {
    let want_jaccard = matches!(metric, Metric::Jaccard | Metric::Both);
    let want_cosine = matches!(metric, Metric::Cosine | Metric::Both);
    SimilarityReport {
        jaccard: want_jaccard.then(|| jaccard(a, b, language)),
        cosine: want_cosine.then(|| cosine(a, b)),
        language,
    }
}

fn read_text(path: &Path) -> Result<String, PlumaError> {
    std::fs::read_to_string(path).map_err(|source| PlumaError::ReadFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Score a manual transcription file against a generated one.
pub fn compare_files(
    manual: &Path,
    generated: &Path,
    metric: Metric,
    language: Language,
) -> Result<SimilarityReport, PlumaError> {
    let a = read_text(manual)?;
    let b = read_text(generated)?;
    Ok(compare_texts(&a, &b, metric, language))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_drops_stopwords_and_punctuation() {
        let tokens = preprocess("Il gatto, e il cane!", Language::Italian);
        assert_eq!(tokens.len(), 2);
        assert!(tokens.iter().all(|t| !t.contains(',') && !t.contains('!')));
    }

    #[test]
    fn preprocess_splits_elision() {
        let tokens = preprocess("dell'anno", Language::Italian);
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].starts_with("ann"));
    }

    #[test]
    fn preprocess_english() {
        let tokens = preprocess("The running dogs", Language::English);
        assert_eq!(tokens, vec!["run".to_string(), "dog".to_string()]);
    }

    #[test]
    fn parses_language_and_metric() {
        assert_eq!("IT".parse::<Language>().unwrap(), Language::Italian);
        assert_eq!("english".parse::<Language>().unwrap(), Language::English);
        assert!("klingon".parse::<Language>().is_err());
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert!("euclid".parse::<Metric>().is_err());
    }

    #[test]
    fn compare_texts_respects_metric() {
        let r = compare_texts("gatto", "gatto", Metric::Jaccard, Language::Italian);
        assert_eq!(r.jaccard, Some(1.0));
        assert_eq!(r.cosine, None);
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("cosine"));
    }

    #[test]
    fn compare_files_reports_missing_file() {
        let err = compare_files(
            Path::new("/no/such/manual.md"),
            Path::new("/no/such/generated.md"),
            Metric::Both,
            Language::Italian,
        )
        .unwrap_err();
        assert!(matches!(err, PlumaError::ReadFailed { .. }));
    }
}
