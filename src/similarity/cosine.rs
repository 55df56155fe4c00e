use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Words of two or more word characters, as a TF-IDF vectoriser sees them.
static RE_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("valid regex"));

fn term_counts(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    for m in RE_TOKEN.find_iter(&text.to_lowercase()) {
        *counts.entry(m.as_str().to_string()).or_insert(0.0) += 1.0;
    }
    counts
}

/// L2-normalised TF-IDF vector over `vocabulary`.
fn tfidf(counts: &HashMap<String, f64>, vocabulary: &[(&String, f64)]) -> Vec<f64> {
    let raw: Vec<f64> = vocabulary
        .iter()
        .map(|(term, idf)| counts.get(*term).copied().unwrap_or(0.0) * idf)
        .collect();
    let norm = raw.iter().map(|w| w * w).sum::<f64>().sqrt();
    if norm == 0.0 {
        return raw;
    }
    raw.into_iter().map(|w| w / norm).collect()
}

/// TF-IDF cosine similarity of two texts.
///
/// The two texts form the corpus. Terms are weighted by raw count times the
/// smoothed idf `ln((1 + n) / (1 + df)) + 1`, and vectors are L2-normalised.
/// Either text having no terms scores 0.
pub fn cosine(a: &str, b: &str) -> f64 {
    let docs = [term_counts(a), term_counts(b)];
    if docs.iter().any(HashMap::is_empty) {
        return 0.0;
    }

    let n = docs.len() as f64;
    let mut df: HashMap<&String, f64> = HashMap::new();
    for doc in &docs {
        for term in doc.keys() {
            *df.entry(term).or_insert(0.0) += 1.0;
        }
    }
    let vocabulary: Vec<(&String, f64)> = df
        .into_iter()
        .map(|(term, df)| (term, ((1.0 + n) / (1.0 + df)).ln() + 1.0))
        .collect();

    let va = tfidf(&docs[0], &vocabulary);
    let vb = tfidf(&docs[1], &vocabulary);
    let dot: f64 = va.iter().zip(&vb).map(|(x, y)| x * y).sum();
    dot.clamp(0.0, 1.0)
}
