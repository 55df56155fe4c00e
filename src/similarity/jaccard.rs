use super::{preprocess, Language};
use std::collections::HashSet;

/// Jaccard index of the preprocessed token sets of `a` and `b`.
///
/// Two texts with no tokens at all score 0.
pub fn jaccard(a: &str, b: &str, language: Language) -> f64 {
    let set_a: HashSet<String> = preprocess(a, language).into_iter().collect();
    let set_b: HashSet<String> = preprocess(b, language).into_iter().collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }
    set_a.intersection(&set_b).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_score_one() {
        let text = "La derivata di una funzione in un punto.";
        assert_eq!(jaccard(text, text, Language::Italian), 1.0);
    }

    #[test]
    fn partial_overlap() {
        let score = jaccard(
            "il gatto mangia il pesce",
            "il gatto beve latte",
            Language::Italian,
        );
        assert!((score - 0.2).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn inflections_match_after_stemming() {
        assert_eq!(jaccard("gatto", "gatti", Language::Italian), 1.0);
    }

    #[test]
    fn empty_and_stopword_only_texts_score_zero() {
        assert_eq!(jaccard("", "", Language::Italian), 0.0);
        assert_eq!(jaccard("il la di", "e che", Language::Italian), 0.0);
        assert_eq!(jaccard("", "gatto", Language::Italian), 0.0);
    }
}
