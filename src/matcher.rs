use std::collections::BTreeSet;

/// Legal-entity suffixes that never distinguish two companies.
const LEGAL_SUFFIXES: &[&str] = &[
    "inc", "incorporated", "llc", "ltd", "limited", "corp", "corporation", "co", "company",
    "plc", "gmbh", "lp", "llp", "ag", "sa",
];

/// Shared tokens shorter than this cannot carry a subset match on their own.
const MIN_SHARED_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DreamMatch {
    pub target: String,
    pub similarity: u8,
}

fn tokens(name: &str) -> Vec<String> {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '&' { c } else { ' ' })
        .collect();
    let all: Vec<String> = cleaned.split_whitespace().map(str::to_string).collect();
    let meaningful: Vec<String> = all
        .iter()
        .filter(|t| !LEGAL_SUFFIXES.contains(&t.as_str()))
        .cloned()
        .collect();
    if meaningful.is_empty() { all } else { meaningful }
}

fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

fn joined(set: &BTreeSet<&str>) -> String {
    set.iter().copied().collect::<Vec<_>>().join(" ")
}

fn percent(ratio: f64) -> u8 {
    ratio.round().clamp(0.0, 100.0) as u8
}

/// Token-sort and token-set ratios of two names.
fn ratios(a: &str, b: &str) -> (f64, f64) {
    let left = tokens(a);
    let right = tokens(b);
    if left.is_empty() || right.is_empty() {
        return (0.0, 0.0);
    }

    let left_set: BTreeSet<&str> = left.iter().map(String::as_str).collect();
    let right_set: BTreeSet<&str> = right.iter().map(String::as_str).collect();

    let token_sort = ratio(&joined(&left_set), &joined(&right_set));

    let shared: BTreeSet<&str> = left_set.intersection(&right_set).copied().collect();
    let shared_chars: usize = shared.iter().map(|t| t.len()).sum();

    let token_set = if shared_chars >= MIN_SHARED_CHARS {
        let only_left: BTreeSet<&str> = left_set.difference(&right_set).copied().collect();
        let only_right: BTreeSet<&str> = right_set.difference(&left_set).copied().collect();
        let base = joined(&shared);
        let with_left = format!("{} {}", base, joined(&only_left)).trim().to_string();
        let with_right = format!("{} {}", base, joined(&only_right)).trim().to_string();
        ratio(&base, &with_left)
            .max(ratio(&base, &with_right))
            .max(ratio(&with_left, &with_right))
    } else {
        0.0
    };

    (token_sort, token_set)
}

/// Token-based similarity in 0..=100, insensitive to case, punctuation, word
/// order and legal suffixes.
///
/// This is the better of a token-sort ratio and a token-set ratio. The set
/// ratio scores 100 when one name's words are a subset of the other's, which is
/// what lets "Meta Platforms" match "Meta"; it only does so when the shared
/// words are long enough to be distinctive.
pub fn similarity(a: &str, b: &str) -> u8 {
    let (token_sort, token_set) = ratios(a, b);
    percent(token_sort.max(token_set))
}

/// Best-scoring target at or above `threshold`.
///
/// Equal similarity goes to the target whose whole name is closer (token-sort
/// ratio), so "Amazon" prefers "Amazon" over "Amazon Web Services". Remaining
/// ties keep the earlier target.
pub fn best_match(company: &str, targets: &[String], threshold: u8) -> Option<DreamMatch> {
    if company.trim().is_empty() {
        return None;
    }

    let mut best: Option<(DreamMatch, u8)> = None;
    for target in targets {
        let (token_sort, token_set) = ratios(company, target);
        let score = percent(token_sort.max(token_set));
        if score < threshold {
            continue;
        }
        let closeness = percent(token_sort);
        if best
            .as_ref()
            .is_none_or(|(b, b_closeness)| (score, closeness) > (b.similarity, *b_closeness))
        {
            best = Some((
                DreamMatch {
                    target: target.clone(),
                    similarity: score,
                },
                closeness,
            ));
        }
    }
    best.map(|(found, _)| found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_exact_and_case_insensitive() {
        assert_eq!(similarity("Google", "google"), 100);
        assert_eq!(similarity("  Jane   Street ", "jane street"), 100);
    }

    #[test]
    fn test_legal_suffix_variation() {
        assert_eq!(similarity("Google LLC", "Google"), 100);
        assert_eq!(similarity("Qualcomm Inc.", "Qualcomm"), 100);
    }

    #[test]
    fn test_word_order_and_subset() {
        assert_eq!(similarity("Platforms, Meta", "Meta"), 100);
        assert_eq!(similarity("Meta Platforms", "Meta"), 100);
    }

    #[test]
    fn test_rejects_fragment_matches() {
        let list = targets(&["Meta", "Apple", "AI"]);
        assert_eq!(best_match("Metal Works", &list, 80), None);
        assert_eq!(best_match("Applied Concepts", &list, 80), None);
        assert_eq!(best_match("Scale AI", &list, 80), None);
    }

    #[test]
    fn test_tolerates_typos() {
        let list = targets(&["Google"]);
        let found = best_match("Gogle", &list, 80).expect("typo should match");
        assert_eq!(found.target, "Google");
        assert!(found.similarity >= 80);
    }

    #[test]
    fn test_scenario_google_in_list() {
        let list = targets(&["Google", "Meta"]);
        let found = best_match("Google", &list, 80).unwrap();
        assert_eq!(found.target, "Google");
        assert_eq!(found.similarity, 100);
    }

    #[test]
    fn test_tie_break_prefers_closest_then_first() {
        let list = targets(&["Amazon Web Services", "Amazon"]);
        let found = best_match("Amazon", &list, 80).unwrap();
        assert_eq!(found.target, "Amazon");
        assert_eq!(found.similarity, 100);

        let found = best_match("Amazon Web Services", &list, 80).unwrap();
        assert_eq!(found.target, "Amazon Web Services");

        let list = targets(&["Goggle", "Google"]);
        let found = best_match("Google", &list, 80).unwrap();
        assert_eq!(found.target, "Google");

        let list = targets(&["Meta", "Meta Inc"]);
        let found = best_match("Meta Platforms", &list, 80).unwrap();
        assert_eq!(found.target, "Meta");
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(best_match("", &targets(&["Google"]), 80), None);
        assert_eq!(best_match("Google", &[], 80), None);
        assert_eq!(similarity("", "Google"), 0);
    }
}
