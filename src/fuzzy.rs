//! Fuzzy string scoring for breed suggestions.
//!
//! Scores are integers in `0..=100`. [`ratio`] is the indel similarity
//! `2·LCS / (len(a) + len(b))`; the other scorers build on it to tolerate
//! substrings and reordered words. [`weighted_ratio`] picks the best of them
//! depending on how different the two string lengths are.

/// Lowercase, map every non-alphanumeric character to a space, and trim.
pub fn normalize(s: &str) -> String {
    let mapped: String = s
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    mapped.trim().to_string()
}

fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut cur = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            cur[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                cur[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

fn similarity(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * lcs_len(a, b) as f64 / total as f64
}

fn score(similarity: f64) -> u8 {
    (similarity * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Plain indel similarity of the raw strings.
pub fn ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    score(similarity(&a, &b))
}

/// Best [`ratio`] of the shorter string against any equal-length window of the longer.
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let mut best = 0.0f64;
    for window in long.windows(short.len()) {
        best = best.max(similarity(&short, window));
        if best > 0.995 {
            return 100;
        }
    }
    score(best)
}

fn sorted_tokens(s: &str) -> Vec<String> {
    let mut tokens: Vec<String> = normalize(s).split_whitespace().map(str::to_string).collect();
    tokens.sort();
    tokens
}

fn token_sort(a: &str, b: &str, scorer: fn(&str, &str) -> u8) -> u8 {
    scorer(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "))
}

fn token_set(a: &str, b: &str, scorer: fn(&str, &str) -> u8) -> u8 {
    let mut ta = sorted_tokens(a);
    let mut tb = sorted_tokens(b);
    ta.dedup();
    tb.dedup();
    if ta.is_empty() || tb.is_empty() {
        return 0;
    }

    let common: Vec<&str> = ta
        .iter()
        .filter(|t| tb.contains(t))
        .map(String::as_str)
        .collect();
    let only_a: Vec<&str> = ta
        .iter()
        .filter(|t| !tb.contains(t))
        .map(String::as_str)
        .collect();
    let only_b: Vec<&str> = tb
        .iter()
        .filter(|t| !ta.contains(t))
        .map(String::as_str)
        .collect();

    let base = common.join(" ");
    let join = |rest: &[&str]| {
        if base.is_empty() {
            rest.join(" ")
        } else if rest.is_empty() {
            base.clone()
        } else {
            format!("{} {}", base, rest.join(" "))
        }
    };
    let combined_a = join(&only_a);
    let combined_b = join(&only_b);

    scorer(&base, &combined_a)
        .max(scorer(&base, &combined_b))
        .max(scorer(&combined_a, &combined_b))
}

/// [`ratio`] after sorting the words of both strings.
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    token_sort(a, b, ratio)
}

/// Compares the shared words with each string's full word set.
pub fn token_set_ratio(a: &str, b: &str) -> u8 {
    token_set(a, b, ratio)
}

pub fn partial_token_sort_ratio(a: &str, b: &str) -> u8 {
    token_sort(a, b, partial_ratio)
}

pub fn partial_token_set_ratio(a: &str, b: &str) -> u8 {
    token_set(a, b, partial_ratio)
}

/// Weighted combination of the scorers, robust to typos, substrings and word order.
pub fn weighted_ratio(a: &str, b: &str) -> u8 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    const UNBASE_SCALE: f64 = 0.95;
    let base = ratio(&a, &b) as f64;
    let (la, lb) = (a.chars().count() as f64, b.chars().count() as f64);
    let len_ratio = la.max(lb) / la.min(lb);

    let best = if len_ratio >= 1.5 {
        let partial_scale = if len_ratio > 8.0 { 0.6 } else { 0.9 };
        let partial = partial_ratio(&a, &b) as f64 * partial_scale;
        let sort = partial_token_sort_ratio(&a, &b) as f64 * UNBASE_SCALE * partial_scale;
        let set = partial_token_set_ratio(&a, &b) as f64 * UNBASE_SCALE * partial_scale;
        base.max(partial).max(sort).max(set)
    } else {
        let sort = token_sort_ratio(&a, &b) as f64 * UNBASE_SCALE;
        let set = token_set_ratio(&a, &b) as f64 * UNBASE_SCALE;
        base.max(sort).max(set)
    };
    best.round() as u8
}

/// The best-scoring choice under [`weighted_ratio`]. Earlier choices win ties.
pub fn extract_one<'a, I>(query: &str, choices: I) -> Option<(&'a str, u8)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, u8)> = None;
    for choice in choices {
        let s = weighted_ratio(query, choice);
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((choice, s));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  German-Shepherd! "), "german shepherd");
        assert_eq!(normalize("***"), "");
    }

    #[test]
    fn test_ratio() {
        assert_eq!(ratio("poodle", "poodle"), 100);
        assert_eq!(ratio("abc", "xyz"), 0);
        assert_eq!(ratio("", "abc"), 0);
        // LCS 9 over 19 characters
        assert_eq!(ratio("rotweiler", "rottweiler"), 95);
    }

    #[test]
    fn test_partial_ratio_finds_substring() {
        assert_eq!(partial_ratio("poodle", "toy poodle"), 100);
        assert!(partial_ratio("poodel", "standard poodle") > 60);
    }

    #[test]
    fn test_token_scorers_ignore_order() {
        assert_eq!(token_sort_ratio("retriever labrador", "Labrador Retriever"), 100);
        assert_eq!(token_set_ratio("golden retriever", "retriever golden golden"), 100);
        assert!(token_sort_ratio("retriever labrador", "labrador") < 100);
    }

    #[test]
    fn test_weighted_ratio() {
        assert_eq!(weighted_ratio("Rottweiler", "rottweiler"), 100);
        assert!(weighted_ratio("rotweiler", "rottweiler") > 80);
        assert!(weighted_ratio("dachshund", "labrador retriever") < 80);
        assert_eq!(weighted_ratio("", "pug"), 0);
    }

    #[test]
    fn test_extract_one() {
        let breeds = ["labrador retriever", "rottweiler", "toy poodle"];
        assert_eq!(
            extract_one("rotweiler", breeds.iter().copied()).map(|(b, _)| b),
            Some("rottweiler")
        );
        assert_eq!(extract_one("pug", std::iter::empty()), None);

        // equal scores keep the first choice
        let (choice, _) = extract_one("xyz", ["abc", "def"]).unwrap();
        assert_eq!(choice, "abc");
    }
}
