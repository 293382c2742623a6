//! Token-sort fuzzy scoring
//!
//! Both strings are normalized (ASCII only, non-word characters become
//! spaces, lowercased), their tokens are sorted and rejoined, and the results
//! are compared with an insert/delete edit ratio scaled to 0-100.

use itertools::Itertools;

/// Normalize a string and sort its whitespace-separated tokens
pub fn process_and_sort(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii())
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();

    cleaned.split_whitespace().sorted().join(" ")
}

/// Similarity of two already-processed strings, 0-100
pub fn ratio(a: &str, b: &str) -> u8 {
    if a == b {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = (a.len() + b.len()) as f64;
    let indel = total - 2.0 * longest_common_subsequence(&a, &b) as f64;

    (100.0 * (total - indel) / total).round_ties_even() as u8
}

/// Case-insensitive, token-order-independent similarity, 0-100
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    ratio(&process_and_sort(a), &process_and_sort(b))
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
