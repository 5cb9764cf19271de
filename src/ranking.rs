//! Search result ranking
//!
//! Scores start at [`MAX_SCORE`] and lose points for every way the record
//! name strays from the query. Ties go to the newer version.

use crate::types::{ScoredRecord, SearchRecord};

pub const MAX_SCORE: i32 = 100;

/// Penalty for not matching the query literally
const CASE_INSENSITIVE_PENALTY: i32 = 10;

/// Penalty floor when the query is not in the name at all
const MISSING_PENALTY: i32 = 50;

/// Score every record against `query` and order best first
pub fn sort(query: &str, results: Vec<SearchRecord>) -> Vec<ScoredRecord> {
    let query: Vec<char> = query.chars().collect();
    let lowercased = lowercase(&query);

    let mut scored: Vec<ScoredRecord> = results
        .into_iter()
        .map(|record| {
            let score = score(&query, &lowercased, &record.name);
            ScoredRecord { record, score }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.record.version.cmp(&a.record.version))
    });
    scored
}

pub fn score(query: &[char], lowercased: &[char], name: &str) -> i32 {
    let name: Vec<char> = name.chars().collect();
    if query == name.as_slice() {
        return MAX_SCORE;
    }
    let score = MAX_SCORE - CASE_INSENSITIVE_PENALTY;
    let lowercased_name = lowercase(&name);
    if lowercased == lowercased_name.as_slice() {
        return score;
    }
    score - similarity_penalty(query, lowercased, &name, &lowercased_name)
}

fn similarity_penalty(
    query: &[char],
    lowercased: &[char],
    name: &[char],
    lowercased_name: &[char],
) -> i32 {
    let Some(start) = find(lowercased_name, lowercased) else {
        // search is prefix indexed, so a miss means the caller passed unrelated records
        return MISSING_PENALTY + name.len() as i32;
    };

    let mut penalty = 0;
    // a match right after `$` is the start of a nested class name
    if start != 0 && name[start - 1] != '$' {
        penalty += start as i32;
    }

    penalty += query
        .iter()
        .zip(&name[start..])
        .filter(|(q, n)| q != n)
        .count() as i32;

    let end = start + lowercased.len();
    penalty += name.len().saturating_sub(end) as i32;

    penalty
}

/// Lowercase char by char so indices line up with the input
fn lowercase(chars: &[char]) -> Vec<char> {
    chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect()
}

fn find(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
