//! # Smart Search Rules
//!
//! The pure half of smart product search: turning a free-text query into
//! search tokens, and combining the per-token id sets returned by the ERP.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  "Acetaminofén de 500mg!"                                              │
//! │       │ lowercase, punctuation → space, collapse whitespace            │
//! │       ▼                                                                 │
//! │  ["acetaminofén", "de", "500mg"]                                       │
//! │       │ drop stop words and tokens shorter than 2 chars                │
//! │       ▼                                                                 │
//! │  ["acetaminofén", "500mg"]                                             │
//! │       │ split digits+letters, dedupe keeping first-seen order          │
//! │       ▼                                                                 │
//! │  ["acetaminofén", "500", "mg"]                                         │
//! │       │ one name search per token (ERP client)                         │
//! │       ▼                                                                 │
//! │  [[4, 9, 2], [9, 2, 7], [2, 9]]                                        │
//! │       │ intersect in first-set order, else first set                   │
//! │       ▼                                                                 │
//! │  [9, 2]                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

/// Filler words that never narrow a product search.
pub const STOP_WORDS: [&str; 9] = ["de", "del", "la", "el", "los", "las", "para", "x", "por"];

/// Shortest token worth sending to the name search, in characters.
pub const MIN_TOKEN_CHARS: usize = 2;

/// Splits a free-text product query into search tokens.
///
/// An empty result means there is nothing to search for.
pub fn tokenize_query(query: &str) -> Vec<String> {
    let cleaned: String = query
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut tokens: Vec<String> = Vec::new();
    for part in cleaned.split_whitespace() {
        if STOP_WORDS.contains(&part) || part.chars().count() < MIN_TOKEN_CHARS {
            continue;
        }

        let pieces = match split_quantity_unit(part) {
            Some((number, unit)) => vec![number, unit],
            None => vec![part],
        };

        for piece in pieces {
            if !piece.is_empty() && !tokens.iter().any(|t| t == piece) {
                tokens.push(piece.to_string());
            }
        }
    }

    tokens
}

/// Splits `500mg` into `("500", "mg")`.
///
/// Only ASCII digits followed by ASCII letters qualify.
fn split_quantity_unit(token: &str) -> Option<(&str, &str)> {
    let boundary = token.find(|c: char| !c.is_ascii_digit())?;
    let (number, unit) = token.split_at(boundary);

    if number.is_empty() || unit.is_empty() || !unit.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    Some((number, unit))
}

/// Intersects per-token id sets, keeping the order of the first set.
///
/// When the tokens share no id, the first token's own set is returned so
/// that a query still yields something. No sets means no ids.
pub fn intersect_id_sets(sets: &[Vec<i64>]) -> Vec<i64> {
    let Some((first, rest)) = sets.split_first() else {
        return Vec::new();
    };

    let others: Vec<HashSet<i64>> = rest.iter().map(|s| s.iter().copied().collect()).collect();

    let mut seen = HashSet::new();
    let joint: Vec<i64> = first
        .iter()
        .copied()
        .filter(|id| others.iter().all(|set| set.contains(id)))
        .filter(|id| seen.insert(*id))
        .collect();

    if !joint.is_empty() {
        return joint;
    }

    let mut seen = HashSet::new();
    first.iter().copied().filter(|id| seen.insert(*id)).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
