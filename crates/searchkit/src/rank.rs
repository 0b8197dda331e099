//! Multi-field ranking.

use crate::matcher::fuzzy_match;
use serde::Serialize;

/// A text field with its ranking weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedField<'a> {
    pub name: &'static str,
    pub text: &'a str,
    pub weight: f64,
}

impl<'a> WeightedField<'a> {
    pub fn new(name: &'static str, text: &'a str, weight: f64) -> Self {
        Self { name, text, weight }
    }
}

/// Anything that can be searched by its fields.
pub trait Searchable {
    /// Fields in priority order; earlier fields win ties.
    fn search_fields(&self) -> Vec<WeightedField<'_>>;
}

impl<T: Searchable + ?Sized> Searchable for std::sync::Arc<T> {
    fn search_fields(&self) -> Vec<WeightedField<'_>> {
        (**self).search_fields()
    }
}

impl<T: Searchable + ?Sized> Searchable for &T {
    fn search_fields(&self) -> Vec<WeightedField<'_>> {
        (**self).search_fields()
    }
}

/// The best-scoring field of one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMatch {
    pub field: &'static str,
    /// Raw score multiplied by the field weight
    pub score: f64,
    /// Char positions within that field's text
    pub indices: Vec<usize>,
}

/// An item with its match.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<'a, T> {
    pub item: &'a T,
    pub matched: FieldMatch,
}

/// Match `pattern` against every field and keep the best weighted score.
pub fn best_field(pattern: &str, fields: &[WeightedField<'_>]) -> Option<FieldMatch> {
    let mut best: Option<FieldMatch> = None;
    for field in fields {
        let Some(m) = fuzzy_match(pattern, field.text) else {
            continue;
        };
        let score = m.score as f64 * field.weight;
        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(FieldMatch {
                field: field.name,
                score,
                indices: m.indices,
            });
        }
    }
    best
}

/// Rank items by their best field, highest first.
///
/// Items that match nowhere are dropped; equal scores keep input order.
/// An empty pattern keeps every item in input order.
pub fn rank<'a, T: Searchable>(items: &'a [T], pattern: &str) -> Vec<Ranked<'a, T>> {
    let mut ranked: Vec<Ranked<'a, T>> = items
        .iter()
        .filter_map(|item| {
            best_field(pattern, &item.search_fields()).map(|matched| Ranked { item, matched })
        })
        .collect();
    ranked.sort_by(|a, b| b.matched.score.total_cmp(&a.matched.score));
    ranked
}
