//! Reduce functions used by the stock applications.

use std::collections::BTreeSet;

use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum App {
    /// Number of values, e.g. word count over "1" values.
    Count,
    /// Sum of the values as integers.
    Sum,
    /// Distinct values, inverted index style.
    Concat,
}

impl App {
    pub fn reduce_fn(self) -> fn(&str, &[&str]) -> String {
        match self {
            App::Count => count,
            App::Sum => sum,
            App::Concat => concat,
        }
    }
}

pub fn count(_key: &str, values: &[&str]) -> String {
    values.len().to_string()
}

/// Values that do not parse as integers count as zero. The total is kept
/// as an `i128` and saturates at its bounds instead of overflowing.
pub fn sum(_key: &str, values: &[&str]) -> String {
    values
        .iter()
        .map(|v| i128::from(v.trim().parse::<i64>().unwrap_or(0)))
        .fold(0i128, i128::saturating_add)
        .to_string()
}

/// `<n> <v1>,<v2>,...` over the sorted distinct values.
pub fn concat(_key: &str, values: &[&str]) -> String {
    let distinct: BTreeSet<&str> = values.iter().copied().collect();
    let joined: Vec<&str> = distinct.into_iter().collect();
    format!("{} {}", joined.len(), joined.join(","))
}
