// src/symbols.rs
//! Tickers mentioned in enriched news that the watch-list does not already cover.

use std::collections::HashSet;

use crate::analyze::EnrichedNewsItem;

/// Symbol the model uses when an item names no coin.
pub const NO_SYMBOL: &str = "N/A";

/// Comma-joined extra symbols, first-seen order, each at most once.
/// Empty string when there are none.
pub fn resolve_extra_symbols<S: AsRef<str>>(items: &[EnrichedNewsItem], watchlist: &[S]) -> String {
    let watch: HashSet<&str> = watchlist.iter().map(|s| s.as_ref()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut extra: Vec<&str> = Vec::new();

    for it in items {
        let sym = it.symbol.as_str();
        if sym.is_empty() || sym == NO_SYMBOL || watch.contains(sym) {
            continue;
        }
        if seen.insert(sym) {
            extra.push(sym);
        }
    }
    extra.join(",")
}

/// Full `symbol` query term for the price fetch: watch-list, then extras.
pub fn price_query<S: AsRef<str>>(watchlist: &[S], extra: &str) -> String {
    let mut parts: Vec<&str> = watchlist.iter().map(|s| s.as_ref()).collect();
    if !extra.is_empty() {
        parts.push(extra);
    }
    parts.join(",")
}
