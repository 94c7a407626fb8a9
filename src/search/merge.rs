//! Merging per-source pages into one ranked list.
//!
//! With a single non-empty page the source's own order is kept. With more,
//! every item is scored against the search text, items are interleaved by
//! score, and a module reported by several sources is folded into the
//! first (highest scored) occurrence.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::core::ModuleSearchMetadata;

/// Items from all pages after merging.
#[derive(Debug, Default)]
pub struct MergedItems {
    pub items: Vec<ModuleSearchMetadata>,

    /// Item count before duplicates were folded
    pub raw_items_count: usize,
}

/// Merge `pages` (source name, items in source order) for `search_text`.
///
/// Pages must be given in source priority order; it breaks score ties.
pub fn merge_pages(search_text: &str, pages: Vec<(String, Vec<ModuleSearchMetadata>)>) -> MergedItems {
    let raw_items_count = pages.iter().map(|(_, items)| items.len()).sum();

    let mut non_empty: Vec<(String, Vec<ModuleSearchMetadata>)> =
        pages.into_iter().filter(|(_, items)| !items.is_empty()).collect();

    match non_empty.len() {
        0 => MergedItems::default(),
        1 => {
            let (_, items) = non_empty.remove(0);
            MergedItems {
                items,
                raw_items_count,
            }
        }
        _ => {
            let index = RelevanceIndex::new(search_text);
            MergedItems {
                items: interleave(&index, non_empty),
                raw_items_count,
            }
        }
    }
}

struct Ranked {
    score: f64,
    source: usize,
    rank: usize,
    item: ModuleSearchMetadata,
}

fn interleave(index: &RelevanceIndex, pages: Vec<(String, Vec<ModuleSearchMetadata>)>) -> Vec<ModuleSearchMetadata> {
    let mut ranked: Vec<Ranked> = pages
        .into_iter()
        .enumerate()
        .flat_map(|(source, (_, items))| {
            items.into_iter().enumerate().map(move |(rank, item)| Ranked {
                score: 0.0,
                source,
                rank,
                item,
            })
        })
        .collect();

    for entry in &mut ranked {
        entry.score = index.score(&entry.item);
    }

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.rank.cmp(&b.rank))
            .then(a.source.cmp(&b.source))
    });

    // Folded name -> (position in output, source it came from)
    let mut seen: HashMap<String, (usize, usize)> = HashMap::new();
    let mut merged: Vec<ModuleSearchMetadata> = Vec::with_capacity(ranked.len());

    for entry in ranked {
        let key = entry.item.name().to_ascii_lowercase();
        match seen.get(&key) {
            Some(&(position, source)) if source != entry.source => {
                splice(&mut merged[position], entry.item);
            }
            _ => {
                seen.entry(key).or_insert((merged.len(), entry.source));
                merged.push(entry.item);
            }
        }
    }

    merged
}

/// Fold a lower-ranked duplicate into the kept item.
///
/// The kept item keeps its rank but always describes the newest release
/// either side reported, together with that release's dependency groups.
fn splice(kept: &mut ModuleSearchMetadata, duplicate: ModuleSearchMetadata) {
    if duplicate.identity.version() > kept.identity.version() {
        kept.identity = duplicate.identity;
        kept.dependency_groups = duplicate.dependency_groups;
    }

    for version in duplicate.versions {
        if !kept.versions.contains(&version) {
            kept.versions.push(version);
        }
    }
    kept.versions.sort_by(|a, b| b.cmp(a));

    kept.download_count = match (kept.download_count, duplicate.download_count) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    if kept.description.is_empty() {
        kept.description = duplicate.description;
    }
    if kept.title.is_none() {
        kept.title = duplicate.title;
    }
}

/// Term-based relevance scoring for one search text.
pub struct RelevanceIndex {
    query: String,
    terms: Vec<String>,
}

impl RelevanceIndex {
    pub fn new(search_text: &str) -> Self {
        let query = search_text.trim().to_lowercase();
        let terms = query.split_whitespace().map(str::to_string).collect();
        RelevanceIndex { query, terms }
    }

    /// Score `item`; higher is more relevant.
    pub fn score(&self, item: &ModuleSearchMetadata) -> f64 {
        let name = item.name().to_lowercase();
        let title = item.title.as_deref().unwrap_or_default().to_lowercase();
        let description = item.description.to_lowercase();

        let mut score = 0.0;

        if !self.query.is_empty() {
            if name == self.query {
                score += 20.0;
            } else if name.starts_with(&self.query) {
                score += 8.0;
            }
        }

        for term in &self.terms {
            if name.contains(term.as_str()) {
                score += 4.0;
            }
            if title.contains(term.as_str()) {
                score += 2.0;
            }
            if item.tags.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                score += 2.0;
            }
            if description.contains(term.as_str()) {
                score += 1.0;
            }
        }

        // Popularity only separates otherwise equal matches.
        let downloads = item.download_count.unwrap_or(0) as f64;
        score + downloads.ln_1p() / 100.0
    }
}
