use super::normalize::{collapse_synonyms, normalize_category, tokenize, STOP_WORDS};
use crate::config::CategoriesConfig;
use std::collections::HashSet;

/// How a candidate category was resolved
#[derive(Debug, Clone, PartialEq)]
pub enum MatchKind {
    /// Equal to a known name after normalization
    Exact,
    /// Edit-distance ratio at or above the similarity threshold
    Similar(f64),
    /// Keyword overlap at or above the keyword threshold
    Keywords(f64),
    /// No known name matched; a new container is needed
    New,
}

/// Result of [`CategoryMatcher::resolve`]
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryMatch {
    /// Known name that matched, or the normalized candidate for [`MatchKind::New`]
    pub name: String,
    pub kind: MatchKind,
}

impl CategoryMatch {
    pub fn is_new(&self) -> bool {
        self.kind == MatchKind::New
    }
}

/// Levenshtein distance over characters
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / longer_length`; two empty strings are identical
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / longest as f64
}

/// Jaccard index of two sets; 0 when both are empty
pub fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Topic keywords of a label: tokens after synonym collapse minus stop words
fn keywords(raw: &str) -> HashSet<String> {
    collapse_synonyms(tokenize(raw))
        .into_iter()
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Normalizes and fuzzy-matches category labels against known containers
///
/// Keeps "EOS Network", "eos_network" and "EOSIO" from spawning three
/// containers for one topic.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    similarity_threshold: f64,
    keyword_threshold: f64,
    max_length: usize,
}

impl Default for CategoryMatcher {
    fn default() -> Self {
        Self::from_config(&CategoriesConfig::default())
    }
}

impl CategoryMatcher {
    pub fn new(similarity_threshold: f64, keyword_threshold: f64, max_length: usize) -> Self {
        Self {
            similarity_threshold,
            keyword_threshold,
            max_length,
        }
    }

    pub fn from_config(config: &CategoriesConfig) -> Self {
        Self::new(
            config.similarity_threshold,
            config.keyword_threshold,
            config.max_length,
        )
    }

    pub fn normalize(&self, raw: &str) -> String {
        normalize_category(raw, self.max_length)
    }

    /// Best known name for `candidate` by edit distance
    ///
    /// Exact equality after normalization wins outright. Otherwise the known
    /// name with the highest ratio at or above `threshold` is returned; with
    /// none, the candidate comes back unchanged.
    pub fn find_best_match(&self, candidate: &str, known: &[String], threshold: f64) -> String {
        self.best_similar(candidate, known, threshold)
            .map(|(name, _)| name)
            .unwrap_or_else(|| candidate.to_string())
    }

    /// Best known name for `candidate` by keyword overlap
    ///
    /// Returns the candidate unchanged when no Jaccard score reaches `threshold`.
    pub fn find_by_keywords(&self, candidate: &str, known: &[String], threshold: f64) -> String {
        self.best_keywords(candidate, known, threshold)
            .map(|(name, _)| name)
            .unwrap_or_else(|| candidate.to_string())
    }

    /// Resolves a raw label to a known container name or a new normalized name
    ///
    /// Similarity matching runs first; keyword matching only when it found
    /// nothing.
    pub fn resolve(&self, candidate: &str, known: &[String]) -> CategoryMatch {
        let normalized = self.normalize(candidate);

        if let Some(name) = known.iter().find(|k| self.normalize(k) == normalized) {
            return CategoryMatch {
                name: name.clone(),
                kind: MatchKind::Exact,
            };
        }

        if let Some((name, score)) = self.best_similar(candidate, known, self.similarity_threshold)
        {
            return CategoryMatch {
                name,
                kind: MatchKind::Similar(score),
            };
        }

        if let Some((name, score)) = self.best_keywords(candidate, known, self.keyword_threshold) {
            return CategoryMatch {
                name,
                kind: MatchKind::Keywords(score),
            };
        }

        CategoryMatch {
            name: normalized,
            kind: MatchKind::New,
        }
    }

    fn best_similar(&self, candidate: &str, known: &[String], threshold: f64) -> Option<(String, f64)> {
        let normalized = self.normalize(candidate);
        let mut best: Option<(&String, f64)> = None;

        for name in known {
            let score = similarity_ratio(&normalized, &self.normalize(name));
            if score >= 1.0 {
                return Some((name.clone(), 1.0));
            }
            if score >= threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((name, score));
            }
        }
        best.map(|(name, score)| (name.clone(), score))
    }

    fn best_keywords(&self, candidate: &str, known: &[String], threshold: f64) -> Option<(String, f64)> {
        let candidate_words = keywords(candidate);
        let mut best: Option<(&String, f64)> = None;

        for name in known {
            let score = jaccard(&candidate_words, &keywords(name));
            if score >= threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((name, score));
            }
        }
        best.map(|(name, score)| (name.clone(), score))
    }
}
