//! Fuzzy organization matching
//!
//! Ranks existing organizations against a free-text name so probable
//! duplicates surface before a new organization is created. The same scorer
//! runs on both sides: the server over its full store, the client over its
//! bounded recently-seen cache.
//!
//! Scoring, per candidate:
//! - whole-name bonus: exact match or prefix match on the full query
//! - short-name bonus: exact match only
//! - token scores: each query token contributes its best score against all
//!   candidate tokens (exact, prefix, or edit-distance within a
//!   length-scaled cutoff), summed into the total
//!
//! Candidates scoring zero are dropped; ties sort shorter name first.

use serde::{Deserialize, Serialize};

use crate::config::SimilarityConfig;
use crate::model::Organization;

/// An organization with its match score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub organization: Organization,
    pub score: u32,
}

/// Score one candidate organization against a query
pub fn score_organization(cfg: &SimilarityConfig, query: &str, candidate: &Organization) -> u32 {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return 0;
    }
    let name = candidate.name.to_lowercase();
    let short_name = candidate.short_name.to_lowercase();

    let mut score = 0;
    if name == query {
        score += cfg.exact_name;
    } else if name.starts_with(&query) {
        score += cfg.name_prefix;
    }
    if !short_name.is_empty() && short_name == query {
        score += cfg.short_name_exact;
    }

    let candidate_tokens: Vec<&str> = name
        .split_whitespace()
        .chain(short_name.split_whitespace())
        .collect();

    for query_token in query.split_whitespace() {
        let best = candidate_tokens
            .iter()
            .map(|token| token_score(cfg, query_token, token))
            .max()
            .unwrap_or(0);
        score += best;
    }

    score
}

/// Rank candidates by score, dropping non-matches and capping at `limit`
pub fn rank_organizations<'a, I>(
    cfg: &SimilarityConfig,
    query: &str,
    candidates: I,
    limit: usize,
) -> Vec<ScoredMatch>
where
    I: IntoIterator<Item = &'a Organization>,
{
    let mut matches: Vec<ScoredMatch> = candidates
        .into_iter()
        .map(|org| ScoredMatch {
            score: score_organization(cfg, query, org),
            organization: org.clone(),
        })
        .filter(|m| m.score > 0)
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.organization.name.len().cmp(&b.organization.name.len()))
    });
    matches.truncate(limit);
    matches
}

fn token_score(cfg: &SimilarityConfig, query_token: &str, candidate_token: &str) -> u32 {
    if candidate_token == query_token {
        return cfg.token_exact;
    }
    if candidate_token.starts_with(query_token) {
        return cfg.token_prefix;
    }
    if query_token.len() > cfg.fuzzy_min_token_len && candidate_token.len() > cfg.fuzzy_min_token_len
    {
        let max_edits = if query_token.len() > cfg.long_token_len {
            cfg.max_edits_long
        } else {
            cfg.max_edits_short
        };
        if edit_distance(query_token, candidate_token) <= max_edits {
            return cfg.token_fuzzy;
        }
    }
    0
}

/// Levenshtein distance over chars, single-row formulation
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut prev_diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            let next = (prev_diag + cost).min(row[j] + 1).min(row[j + 1] + 1);
            prev_diag = row[j + 1];
            row[j + 1] = next;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org(id: &str, name: &str, short_name: &str) -> Organization {
        Organization {
            id: id.into(),
            name: name.into(),
            short_name: short_name.into(),
            description: None,
        }
    }

    #[test]
    fn edit_distance_basics() {
        assert_eq!(edit_distance("spring", "spring"), 0);
        assert_eq!(edit_distance("spring", "sprint"), 1);
        assert_eq!(edit_distance("springvale", "springfield"), 4);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn exact_name_outranks_prefix() {
        let cfg = SimilarityConfig::default();
        let exact = org("o1", "Rovers", "ROV");
        let prefix = org("o2", "Rovers United", "RU");
        let exact_score = score_organization(&cfg, "rovers", &exact);
        let prefix_score = score_organization(&cfg, "rovers", &prefix);
        assert!(exact_score > prefix_score);
    }

    #[test]
    fn spring_query_matches_both_high_schools() {
        let cfg = SimilarityConfig::default();
        let springvale = org("o1", "Springvale High", "SPR");
        let springfield = org("o2", "Springfield High", "SHS");
        assert!(score_organization(&cfg, "spring", &springvale) > 0);
        assert!(score_organization(&cfg, "spring", &springfield) > 0);
    }

    #[test]
    fn short_name_exact_breaks_the_tie() {
        let cfg = SimilarityConfig::default();
        let springvale = org("o1", "Springvale High", "SPR");
        let springfield = org("o2", "Springfield High", "SHS");
        let ranked = rank_organizations(&cfg, "SPR", [&springvale, &springfield], 10);
        assert_eq!(ranked[0].organization.id, "o1");
    }

    #[test]
    fn long_tokens_get_the_wider_edit_cutoff() {
        let cfg = SimilarityConfig::default();
        // query len > 5 tolerates two edits
        assert_eq!(token_score(&cfg, "westwood", "westwd"), cfg.token_fuzzy);
        // short query token only tolerates one
        assert_eq!(token_score(&cfg, "care", "cure"), cfg.token_fuzzy);
        assert_eq!(token_score(&cfg, "care", "curb"), 0);
    }

    #[test]
    fn zero_score_candidates_are_filtered() {
        let cfg = SimilarityConfig::default();
        let orgs = [org("o1", "Northside FC", "NFC"), org("o2", "Harbor Rowing", "HR")];
        let ranked = rank_organizations(&cfg, "ballet", orgs.iter(), 10);
        assert!(ranked.is_empty());
    }

    #[test]
    fn ties_prefer_the_shorter_name() {
        let cfg = SimilarityConfig::default();
        // same score either way (name prefix + one exact token)
        let long = org("o1", "Riverside Hockey Association", "RHA");
        let short = org("o2", "Riverside Hockey Club", "RHC");
        let ranked = rank_organizations(&cfg, "riverside", [&long, &short], 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].score, ranked[1].score);
        assert_eq!(ranked[0].organization.id, "o2");
    }
}
