//! Runtime configuration for the sync layer
//!
//! All tunable constants live here rather than at call sites: the fuzzy-match
//! weights and the teardown debounce were chosen empirically and are expected
//! to be adjusted per deployment.

use std::time::Duration;

use serde::Deserialize;

/// Scoring weights and thresholds for fuzzy organization matching
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimilarityConfig {
    /// Bonus when the candidate name equals the query exactly
    pub exact_name: u32,
    /// Bonus when the candidate name starts with the query
    pub name_prefix: u32,
    /// Bonus when the candidate short name equals the query exactly
    pub short_name_exact: u32,
    /// Per-token score for an exact token match
    pub token_exact: u32,
    /// Per-token score for a prefix token match
    pub token_prefix: u32,
    /// Per-token score for an edit-distance match
    pub token_fuzzy: u32,
    /// Tokens at or below this length are never fuzzy-matched
    pub fuzzy_min_token_len: usize,
    /// Query tokens longer than this allow the wider edit-distance cutoff
    pub long_token_len: usize,
    /// Edit-distance cutoff for long query tokens
    pub max_edits_long: usize,
    /// Edit-distance cutoff for short query tokens
    pub max_edits_short: usize,
    /// Result cap for server-side authoritative search
    pub server_limit: usize,
    /// Result cap for client-side local search
    pub client_limit: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            exact_name: 100,
            name_prefix: 20,
            short_name_exact: 50,
            token_exact: 10,
            token_prefix: 5,
            token_fuzzy: 3,
            fuzzy_min_token_len: 2,
            long_token_len: 5,
            max_edits_long: 2,
            max_edits_short: 1,
            server_limit: 5,
            client_limit: 10,
        }
    }
}

/// Client-side sync behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// How long an unsubscribed key stays in pending-teardown before the
    /// leave-room event is emitted
    #[serde(with = "duration_secs")]
    pub teardown_debounce: Duration,
    /// How long the hybrid search waits for the authoritative result before
    /// falling back to the locally scored one
    #[serde(with = "duration_millis")]
    pub search_race_timeout: Duration,
    /// Capacity of the most-recently-seen organization cache
    pub recent_orgs_capacity: usize,
    /// Similarity scoring constants
    pub similarity: SimilarityConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            teardown_debounce: Duration::from_secs(120),
            search_race_timeout: Duration::from_millis(150),
            recent_orgs_capacity: 1000,
            similarity: SimilarityConfig::default(),
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_match_tuned_values() {
        let cfg = SimilarityConfig::default();
        assert_eq!(cfg.exact_name, 100);
        assert_eq!(cfg.short_name_exact, 50);
        assert_eq!(cfg.max_edits_long, 2);
        assert_eq!(cfg.max_edits_short, 1);
    }

    #[test]
    fn config_deserializes_partial_overrides() {
        let cfg: SyncConfig =
            serde_json::from_str(r#"{"teardownDebounce": 30, "recentOrgsCapacity": 10}"#)
                .map_err(|e| e.to_string())
                .unwrap();
        assert_eq!(cfg.teardown_debounce, Duration::from_secs(30));
        assert_eq!(cfg.recent_orgs_capacity, 10);
        assert_eq!(cfg.similarity.token_exact, 10);
    }
}
