//! Enumerator configuration that callers can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::relset::MAX_RELATIONS;

/// Largest relation count for which a dense `2^n` plan array is allowed.
pub const DENSE_STORE_CEILING: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumeratorConfig {
    /// Reject join trees with more relations than this. Never above 64.
    pub max_relations: usize,

    /// Use a dense plan array (2^n slots) up to this many relations and a
    /// hash map beyond. The dense array is exponential in relation count.
    pub dense_store_max_relations: usize,

    /// Report every emitted hyperedge to the trace hook.
    pub trace_edges: bool,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        Self {
            max_relations: MAX_RELATIONS,
            dense_store_max_relations: 16,
            trace_edges: false,
        }
    }
}

impl EnumeratorConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `HYPERDP_MAX_RELATIONS`: relation-count ceiling
    /// - `HYPERDP_DENSE_STORE_MAX_RELATIONS`: dense plan-store threshold
    /// - `HYPERDP_TRACE_EDGES`: `1`/`true` to trace hyperedges
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("HYPERDP_MAX_RELATIONS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_relations = v;
            }
        }

        if let Ok(s) = std::env::var("HYPERDP_DENSE_STORE_MAX_RELATIONS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.dense_store_max_relations = v;
            }
        }

        if let Ok(s) = std::env::var("HYPERDP_TRACE_EDGES") {
            cfg.trace_edges = matches!(s.trim(), "1" | "true" | "yes");
        }

        cfg
    }

    /// Parse a JSON config snapshot; missing fields take their defaults.
    pub fn from_json(src: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(src)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_relations == 0 || self.max_relations > MAX_RELATIONS {
            return Err(Error::Config(format!(
                "max_relations must be in 1..={MAX_RELATIONS}, got {}",
                self.max_relations
            )));
        }
        if self.dense_store_max_relations > DENSE_STORE_CEILING {
            return Err(Error::Config(format!(
                "dense_store_max_relations must be at most {DENSE_STORE_CEILING}, got {}",
                self.dense_store_max_relations
            )));
        }
        Ok(())
    }

    /// Should a run over `n` relations use the dense plan array?
    pub fn use_dense_store(&self, n: usize) -> bool {
        n <= self.dense_store_max_relations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(EnumeratorConfig::default().validate().is_ok());
    }

    #[test]
    fn json_overrides_and_bounds() {
        let cfg = EnumeratorConfig::from_json(r#"{"dense_store_max_relations": 8}"#).unwrap();
        assert_eq!(cfg.dense_store_max_relations, 8);
        assert_eq!(cfg.max_relations, 64);
        assert!(cfg.use_dense_store(8));
        assert!(!cfg.use_dense_store(9));

        assert!(EnumeratorConfig::from_json(r#"{"max_relations": 65}"#).is_err());
        assert!(EnumeratorConfig::from_json(r#"{"dense_store_max_relations": 40}"#).is_err());
        assert!(EnumeratorConfig::from_json("not json").is_err());
    }
}
