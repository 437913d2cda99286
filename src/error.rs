//! Error types.
//!
//! [`GraphError`] covers input and configuration problems surfaced to the
//! caller. [`AlgorithmError`] is never raised to the caller: it is the reason
//! an iterative or optional algorithm gave way to the next entry of its
//! fallback chain, and it ends up in the result metadata.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a graph or loading configuration.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unknown {kind} tag: {value:?}")]
    UnknownTag { kind: &'static str, value: String },

    #[error("{what} limit exceeded: {actual} > {limit}")]
    LimitExceeded {
        what: &'static str,
        limit: usize,
        actual: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Why an algorithm did not produce a primary result.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlgorithmError {
    #[error("{algorithm} did not converge within {iterations} iterations")]
    NotConverged {
        algorithm: String,
        iterations: usize,
    },

    #[error("{algorithm} is undefined for this graph: {reason}")]
    Degenerate { algorithm: String, reason: String },

    #[error("{algorithm} skipped: {size} nodes exceeds limit of {limit}")]
    TooLarge {
        algorithm: String,
        size: usize,
        limit: usize,
    },
}

impl AlgorithmError {
    pub fn not_converged(algorithm: &str, iterations: usize) -> Self {
        Self::NotConverged {
            algorithm: algorithm.to_string(),
            iterations,
        }
    }

    pub fn degenerate(algorithm: &str, reason: impl Into<String>) -> Self {
        Self::Degenerate {
            algorithm: algorithm.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_error_display() {
        let err = AlgorithmError::not_converged("katz", 1000);
        assert_eq!(
            err.to_string(),
            "katz did not converge within 1000 iterations"
        );
    }

    #[test]
    fn test_algorithm_error_serializes_tagged() {
        let err = AlgorithmError::degenerate("hits", "graph has no edges");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "degenerate");
        assert_eq!(json["algorithm"], "hits");
    }
}
