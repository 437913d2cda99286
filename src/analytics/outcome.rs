//! Ordered fallback chains with observable outcomes.
//!
//! Optional or iterative algorithms are tried in order; the first success
//! wins, and every earlier failure is recorded in a [`MethodReport`] so callers
//! can see which path produced a value.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AlgorithmError;

/// A method in a chain that did not produce the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedAttempt {
    pub method: String,
    pub reason: AlgorithmError,
}

/// Which method produced a value, and which were tried before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodReport {
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<FailedAttempt>,
}

impl MethodReport {
    pub fn primary(method: &str) -> Self {
        Self {
            method: method.to_string(),
            fallbacks: Vec::new(),
        }
    }

    /// True when the value did not come from the first method of its chain.
    pub fn used_fallback(&self) -> bool {
        !self.fallbacks.is_empty()
    }
}

/// A value together with the report of how it was obtained.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    pub report: MethodReport,
}

type Attempt<'a, T> = (&'static str, Box<dyn FnOnce() -> Result<T, AlgorithmError> + 'a>);

/// Ordered list of fallible methods ending in an infallible last resort.
pub struct FallbackChain<'a, T> {
    attempts: Vec<Attempt<'a, T>>,
}

impl<'a, T> FallbackChain<'a, T> {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    /// Append a fallible method to the chain.
    pub fn attempt(
        mut self,
        method: &'static str,
        run: impl FnOnce() -> Result<T, AlgorithmError> + 'a,
    ) -> Self {
        self.attempts.push((method, Box::new(run)));
        self
    }

    /// Run the chain, falling back to `last_resort` when every attempt fails.
    pub fn or_else(self, method: &'static str, last_resort: impl FnOnce() -> T) -> Resolved<T> {
        let mut fallbacks = Vec::new();
        for (name, run) in self.attempts {
            match run() {
                Ok(value) => {
                    return Resolved {
                        value,
                        report: MethodReport {
                            method: name.to_string(),
                            fallbacks,
                        },
                    }
                }
                Err(reason) => {
                    warn!("{} failed, falling back: {}", name, reason);
                    fallbacks.push(FailedAttempt {
                        method: name.to_string(),
                        reason,
                    });
                }
            }
        }
        Resolved {
            value: last_resort(),
            report: MethodReport {
                method: method.to_string(),
                fallbacks,
            },
        }
    }
}

impl<T> Default for FallbackChain<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_success_wins() {
        let resolved = FallbackChain::new()
            .attempt("a", || Ok(1))
            .attempt("b", || Ok(2))
            .or_else("c", || 3);
        assert_eq!(resolved.value, 1);
        assert_eq!(resolved.report, MethodReport::primary("a"));
        assert!(!resolved.report.used_fallback());
    }

    #[test]
    fn test_failures_are_recorded_in_order() {
        let resolved = FallbackChain::new()
            .attempt("eigenvector", || Err(AlgorithmError::not_converged("eigenvector", 10)))
            .attempt("spectral", || Err(AlgorithmError::degenerate("spectral", "too small")))
            .or_else("degree", || 42);
        assert_eq!(resolved.value, 42);
        assert_eq!(resolved.report.method, "degree");
        let methods: Vec<&str> = resolved
            .report
            .fallbacks
            .iter()
            .map(|f| f.method.as_str())
            .collect();
        assert_eq!(methods, vec!["eigenvector", "spectral"]);
    }

    #[test]
    fn test_later_attempts_are_not_run_after_success() {
        let mut ran_second = false;
        let resolved = FallbackChain::new()
            .attempt("first", || Ok("x"))
            .attempt("second", || {
                ran_second = true;
                Ok("y")
            })
            .or_else("last", || "z");
        assert_eq!(resolved.value, "x");
        assert!(!ran_second);
    }
}
