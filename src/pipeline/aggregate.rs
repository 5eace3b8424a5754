// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Label aggregation: sum of numeric detection labels

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Labels that never contribute to the sum
pub const DEFAULT_SENTINELS: &[&str] = &["NULL", "JOK"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("Label '{label}' is not an integer")]
    NotNumeric { label: String },

    #[error("Label sum overflowed at label '{label}'")]
    Overflow { label: String },
}

impl AggregateError {
    /// The label that triggered the failure
    pub fn label(&self) -> &str {
        match self {
            AggregateError::NotNumeric { label } | AggregateError::Overflow { label } => label,
        }
    }
}

/// What to do with a label that is neither a sentinel nor an integer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelPolicy {
    /// Fail the whole request
    #[default]
    Strict,
    /// Leave the label out of the sum
    Skip,
}

impl FromStr for LabelPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(LabelPolicy::Strict),
            "skip" => Ok(LabelPolicy::Skip),
            other => Err(format!(
                "unknown label policy '{}', expected 'strict' or 'skip'",
                other
            )),
        }
    }
}

impl std::fmt::Display for LabelPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelPolicy::Strict => write!(f, "strict"),
            LabelPolicy::Skip => write!(f, "skip"),
        }
    }
}

/// Sums integer-valued labels, excluding sentinels
#[derive(Debug, Clone, PartialEq)]
pub struct LabelAggregator {
    policy: LabelPolicy,
    sentinels: Vec<String>,
}

impl Default for LabelAggregator {
    fn default() -> Self {
        Self::new(LabelPolicy::default())
    }
}

impl LabelAggregator {
    pub fn new(policy: LabelPolicy) -> Self {
        Self {
            policy,
            sentinels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the sentinel list (exact, case-sensitive matches)
    pub fn with_sentinels<I, S>(mut self, sentinels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sentinels = sentinels.into_iter().map(Into::into).collect();
        self
    }

    pub fn policy(&self) -> LabelPolicy {
        self.policy
    }

    pub fn is_sentinel(&self, label: &str) -> bool {
        self.sentinels.iter().any(|s| s == label)
    }

    /// Sum all qualifying labels; 0 when none qualify
    pub fn sum<'a, I>(&self, labels: I) -> Result<i64, AggregateError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut total: i64 = 0;
        for label in labels {
            if self.is_sentinel(label) {
                continue;
            }

            let value = match label.trim().parse::<i64>() {
                Ok(value) => value,
                Err(_) => match self.policy {
                    LabelPolicy::Strict => {
                        return Err(AggregateError::NotNumeric {
                            label: label.to_string(),
                        })
                    }
                    LabelPolicy::Skip => {
                        debug!("Skipping non-numeric label '{}'", label);
                        continue;
                    }
                },
            };

            total = total
                .checked_add(value)
                .ok_or_else(|| AggregateError::Overflow {
                    label: label.to_string(),
                })?;
        }
        Ok(total)
    }
}
