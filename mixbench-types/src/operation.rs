//! Operation kinds and the results recorded for them.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of storage call issued for one slot of the benchmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    /// Download an existing object.
    Get,
    /// Fetch the metadata of an existing object.
    Stat,
    /// Upload a new object.
    Put,
    /// Delete an existing object.
    Delete,
}

impl OperationKind {
    /// All kinds, in their canonical order.
    pub const ALL: [OperationKind; 4] = [Self::Get, Self::Stat, Self::Put, Self::Delete];

    /// Returns the upper-case name of this kind, e.g. `"GET"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Stat => "STAT",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Position of this kind in [`OperationKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`OperationKind`].
#[derive(Debug, Error)]
#[error(r#"unknown operation "{0}": expected one of "get", "stat", "put", "delete""#)]
pub struct ParseKindError(String);

impl FromStr for OperationKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseKindError(s.to_owned()))
    }
}

/// Coarse classification of a failed operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// The working set was empty when a target was needed.
    TargetUnavailable,
    /// The storage call itself failed.
    Transport,
}

/// Whether an operation succeeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The storage call completed successfully.
    Success,
    /// The operation failed and was not retried.
    Failed {
        /// What kind of failure this was.
        class: ErrorClass,
        /// Human readable reason.
        reason: String,
    },
}

impl Outcome {
    /// Returns `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns the error class of a failed outcome.
    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            Self::Success => None,
            Self::Failed { class, .. } => Some(*class),
        }
    }
}

/// The record of a single executed operation.
///
/// Results are created once by the executor and then handed over to a result sink.
#[derive(Clone, Debug)]
pub struct OperationResult {
    /// The kind of operation that was executed.
    pub kind: OperationKind,
    /// The object that was targeted, `None` if no target was available.
    pub object: Option<String>,
    /// Wall-clock time at which the operation started.
    pub start: SystemTime,
    /// How long the operation took.
    pub duration: Duration,
    /// Success or failure.
    pub outcome: Outcome,
    /// Payload bytes transferred.
    pub bytes: u64,
}

impl OperationResult {
    /// Returns `true` if the operation succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kinds_case_insensitively() {
        assert_eq!("get".parse::<OperationKind>().unwrap(), OperationKind::Get);
        assert_eq!("Stat".parse::<OperationKind>().unwrap(), OperationKind::Stat);
        assert_eq!("DELETE".parse::<OperationKind>().unwrap(), OperationKind::Delete);
        assert!("list".parse::<OperationKind>().is_err());
    }

    #[test]
    fn index_matches_canonical_order() {
        for (i, kind) in OperationKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn serializes_upper_case() {
        let json = serde_json::to_string(&OperationKind::Delete).unwrap();
        assert_eq!(json, r#""DELETE""#);
    }
}
