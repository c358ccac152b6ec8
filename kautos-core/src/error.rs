//! Error types for context resolution and generation.

use crate::schema::SchemaViolation;
use std::fmt;
use thiserror::Error;

/// Kind of record a lookup was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Event,
    Location,
    Polity,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Event => "event",
            RecordKind::Location => "location",
            RecordKind::Polity => "polity",
        })
    }
}

/// Errors from the context resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No {kind} named '{name}'")]
    NotFound { kind: RecordKind, name: String },

    #[error("Failed to resolve related {kind} {id}: {source}")]
    RelationResolution {
        kind: RecordKind,
        id: String,
        #[source]
        source: notion::Error,
    },

    #[error("Store query failed: {0}")]
    Store(#[from] notion::Error),

    #[error("Record {id} has a missing or invalid '{property}' property")]
    MalformedRecord { id: String, property: String },
}

/// Errors from the content requester.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generative backend error: {0}")]
    Backend(#[from] claude::Error),

    #[error("Failed to serialize the context payload: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("Structured output does not match the event shape: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Structured output violates the event contract: {}", join_violations(.0))]
    InvalidOutput(Vec<SchemaViolation>),
}

fn join_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {var}")]
    Invalid { var: &'static str, value: String },

    #[error("Failed to create client: {0}")]
    Client(String),
}

/// Errors from the chronicler, the top-level generation API.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = ResolveError::NotFound {
            kind: RecordKind::Event,
            name: "Fall of Merkuna".to_string(),
        };
        assert_eq!(err.to_string(), "No event named 'Fall of Merkuna'");
    }

    #[test]
    fn test_invalid_output_lists_violations() {
        let err = GenerationError::InvalidOutput(vec![
            SchemaViolation::new("importance", "is required"),
            SchemaViolation::new("location.biome", "is required"),
        ]);
        assert_eq!(
            err.to_string(),
            "Structured output violates the event contract: importance is required; location.biome is required"
        );
    }

    #[test]
    fn test_errors_bubble_transparently() {
        let err: Error = ResolveError::NotFound {
            kind: RecordKind::Location,
            name: "Nowhereland".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "No location named 'Nowhereland'");
    }
}
