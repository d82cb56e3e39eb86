//! Error types for the migration engine.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Missing or invalid session configuration: no reachable connection
    /// for an online run, no target schema for autogeneration, a rejected
    /// revision range, and similar. Fatal, surfaced immediately.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A symbolic revision reference matches more than one revision.
    #[error("'{symbol}' is ambiguous; candidates: {}", .candidates.join(", "))]
    AmbiguousRevision {
        /// The reference that failed to resolve.
        symbol: String,
        /// Ids of all revisions it could mean.
        candidates: Vec<String>,
    },

    /// A revision reference matches nothing in the store.
    #[error("revision '{0}' not found")]
    RevisionNotFound(String),

    /// A revision record is malformed, or a revision reference is not
    /// usable where it was given.
    #[error("invalid revision: {0}")]
    InvalidRevision(String),

    /// The revision history on disk is not a well-formed graph.
    #[error("broken revision history: {0}")]
    BrokenHistory(String),

    /// A per-step run failed partway through its plan. Earlier steps are
    /// committed and the database pointer names the last one that was.
    #[error(
        "migration step '{failed}' failed; last applied revision: {}",
        .last_applied.as_deref().unwrap_or("base")
    )]
    PartialMigration {
        /// Revision whose step failed.
        failed: String,
        /// Last revision that committed, `None` when nothing did (base).
        last_applied: Option<String>,
        /// The underlying fault.
        #[source]
        source: Box<MigrationError>,
    },

    /// A fault occurred while a specific revision's step was in flight.
    #[error("while migrating revision '{revision}': {source}")]
    Step {
        /// The revision being applied or reverted.
        revision: String,
        /// The underlying fault.
        #[source]
        source: Box<MigrationError>,
    },

    /// Database operation error.
    #[error("database error: {0}")]
    Database(String),

    /// Target schema description error.
    #[error(transparent)]
    Schema(#[from] strata_schema::SchemaError),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrationError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create an invalid-revision error.
    pub fn invalid_revision(msg: impl Into<String>) -> Self {
        Self::InvalidRevision(msg.into())
    }

    /// Create a broken-history error.
    pub fn broken_history(msg: impl Into<String>) -> Self {
        Self::BrokenHistory(msg.into())
    }

    /// Wrap an error with the revision whose step was in flight.
    pub fn in_step(revision: impl Into<String>, source: MigrationError) -> Self {
        Self::Step {
            revision: revision.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error should surface as a short one-line message at a
    /// command-line boundary (as opposed to a full diagnostic trace).
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::AmbiguousRevision { .. } | Self::RevisionNotFound(_)
        )
    }
}
