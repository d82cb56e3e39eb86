//! # Strata
//!
//! A code-configurable schema migration engine for Rust.
//!
//! Strata keeps a database in step with a schema declared in application
//! code: it detects drift, materializes the difference as immutable,
//! reversible revision records, and replays the revision graph forward or
//! backward against a live connection. Every operation can also be
//! rendered as a literal SQL script instead of executed.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), MigrationError> {
//!     let target = Schema::new().table(
//!         Table::new("users")
//!             .column(Column::new("id", SqlType::BigInt))
//!             .column(Column::new("email", SqlType::Text).unique())
//!             .primary_key(["id"]),
//!     );
//!
//!     let config = MigrationConfig::new("./migrations").target_schema(target);
//!     let engine = MigrationEngine::new(config, PgDatabase::new("postgres://localhost/app"));
//!
//!     engine.initialize().await?;
//!     if engine.has_changes().await? {
//!         engine.new_migration(Some("sync schema"), false).await?;
//!     }
//!     engine.upgrade("head").await?;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Target schema description types.
pub mod schema {
    pub use strata_schema::*;
}

/// The migration engine.
pub mod migrate {
    pub use strata_migrate::*;
}

/// PostgreSQL backend.
pub mod postgres {
    pub use strata_postgres::*;
}

pub use strata_migrate::{
    MigrateResult, MigrationConfig, MigrationEngine, MigrationError, MigrationStatus,
};
pub use strata_postgres::PgDatabase;
pub use strata_schema::{Column, Index, Schema, SqlType, Table};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Column, Index, MigrateResult, MigrationConfig, MigrationEngine, MigrationError,
        PgDatabase, Schema, SqlType, Table,
    };
}
