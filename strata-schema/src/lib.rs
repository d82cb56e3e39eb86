//! # strata-schema
//!
//! Target schema description for the Strata migration engine.
//!
//! This crate provides:
//! - Value types describing the schema a database is expected to have
//!   (tables, columns, indexes, primary keys)
//! - A builder-style API for declaring that schema from application code
//! - Validation of a declared schema before it is handed to the differ
//!
//! The description is deliberately declarative: it says what should exist,
//! not how to get there. Computing the "how" is the migration engine's job.
//!
//! ## Example
//!
//! ```rust
//! use strata_schema::{Column, Schema, SqlType, Table};
//!
//! let schema = Schema::new()
//!     .table(
//!         Table::new("users")
//!             .column(Column::new("id", SqlType::BigInt))
//!             .column(Column::new("email", SqlType::Text).unique())
//!             .column(Column::new("name", SqlType::Text).nullable())
//!             .primary_key(["id"]),
//!     );
//!
//! schema.validate().expect("schema is well-formed");
//! ```

pub mod error;
pub mod table;
pub mod types;
pub mod validator;

pub use error::{SchemaError, SchemaResult};
pub use table::{Column, Index, Schema, Table};
pub use types::SqlType;
pub use validator::validate_schema;
