//! Revision records.
//!
//! A revision is one atomic, reversible schema-change unit. Records are
//! immutable once persisted: they are created by the script writer, read
//! back by the store, and never modified in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{MigrateResult, MigrationError};
use crate::ops::SchemaOp;

/// One revision in the migration history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    /// Short unique id.
    pub id: String,
    /// Parent revision ids. Empty for a base revision, one for a normal
    /// revision, two or more for a merge.
    #[serde(default)]
    pub parents: Vec<String>,
    /// Optional human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// When the revision was generated.
    pub created_at: DateTime<Utc>,
    /// Operations applied when migrating up through this revision.
    #[serde(default)]
    pub upgrade_ops: Vec<SchemaOp>,
    /// Operations applied when migrating down through this revision.
    /// Must reverse `upgrade_ops` when both are non-empty.
    #[serde(default)]
    pub downgrade_ops: Vec<SchemaOp>,
}

impl Revision {
    /// Create a revision record.
    pub fn new(
        id: impl Into<String>,
        parents: Vec<String>,
        upgrade_ops: Vec<SchemaOp>,
        downgrade_ops: Vec<SchemaOp>,
    ) -> Self {
        Self {
            id: id.into(),
            parents,
            message: None,
            created_at: Utc::now(),
            upgrade_ops,
            downgrade_ops,
        }
    }

    /// Set the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether this revision has no parents (a root of history).
    pub fn is_base(&self) -> bool {
        self.parents.is_empty()
    }

    /// Whether this revision changes anything when applied.
    pub fn has_changes(&self) -> bool {
        !self.upgrade_ops.is_empty()
    }

    /// Whether this revision joins two or more branches.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Checksum over the operation bodies.
    pub fn checksum(&self) -> String {
        #[derive(Serialize)]
        struct Body<'a> {
            upgrade_ops: &'a [SchemaOp],
            downgrade_ops: &'a [SchemaOp],
        }

        let body = toml::to_string(&Body {
            upgrade_ops: &self.upgrade_ops,
            downgrade_ops: &self.downgrade_ops,
        })
        .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Serialize to the on-disk record format.
    pub fn to_toml(&self) -> MigrateResult<String> {
        let doc = RevisionDoc {
            id: self.id.clone(),
            parents: self.parents.clone(),
            message: self.message.clone(),
            created_at: self.created_at,
            checksum: Some(self.checksum()),
            upgrade_ops: self.upgrade_ops.clone(),
            downgrade_ops: self.downgrade_ops.clone(),
        };

        let body = toml::to_string_pretty(&doc).map_err(|e| {
            MigrationError::invalid_revision(format!(
                "failed to serialize revision '{}': {}",
                self.id, e
            ))
        })?;

        Ok(format!(
            "# Strata revision record. Records are immutable; do not edit.\n{}",
            body
        ))
    }

    /// Parse an on-disk record, verifying its checksum if it carries one.
    pub fn from_toml(content: &str) -> MigrateResult<Self> {
        let doc: RevisionDoc = toml::from_str(content)
            .map_err(|e| MigrationError::invalid_revision(format!("malformed record: {}", e)))?;

        let revision = Self {
            id: doc.id,
            parents: doc.parents,
            message: doc.message,
            created_at: doc.created_at,
            upgrade_ops: doc.upgrade_ops,
            downgrade_ops: doc.downgrade_ops,
        };

        if let Some(stored) = doc.checksum {
            let computed = revision.checksum();
            if stored != computed {
                return Err(MigrationError::invalid_revision(format!(
                    "revision '{}' was modified after being written (checksum {} != {})",
                    revision.id, computed, stored
                )));
            }
        }

        Ok(revision)
    }
}

/// On-disk shape of a revision record. Scalars first so the TOML writer
/// emits them before the op tables.
#[derive(Serialize, Deserialize)]
struct RevisionDoc {
    id: String,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,
    #[serde(default)]
    upgrade_ops: Vec<SchemaOp>,
    #[serde(default)]
    downgrade_ops: Vec<SchemaOp>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_schema::{Column, SqlType, Table};

    fn sample_revision() -> Revision {
        let table = Table::new("users")
            .column(Column::new("id", SqlType::BigInt))
            .primary_key(["id"]);
        let up = vec![SchemaOp::CreateTable {
            table: table.clone(),
        }];
        let down = vec![SchemaOp::DropTable { table }];
        Revision::new("a1b2c3d4e5f6", Vec::new(), up, down).with_message("create users")
    }

    #[test]
    fn test_round_trip() {
        let revision = sample_revision();
        let encoded = revision.to_toml().unwrap();
        let decoded = Revision::from_toml(&encoded).unwrap();
        assert_eq!(decoded, revision);
    }

    #[test]
    fn test_base_and_merge_flags() {
        let revision = sample_revision();
        assert!(revision.is_base());
        assert!(!revision.is_merge());

        let child = Revision::new("b2c3d4e5f6a1", vec!["a1b2c3d4e5f6".into()], vec![], vec![]);
        assert!(!child.is_base());

        let merge = Revision::new(
            "c3d4e5f6a1b2",
            vec!["a1b2c3d4e5f6".into(), "b2c3d4e5f6a1".into()],
            vec![],
            vec![],
        );
        assert!(merge.is_merge());
    }

    #[test]
    fn test_tampered_record_rejected() {
        let revision = sample_revision();
        let encoded = revision.to_toml().unwrap();
        let tampered = encoded.replace("users", "accounts");

        let err = Revision::from_toml(&tampered).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidRevision(_)));
    }

    #[test]
    fn test_record_without_checksum_accepted() {
        // Hand-authored records (e.g. a merge revision) may omit the
        // checksum field.
        let content = r#"
id = "c3d4e5f6a1b2"
parents = ["a1b2c3d4e5f6", "b2c3d4e5f6a1"]
message = "merge branches"
created_at = "2026-01-15T10:00:00Z"
"#;
        let revision = Revision::from_toml(content).unwrap();
        assert!(revision.is_merge());
        assert!(!revision.has_changes());
    }

    #[test]
    fn test_checksum_stable_across_metadata() {
        let a = sample_revision();
        let mut b = a.clone();
        b.message = Some("different message".to_string());
        // Checksums cover the op bodies only.
        assert_eq!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_malformed_record_rejected() {
        let err = Revision::from_toml("not toml at all [[").unwrap_err();
        assert!(matches!(err, MigrationError::InvalidRevision(_)));
    }
}
