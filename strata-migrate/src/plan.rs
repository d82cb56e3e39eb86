//! Plan resolution.
//!
//! A plan is the ordered list of revision steps one upgrade or downgrade
//! request traverses. Plans are ephemeral: resolved per operation from the
//! revision graph and a pair of symbolic endpoints, then handed straight
//! to the executor.

use crate::error::{MigrateResult, MigrationError};
use crate::graph::{BASE, HEAD, RevisionGraph};
use crate::ops::SchemaOp;
use crate::revision::Revision;

/// Direction a step is traversed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Apply the revision's upgrade operations.
    Up,
    /// Apply the revision's downgrade operations.
    Down,
}

impl Direction {
    /// The word used in rendered output and logs.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Up => "upgrade",
            Self::Down => "downgrade",
        }
    }
}

/// One resolved step: a revision traversed in one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    /// The revision to traverse.
    pub revision: Revision,
    /// The direction to traverse it in.
    pub direction: Direction,
    /// The revision the database points at once this step completes:
    /// the step's own revision when upgrading, the previous position on
    /// the walked path when downgrading (`None` = base).
    pub lands_on: Option<String>,
}

impl PlanStep {
    /// The operations this step runs.
    pub fn ops(&self) -> &[SchemaOp] {
        match self.direction {
            Direction::Up => &self.revision.upgrade_ops,
            Direction::Down => &self.revision.downgrade_ops,
        }
    }
}

/// An ordered sequence of steps for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationPlan {
    /// Steps in execution order.
    pub steps: Vec<PlanStep>,
}

impl MigrationPlan {
    /// A plan with no steps.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Short description for logs.
    pub fn summary(&self) -> String {
        if self.steps.is_empty() {
            return "empty plan".to_string();
        }
        let ids: Vec<&str> = self.steps.iter().map(|s| s.revision.id.as_str()).collect();
        format!(
            "{} {} step(s): {}",
            self.steps[0].direction.verb(),
            self.steps.len(),
            ids.join(" -> ")
        )
    }
}

/// Resolves symbolic range requests into concrete plans.
pub struct PlanResolver<'g> {
    graph: &'g RevisionGraph,
}

impl<'g> PlanResolver<'g> {
    /// Create a resolver over a graph.
    pub fn new(graph: &'g RevisionGraph) -> Self {
        Self { graph }
    }

    /// Resolve an upgrade from `from` (`None` = base, otherwise an id or
    /// unique prefix) to `to` (`head`, an id, or a unique prefix).
    ///
    /// Steps come back oldest first, each traversed [`Direction::Up`].
    /// `from == to` yields an empty plan. When history has branched, the
    /// unqualified `head` is ambiguous and fails; walking down from an
    /// explicit destination resolves merge points toward the most recent
    /// parent, so the chosen path is deterministic.
    pub fn resolve_upgrade(&self, from: Option<&str>, to: &str) -> MigrateResult<MigrationPlan> {
        let from_id = self.resolve_start(from)?;

        let destination = if to == HEAD {
            match self.graph.single_head()? {
                Some(head) => head,
                None => return Ok(MigrationPlan::empty()),
            }
        } else if to == BASE {
            // Nothing is above base; only a no-op request can land there.
            return match from_id {
                None => Ok(MigrationPlan::empty()),
                Some(from_id) => Err(MigrationError::invalid_revision(format!(
                    "cannot upgrade from '{}' to 'base'; use downgrade",
                    from_id
                ))),
            };
        } else {
            self.graph.resolve_id(to)?
        };

        if from_id == Some(destination.id.as_str()) {
            return Ok(MigrationPlan::empty());
        }

        let mut chain = Vec::new();
        let mut cursor = Some(destination.clone());
        let mut reached_start = from_id.is_none();

        while let Some(revision) = cursor {
            if from_id == Some(revision.id.as_str()) {
                reached_start = true;
                break;
            }
            cursor = self.graph.primary_parent(&revision).cloned();
            chain.push(revision);
        }

        if !reached_start {
            return Err(MigrationError::invalid_revision(format!(
                "revision '{}' is not on the path to '{}'",
                from_id.unwrap_or(BASE),
                destination.id
            )));
        }

        chain.reverse();
        Ok(MigrationPlan {
            steps: chain
                .into_iter()
                .map(|revision| PlanStep {
                    lands_on: Some(revision.id.clone()),
                    revision,
                    direction: Direction::Up,
                })
                .collect(),
        })
    }

    /// Resolve a downgrade from `from` (usually the database's current
    /// revision; `None` = base) down to `to` (`base`, an id, or a unique
    /// prefix). `to` itself stays applied.
    ///
    /// Steps come back newest first, each traversed [`Direction::Down`].
    pub fn resolve_downgrade(&self, from: Option<&str>, to: &str) -> MigrateResult<MigrationPlan> {
        let from_id = self.resolve_start(from)?;

        let destination = if to == BASE {
            None
        } else if to == HEAD {
            self.graph.single_head()?.map(|r| r.id.clone())
        } else {
            Some(self.graph.resolve_id(to)?.id.clone())
        };

        let Some(from_id) = from_id else {
            // Already at base; there is nothing below to revert.
            return Ok(MigrationPlan::empty());
        };

        if destination.as_deref() == Some(from_id) {
            return Ok(MigrationPlan::empty());
        }

        let start = self.graph.resolve_id(from_id)?.clone();
        let mut steps = Vec::new();
        let mut cursor = Some(start);
        let mut reached_destination = destination.is_none();

        while let Some(revision) = cursor {
            if destination.as_deref() == Some(revision.id.as_str()) {
                reached_destination = true;
                break;
            }
            cursor = self.graph.primary_parent(&revision).cloned();
            steps.push(PlanStep {
                lands_on: cursor.as_ref().map(|r| r.id.clone()),
                revision,
                direction: Direction::Down,
            });
        }

        if !reached_destination {
            return Err(MigrationError::invalid_revision(format!(
                "revision '{}' is not below current revision '{}'",
                destination.as_deref().unwrap_or(BASE),
                from_id
            )));
        }

        Ok(MigrationPlan { steps })
    }

    /// Normalize a starting reference to a concrete id (or base).
    fn resolve_start(&self, from: Option<&str>) -> MigrateResult<Option<&str>> {
        match from {
            None => Ok(None),
            Some(BASE) => Ok(None),
            Some(reference) => Ok(Some(self.graph.resolve_id(reference)?.id.as_str())),
        }
    }
}
