//! The revision graph.
//!
//! Revisions form a directed acyclic graph: each record names its
//! parent(s), and the graph derives the reverse (children) index plus the
//! symbolic anchors `head` (no children) and `base` (no parents). The
//! graph is built once per engine from the store and queried by id; it is
//! read-only after construction.
//!
//! Wherever an ordering among siblings matters (several heads, several
//! parents at a merge point), the graph orders by recency: most recent
//! `created_at` first, ties broken by lexically greatest id. This rule is
//! what makes range resolution over branched history deterministic.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};

use crate::error::{MigrateResult, MigrationError};
use crate::revision::Revision;

/// Symbolic name of the tip(s) of history.
pub const HEAD: &str = "head";
/// Symbolic name of the state before any revision.
pub const BASE: &str = "base";
/// Symbolic name of the database's current revision.
pub const CURRENT: &str = "current";

/// An immutable index over all revisions in the store.
#[derive(Debug, Clone)]
pub struct RevisionGraph {
    revisions: HashMap<String, Revision>,
    /// Child ids per revision id, most recent first.
    children: HashMap<String, Vec<String>>,
    /// Head ids, most recent first.
    heads: Vec<String>,
    /// Base ids, most recent first.
    bases: Vec<String>,
}

impl RevisionGraph {
    /// Build the graph from a set of revision records.
    ///
    /// Fails when two records share an id, a parent reference points at a
    /// record that does not exist, or the records form a cycle.
    pub fn build(records: Vec<Revision>) -> MigrateResult<Self> {
        let mut revisions: HashMap<String, Revision> = HashMap::with_capacity(records.len());
        for revision in records {
            if let Some(existing) = revisions.insert(revision.id.clone(), revision) {
                return Err(MigrationError::broken_history(format!(
                    "duplicate revision id '{}'",
                    existing.id
                )));
            }
        }

        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for revision in revisions.values() {
            for parent in &revision.parents {
                if !revisions.contains_key(parent) {
                    return Err(MigrationError::broken_history(format!(
                        "revision '{}' references missing parent '{}'",
                        revision.id, parent
                    )));
                }
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(revision.id.clone());
            }
        }

        for child_ids in children.values_mut() {
            sort_by_recency(child_ids, &revisions);
        }

        let mut heads: Vec<String> = revisions
            .keys()
            .filter(|id| !children.contains_key(*id))
            .cloned()
            .collect();
        sort_by_recency(&mut heads, &revisions);

        let mut bases: Vec<String> = revisions
            .values()
            .filter(|r| r.is_base())
            .map(|r| r.id.clone())
            .collect();
        sort_by_recency(&mut bases, &revisions);

        let graph = Self {
            revisions,
            children,
            heads,
            bases,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    /// Kahn's algorithm over parent->child edges; anything left over sits
    /// on a cycle.
    fn check_acyclic(&self) -> MigrateResult<()> {
        let mut remaining_parents: HashMap<&str, usize> = self
            .revisions
            .values()
            .map(|r| (r.id.as_str(), r.parents.len()))
            .collect();

        let mut queue: VecDeque<&str> = self.bases.iter().map(String::as_str).collect();
        let mut visited = 0usize;

        while let Some(id) = queue.pop_front() {
            visited += 1;
            for child in self.children_of(id) {
                if let Some(count) = remaining_parents.get_mut(child.as_str()) {
                    *count -= 1;
                    if *count == 0 {
                        queue.push_back(child.as_str());
                    }
                }
            }
        }

        if visited != self.revisions.len() {
            let mut on_cycle: Vec<&str> = remaining_parents
                .iter()
                .filter(|(_, count)| **count > 0)
                .map(|(id, _)| *id)
                .collect();
            on_cycle.sort_unstable();
            return Err(MigrationError::broken_history(format!(
                "revision history contains a cycle through: {}",
                on_cycle.join(", ")
            )));
        }

        Ok(())
    }

    /// Number of revisions.
    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    /// Whether the store holds no revisions.
    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    /// Look up a revision by exact id.
    pub fn get(&self, id: &str) -> Option<&Revision> {
        self.revisions.get(id)
    }

    /// All revision ids.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.revisions.keys().map(String::as_str)
    }

    /// Head revisions (no children), most recent first.
    pub fn heads(&self) -> &[String] {
        &self.heads
    }

    /// Base revisions (no parents), most recent first.
    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    /// Children of a revision, most recent first.
    pub fn children_of(&self, id: &str) -> &[String] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The parent to follow when walking down from `revision`.
    ///
    /// For a merge revision this is the most recently created parent,
    /// which by the graph's ordering rule defines the canonical path
    /// through branched history.
    pub fn primary_parent(&self, revision: &Revision) -> Option<&Revision> {
        let mut parent_ids: Vec<String> = revision.parents.clone();
        sort_by_recency(&mut parent_ids, &self.revisions);
        parent_ids.first().and_then(|id| self.revisions.get(id))
    }

    /// Resolve a revision reference: an exact id, or a unique id prefix.
    pub fn resolve_id(&self, reference: &str) -> MigrateResult<&Revision> {
        if let Some(revision) = self.revisions.get(reference) {
            return Ok(revision);
        }

        let mut matches: Vec<&Revision> = self
            .revisions
            .values()
            .filter(|r| r.id.starts_with(reference))
            .collect();

        match matches.len() {
            0 => Err(MigrationError::RevisionNotFound(reference.to_string())),
            1 => Ok(matches.remove(0)),
            _ => {
                let mut candidates: Vec<String> = matches.iter().map(|r| r.id.clone()).collect();
                candidates.sort_unstable();
                Err(MigrationError::AmbiguousRevision {
                    symbol: reference.to_string(),
                    candidates,
                })
            }
        }
    }

    /// Resolve the unqualified `head` symbol to the single head.
    ///
    /// Fails with the candidate set when history has branched and the
    /// caller did not name which tip it means. `None` when the store is
    /// empty.
    pub fn single_head(&self) -> MigrateResult<Option<&Revision>> {
        match self.heads.len() {
            0 => Ok(None),
            1 => Ok(self.revisions.get(&self.heads[0])),
            _ => Err(MigrationError::AmbiguousRevision {
                symbol: HEAD.to_string(),
                candidates: self.heads.clone(),
            }),
        }
    }

    /// Ids of every revision reachable by following parents from `id`,
    /// including `id` itself.
    pub fn ancestors_of(&self, id: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(revision) = self.revisions.get(&current) {
                stack.extend(revision.parents.iter().cloned());
            }
        }
        seen
    }
}

/// Sort ids most-recent-first: latest `created_at`, then greatest id.
fn sort_by_recency(ids: &mut [String], revisions: &HashMap<String, Revision>) {
    ids.sort_by(|a, b| {
        let key = |id: &String| -> (DateTime<Utc>, String) {
            revisions
                .get(id)
                .map(|r| (r.created_at, r.id.clone()))
                .unwrap_or((DateTime::<Utc>::MIN_UTC, id.clone()))
        };
        key(b).cmp(&key(a))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    /// A revision with no ops, created `minutes` after a fixed epoch.
    fn rev(id: &str, parents: &[&str], minutes: i64) -> Revision {
        let mut revision = Revision::new(
            id,
            parents.iter().map(|p| p.to_string()).collect(),
            Vec::new(),
            Vec::new(),
        );
        revision.created_at = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(minutes);
        revision
    }

    fn linear_graph() -> RevisionGraph {
        RevisionGraph::build(vec![
            rev("aaa111", &[], 0),
            rev("bbb222", &["aaa111"], 1),
            rev("ccc333", &["bbb222"], 2),
        ])
        .unwrap()
    }

    #[test]
    fn test_linear_heads_and_bases() {
        let graph = linear_graph();
        assert_eq!(graph.heads(), &["ccc333".to_string()]);
        assert_eq!(graph.bases(), &["aaa111".to_string()]);
        assert_eq!(graph.children_of("aaa111"), &["bbb222".to_string()]);
        assert_eq!(graph.single_head().unwrap().unwrap().id, "ccc333");
    }

    #[test]
    fn test_branched_heads_sorted_by_recency() {
        let graph = RevisionGraph::build(vec![
            rev("aaa111", &[], 0),
            rev("bbb222", &["aaa111"], 1),
            rev("ccc333", &["aaa111"], 2),
        ])
        .unwrap();

        // ccc333 is newer, so it sorts first.
        assert_eq!(graph.heads(), &["ccc333".to_string(), "bbb222".to_string()]);

        let err = graph.single_head().unwrap_err();
        match err {
            MigrationError::AmbiguousRevision { symbol, candidates } => {
                assert_eq!(symbol, "head");
                assert_eq!(candidates.len(), 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_recency_tie_broken_by_id() {
        let graph = RevisionGraph::build(vec![
            rev("aaa111", &[], 0),
            rev("bbb222", &["aaa111"], 5),
            rev("ccc333", &["aaa111"], 5),
        ])
        .unwrap();

        assert_eq!(graph.heads(), &["ccc333".to_string(), "bbb222".to_string()]);
    }

    #[test]
    fn test_merge_primary_parent_is_most_recent() {
        let graph = RevisionGraph::build(vec![
            rev("aaa111", &[], 0),
            rev("bbb222", &["aaa111"], 1),
            rev("ccc333", &["aaa111"], 2),
            rev("ddd444", &["bbb222", "ccc333"], 3),
        ])
        .unwrap();

        let merge = graph.get("ddd444").unwrap();
        assert_eq!(graph.primary_parent(merge).unwrap().id, "ccc333");
    }

    #[test]
    fn test_missing_parent_rejected() {
        let err = RevisionGraph::build(vec![rev("bbb222", &["nowhere"], 1)]).unwrap_err();
        assert!(matches!(err, MigrationError::BrokenHistory(_)));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err =
            RevisionGraph::build(vec![rev("aaa111", &[], 0), rev("aaa111", &[], 1)]).unwrap_err();
        assert!(matches!(err, MigrationError::BrokenHistory(_)));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = RevisionGraph::build(vec![
            rev("aaa111", &["bbb222"], 0),
            rev("bbb222", &["aaa111"], 1),
        ])
        .unwrap_err();
        match err {
            MigrationError::BrokenHistory(msg) => assert!(msg.contains("cycle")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_exact_and_prefix() {
        let graph = linear_graph();
        assert_eq!(graph.resolve_id("bbb222").unwrap().id, "bbb222");
        assert_eq!(graph.resolve_id("bbb").unwrap().id, "bbb222");
    }

    #[test]
    fn test_resolve_unknown() {
        let graph = linear_graph();
        assert!(matches!(
            graph.resolve_id("zzz").unwrap_err(),
            MigrationError::RevisionNotFound(_)
        ));
    }

    #[test]
    fn test_resolve_ambiguous_prefix() {
        let graph = RevisionGraph::build(vec![
            rev("abc111", &[], 0),
            rev("abc222", &["abc111"], 1),
        ])
        .unwrap();

        match graph.resolve_id("abc").unwrap_err() {
            MigrationError::AmbiguousRevision { candidates, .. } => {
                assert_eq!(candidates, vec!["abc111".to_string(), "abc222".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_ancestors() {
        let graph = RevisionGraph::build(vec![
            rev("aaa111", &[], 0),
            rev("bbb222", &["aaa111"], 1),
            rev("ccc333", &["aaa111"], 2),
            rev("ddd444", &["bbb222", "ccc333"], 3),
        ])
        .unwrap();

        let ancestors = graph.ancestors_of("ddd444");
        assert_eq!(ancestors.len(), 4);
        assert!(graph.ancestors_of("bbb222").contains("aaa111"));
        assert!(!graph.ancestors_of("bbb222").contains("ccc333"));
    }

    #[test]
    fn test_empty_graph() {
        let graph = RevisionGraph::build(Vec::new()).unwrap();
        assert!(graph.is_empty());
        assert!(graph.heads().is_empty());
        assert!(graph.single_head().unwrap().is_none());
    }
}
