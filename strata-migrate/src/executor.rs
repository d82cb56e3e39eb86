//! Plan execution.
//!
//! One executor drives a resolved plan step by step; where the statements
//! go is decided by the [`StepSink`]: [`ConnectionSink`] executes them on
//! a live connection, [`RenderSink`] appends them to a SQL script. Both
//! sinks see the identical statement stream, which is what keeps online
//! execution and offline rendering semantically equivalent.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::dialect::SqlDialect;
use crate::error::{MigrateResult, MigrationError};
use crate::plan::{MigrationPlan, PlanStep};

/// Transaction boundary granularity for one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionGranularity {
    /// One transaction wraps the whole plan; any failure rolls back every
    /// step of the invocation.
    #[default]
    WholePlan,
    /// Each step commits on its own; a mid-plan failure leaves earlier
    /// steps applied and the run resumable from the failed step.
    PerStep,
}

/// Destination for the statements a plan produces.
#[async_trait]
pub trait StepSink: Send {
    /// Deliver one SQL statement.
    async fn execute(&mut self, sql: &str) -> MigrateResult<()>;

    /// Open a transaction boundary.
    async fn begin(&mut self) -> MigrateResult<()>;

    /// Commit the current transaction boundary.
    async fn commit(&mut self) -> MigrateResult<()>;

    /// Abandon the current transaction boundary.
    async fn rollback(&mut self) -> MigrateResult<()>;

    /// Record that the database now sits at `revision`.
    async fn move_pointer(&mut self, revision: Option<&str>) -> MigrateResult<()>;

    /// Attach a human-readable note to the output stream.
    async fn annotate(&mut self, note: &str) -> MigrateResult<()>;
}

/// Sink that executes statements on a live connection.
pub struct ConnectionSink<'a> {
    conn: &'a mut dyn Connection,
}

impl<'a> ConnectionSink<'a> {
    /// Wrap a connection.
    pub fn new(conn: &'a mut dyn Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StepSink for ConnectionSink<'_> {
    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        debug!(sql = %sql, "executing statement");
        self.conn.execute(sql).await
    }

    async fn begin(&mut self) -> MigrateResult<()> {
        self.conn.begin().await
    }

    async fn commit(&mut self) -> MigrateResult<()> {
        self.conn.commit().await
    }

    async fn rollback(&mut self) -> MigrateResult<()> {
        self.conn.rollback().await
    }

    async fn move_pointer(&mut self, revision: Option<&str>) -> MigrateResult<()> {
        self.conn.set_current_revision(revision).await
    }

    async fn annotate(&mut self, note: &str) -> MigrateResult<()> {
        debug!("{}", note);
        Ok(())
    }
}

/// Sink that renders the plan as a literal SQL script.
pub struct RenderSink<'d> {
    dialect: &'d dyn SqlDialect,
    out: String,
}

impl<'d> RenderSink<'d> {
    /// Create an empty script sink.
    pub fn new(dialect: &'d dyn SqlDialect) -> Self {
        Self {
            dialect,
            out: String::new(),
        }
    }

    /// The rendered script.
    pub fn into_sql(self) -> String {
        self.out
    }

    fn push_stmt(&mut self, stmt: &str) {
        self.out.push_str(stmt);
        self.out.push_str("\n\n");
    }
}

#[async_trait]
impl StepSink for RenderSink<'_> {
    async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
        self.push_stmt(sql);
        Ok(())
    }

    async fn begin(&mut self) -> MigrateResult<()> {
        let stmt = self.dialect.begin_transaction();
        self.push_stmt(stmt);
        Ok(())
    }

    async fn commit(&mut self) -> MigrateResult<()> {
        let stmt = self.dialect.commit_transaction();
        self.push_stmt(stmt);
        Ok(())
    }

    async fn rollback(&mut self) -> MigrateResult<()> {
        // Rendering never fails a statement; nothing to abandon.
        Ok(())
    }

    async fn move_pointer(&mut self, revision: Option<&str>) -> MigrateResult<()> {
        let sql = self.dialect.set_version_sql(revision);
        self.push_stmt(&sql);
        Ok(())
    }

    async fn annotate(&mut self, note: &str) -> MigrateResult<()> {
        self.out.push_str("-- ");
        self.out.push_str(note);
        self.out.push('\n');
        Ok(())
    }
}

/// Applies (or renders) a resolved plan.
pub struct Executor<'d> {
    dialect: &'d dyn SqlDialect,
    granularity: TransactionGranularity,
}

impl<'d> Executor<'d> {
    /// Create an executor.
    pub fn new(dialect: &'d dyn SqlDialect, granularity: TransactionGranularity) -> Self {
        Self {
            dialect,
            granularity,
        }
    }

    /// Run `plan` into `sink`.
    ///
    /// `starting_revision` is where the database stood before the plan;
    /// it seeds the step annotations and the `last_applied` carried by a
    /// per-step failure. After every successful step the pointer is moved
    /// before the next step begins, so partial progress is always
    /// observable and a rerun resumes where this one stopped.
    pub async fn run(
        &self,
        plan: &MigrationPlan,
        sink: &mut dyn StepSink,
        starting_revision: Option<&str>,
    ) -> MigrateResult<()> {
        if plan.is_empty() {
            info!("plan is empty; nothing to do");
            return Ok(());
        }

        info!(summary = %plan.summary(), "running plan");

        match self.granularity {
            TransactionGranularity::WholePlan => {
                self.run_whole_plan(plan, sink, starting_revision).await
            }
            TransactionGranularity::PerStep => {
                self.run_per_step(plan, sink, starting_revision).await
            }
        }
    }

    async fn run_whole_plan(
        &self,
        plan: &MigrationPlan,
        sink: &mut dyn StepSink,
        starting_revision: Option<&str>,
    ) -> MigrateResult<()> {
        sink.begin().await?;

        let mut at = starting_revision.map(str::to_string);
        for step in &plan.steps {
            if let Err(err) = self.apply_step(step, sink, at.as_deref()).await {
                // Release the boundary, then surface the fault unchanged.
                if let Err(rollback_err) = sink.rollback().await {
                    warn!(error = %rollback_err, "rollback failed after plan failure");
                }
                return Err(err);
            }
            at = step.lands_on.clone();
        }

        sink.commit().await
    }

    async fn run_per_step(
        &self,
        plan: &MigrationPlan,
        sink: &mut dyn StepSink,
        starting_revision: Option<&str>,
    ) -> MigrateResult<()> {
        let mut last_applied = starting_revision.map(str::to_string);

        for step in &plan.steps {
            sink.begin().await?;

            match self.apply_step(step, sink, last_applied.as_deref()).await {
                Ok(()) => sink.commit().await?,
                Err(err) => {
                    if let Err(rollback_err) = sink.rollback().await {
                        warn!(error = %rollback_err, "rollback failed after step failure");
                    }
                    return Err(MigrationError::PartialMigration {
                        failed: step.revision.id.clone(),
                        last_applied,
                        source: Box::new(err),
                    });
                }
            }

            last_applied = step.lands_on.clone();
        }

        Ok(())
    }

    /// Apply one step: its operations, then the pointer move.
    async fn apply_step(
        &self,
        step: &PlanStep,
        sink: &mut dyn StepSink,
        from: Option<&str>,
    ) -> MigrateResult<()> {
        sink.annotate(&format!(
            "Running {} {} -> {}",
            step.direction.verb(),
            from.unwrap_or("base"),
            step.lands_on.as_deref().unwrap_or("base"),
        ))
        .await?;

        for op in step.ops() {
            for statement in self.dialect.render_op(op) {
                sink.execute(&statement)
                    .await
                    .map_err(|e| MigrationError::in_step(&step.revision.id, e))?;
            }
        }

        sink.move_pointer(step.lands_on.as_deref())
            .await
            .map_err(|e| MigrationError::in_step(&step.revision.id, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresDialect;
    use crate::ops::SchemaOp;
    use crate::plan::{Direction, PlanStep};
    use crate::revision::Revision;
    use strata_schema::{Column, SqlType};

    /// Sink that records everything and can fail on a matching statement.
    #[derive(Default)]
    struct RecordingSink {
        events: Vec<String>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl StepSink for RecordingSink {
        async fn execute(&mut self, sql: &str) -> MigrateResult<()> {
            if let Some(marker) = &self.fail_on
                && sql.contains(marker.as_str())
            {
                return Err(MigrationError::database(format!("refused: {}", sql)));
            }
            self.events.push(format!("exec: {}", sql));
            Ok(())
        }

        async fn begin(&mut self) -> MigrateResult<()> {
            self.events.push("begin".to_string());
            Ok(())
        }

        async fn commit(&mut self) -> MigrateResult<()> {
            self.events.push("commit".to_string());
            Ok(())
        }

        async fn rollback(&mut self) -> MigrateResult<()> {
            self.events.push("rollback".to_string());
            Ok(())
        }

        async fn move_pointer(&mut self, revision: Option<&str>) -> MigrateResult<()> {
            self.events
                .push(format!("pointer: {}", revision.unwrap_or("base")));
            Ok(())
        }

        async fn annotate(&mut self, _note: &str) -> MigrateResult<()> {
            Ok(())
        }
    }

    fn add_column_op(table: &str, column: &str) -> SchemaOp {
        SchemaOp::AddColumn {
            table: table.to_string(),
            column: Column::new(column, SqlType::Text),
        }
    }

    fn up_step(id: &str, parent: Option<&str>, op: SchemaOp) -> PlanStep {
        PlanStep {
            revision: Revision::new(
                id,
                parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
                vec![op.clone()],
                vec![op.invert()],
            ),
            direction: Direction::Up,
            lands_on: Some(id.to_string()),
        }
    }

    fn three_step_plan() -> MigrationPlan {
        MigrationPlan {
            steps: vec![
                up_step("aaa111", None, add_column_op("users", "one")),
                up_step("bbb222", Some("aaa111"), add_column_op("users", "two")),
                up_step("ccc333", Some("bbb222"), add_column_op("users", "three")),
            ],
        }
    }

    #[tokio::test]
    async fn test_whole_plan_single_transaction() {
        let dialect = PostgresDialect::new();
        let executor = Executor::new(&dialect, TransactionGranularity::WholePlan);
        let mut sink = RecordingSink::default();

        executor
            .run(&three_step_plan(), &mut sink, None)
            .await
            .unwrap();

        assert_eq!(sink.events.first().map(String::as_str), Some("begin"));
        assert_eq!(sink.events.last().map(String::as_str), Some("commit"));
        assert_eq!(sink.events.iter().filter(|e| *e == "begin").count(), 1);
        assert_eq!(sink.events.iter().filter(|e| *e == "commit").count(), 1);
        // Pointer advances once per step, inside the transaction.
        let pointers: Vec<_> = sink
            .events
            .iter()
            .filter(|e| e.starts_with("pointer"))
            .collect();
        assert_eq!(
            pointers,
            vec!["pointer: aaa111", "pointer: bbb222", "pointer: ccc333"]
        );
    }

    #[tokio::test]
    async fn test_per_step_transactions() {
        let dialect = PostgresDialect::new();
        let executor = Executor::new(&dialect, TransactionGranularity::PerStep);
        let mut sink = RecordingSink::default();

        executor
            .run(&three_step_plan(), &mut sink, None)
            .await
            .unwrap();

        assert_eq!(sink.events.iter().filter(|e| *e == "begin").count(), 3);
        assert_eq!(sink.events.iter().filter(|e| *e == "commit").count(), 3);
    }

    #[tokio::test]
    async fn test_whole_plan_failure_rolls_back() {
        let dialect = PostgresDialect::new();
        let executor = Executor::new(&dialect, TransactionGranularity::WholePlan);
        let mut sink = RecordingSink {
            fail_on: Some("\"two\"".to_string()),
            ..Default::default()
        };

        let err = executor
            .run(&three_step_plan(), &mut sink, None)
            .await
            .unwrap_err();

        // The step context wraps the database fault; no partial error.
        match err {
            MigrationError::Step { revision, .. } => assert_eq!(revision, "bbb222"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(sink.events.last().map(String::as_str), Some("rollback"));
        assert!(!sink.events.iter().any(|e| e == "commit"));
    }

    #[tokio::test]
    async fn test_per_step_failure_is_partial() {
        let dialect = PostgresDialect::new();
        let executor = Executor::new(&dialect, TransactionGranularity::PerStep);
        let mut sink = RecordingSink {
            fail_on: Some("\"two\"".to_string()),
            ..Default::default()
        };

        let err = executor
            .run(&three_step_plan(), &mut sink, None)
            .await
            .unwrap_err();

        match err {
            MigrationError::PartialMigration {
                failed,
                last_applied,
                ..
            } => {
                assert_eq!(failed, "bbb222");
                assert_eq!(last_applied, Some("aaa111".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // Step one committed before the failure.
        assert_eq!(sink.events.iter().filter(|e| *e == "commit").count(), 1);
        assert_eq!(sink.events.last().map(String::as_str), Some("rollback"));
    }

    #[tokio::test]
    async fn test_empty_plan_touches_nothing() {
        let dialect = PostgresDialect::new();
        let executor = Executor::new(&dialect, TransactionGranularity::WholePlan);
        let mut sink = RecordingSink::default();

        executor
            .run(&MigrationPlan::empty(), &mut sink, None)
            .await
            .unwrap();

        assert!(sink.events.is_empty());
    }

    #[tokio::test]
    async fn test_render_whole_plan_markers() {
        let dialect = PostgresDialect::new();
        let executor = Executor::new(&dialect, TransactionGranularity::WholePlan);
        let mut sink = RenderSink::new(&dialect);

        executor
            .run(&three_step_plan(), &mut sink, None)
            .await
            .unwrap();

        let sql = sink.into_sql();
        assert_eq!(sql.matches("BEGIN;").count(), 1);
        assert_eq!(sql.matches("COMMIT;").count(), 1);
        assert!(sql.contains("-- Running upgrade base -> aaa111"));
        assert!(sql.contains("ALTER TABLE \"users\" ADD COLUMN \"two\" TEXT NOT NULL;"));
        assert!(sql.contains("INSERT INTO \"_strata_version\""));
    }

    #[tokio::test]
    async fn test_render_per_step_markers() {
        let dialect = PostgresDialect::new();
        let executor = Executor::new(&dialect, TransactionGranularity::PerStep);
        let mut sink = RenderSink::new(&dialect);

        executor
            .run(&three_step_plan(), &mut sink, None)
            .await
            .unwrap();

        let sql = sink.into_sql();
        assert_eq!(sql.matches("BEGIN;").count(), 3);
        assert_eq!(sql.matches("COMMIT;").count(), 3);
    }

    #[tokio::test]
    async fn test_annotations_name_previous_revision() {
        let dialect = PostgresDialect::new();
        let executor = Executor::new(&dialect, TransactionGranularity::WholePlan);
        let mut sink = RenderSink::new(&dialect);

        executor
            .run(&three_step_plan(), &mut sink, Some("zzz999"))
            .await
            .unwrap();

        let sql = sink.into_sql();
        assert!(sql.contains("-- Running upgrade zzz999 -> aaa111"));
        assert!(sql.contains("-- Running upgrade aaa111 -> bbb222"));
    }
}
