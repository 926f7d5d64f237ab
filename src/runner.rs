//! High-level runner API for the warehouse pipeline.
//!
//! This module provides the public interface that encapsulates loading
//! configuration, opening the warehouse connection, rendering the statement
//! catalog and executing it stage by stage.
//!
//! This is the primary API for external users and for the CLI.

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ClusterConfig, PipelineConfig};
use crate::io::{S3ObjectStore, preflight};
use crate::telemetry::StageEvent;

pub use crate::config::DEFAULT_CONFIG_PATH;
pub use crate::db::{ConnectArgs, ConnectArgsBuilder, Warehouse, connect};
pub use crate::error::{ConfigError, PipelineError};
pub use crate::sql::{Dialect, Statement, StatementCatalog, StatementKind, Table};
pub use crate::telemetry::{RunStats, StageTiming};

/// One step of a pipeline run; each must finish before the next begins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Drop,
    Create,
    Truncate,
    Load,
    Transform,
    Verify,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Drop => "drop",
            Stage::Create => "create",
            Stage::Truncate => "truncate",
            Stage::Load => "load",
            Stage::Transform => "transform",
            Stage::Verify => "verify",
        }
    }

    /// Classify a failed statement of this stage
    fn error(self, statement: String, source: sqlx::Error) -> PipelineError {
        match self {
            Stage::Drop | Stage::Create | Stage::Truncate => PipelineError::Ddl { statement, source },
            Stage::Load => PipelineError::Load { statement, source },
            Stage::Transform => PipelineError::Transform { statement, source },
            Stage::Verify => PipelineError::Verify { statement, source },
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stages a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// Reset, load, transform, verify
    Full,
    /// Drop and recreate every table
    CreateTables,
    /// Empty the existing tables, then load, transform, verify
    Etl,
    /// Row-count diagnostics only
    Counts,
}

impl RunMode {
    pub fn stages(self) -> &'static [Stage] {
        match self {
            RunMode::Full => &[
                Stage::Drop,
                Stage::Create,
                Stage::Load,
                Stage::Transform,
                Stage::Verify,
            ],
            RunMode::CreateTables => &[Stage::Drop, Stage::Create],
            RunMode::Etl => &[Stage::Truncate, Stage::Load, Stage::Transform, Stage::Verify],
            RunMode::Counts => &[Stage::Verify],
        }
    }

    /// Whether the run reads from object storage
    pub fn loads(self) -> bool {
        self.stages().contains(&Stage::Load)
    }
}

/// Arguments for a pipeline run
#[derive(Debug)]
pub struct RunArgs {
    pub config_path: PathBuf,
    pub mode: RunMode,
    /// Check that every source location holds objects before connecting
    pub preflight: bool,
    pub quiet: bool,

    // Test-only: inject a pre-opened connection (for SQLite testing)
    #[cfg(test)]
    pub test_warehouse: Option<Warehouse>,
}

/// Row count of one table after a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

/// Result of a completed pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub mode: RunMode,
    pub stages: Vec<Stage>,
    /// Present when the verify stage ran
    pub row_counts: Vec<TableCount>,
    pub stats: RunStats,
    pub duration_ms: u64,
}

/// Executes the statement catalog against one warehouse connection
///
/// Every operation runs its statements strictly in order and stops at the
/// first failure, which is returned to the caller unchanged. Nothing is
/// retried.
pub struct Pipeline {
    warehouse: Warehouse,
    catalog: StatementCatalog,
    stats: RunStats,
    progress: ProgressBar,
}

impl Pipeline {
    pub fn new(warehouse: Warehouse, catalog: StatementCatalog) -> Self {
        Self {
            warehouse,
            catalog,
            stats: RunStats::new(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    #[cfg(test)]
    pub fn warehouse_mut(&mut self) -> &mut Warehouse {
        &mut self.warehouse
    }

    /// Drop every table if present, then create them all empty
    ///
    /// Safe on an empty warehouse and on one that already holds these tables.
    pub async fn reset_schema(&mut self) -> Result<(), PipelineError> {
        self.run_stage(Stage::Drop).await?;
        self.run_stage(Stage::Create).await
    }

    /// Remove every row from every table, keeping the schema
    pub async fn clear_tables(&mut self) -> Result<(), PipelineError> {
        self.run_stage(Stage::Truncate).await
    }

    /// Bulk-copy both staging tables from object storage
    pub async fn load_staging(&mut self) -> Result<(), PipelineError> {
        self.run_stage(Stage::Load).await
    }

    /// Populate the fact and dimension tables from staging
    pub async fn transform(&mut self) -> Result<(), PipelineError> {
        self.run_stage(Stage::Transform).await
    }

    /// Row count of every table, in catalog order
    pub async fn row_counts(&mut self) -> Result<Vec<TableCount>, PipelineError> {
        let stage = Stage::Verify;
        let stage_start = Instant::now();
        self.stats.update(&StageEvent::StageStarted { stage });
        info!(%stage, "stage started");

        let mut counts = Vec::with_capacity(self.catalog.row_counts.len());
        for statement in &self.catalog.row_counts {
            let start = Instant::now();
            let rows = self
                .warehouse
                .fetch_count(&statement.sql)
                .await
                .map_err(|source| {
                    error!(%stage, statement = %statement.name(), "diagnostic query failed: {source}");
                    self.progress.abandon();
                    stage.error(statement.name(), source)
                })?;

            let duration_ms = start.elapsed().as_millis() as u64;
            debug!(table = %statement.table, rows, duration_ms, "row count");
            self.stats.update(&StageEvent::StatementExecuted {
                rows_affected: 0,
                duration_ms,
            });
            self.progress.inc(1);

            counts.push(TableCount {
                table: statement.table.name().to_string(),
                rows,
            });
        }

        self.finish_stage(stage, stage_start);
        Ok(counts)
    }

    /// Run the stages of `mode` in order, returning row counts if verify ran
    pub async fn run(&mut self, mode: RunMode) -> Result<Vec<TableCount>, PipelineError> {
        let mut counts = Vec::new();
        for &stage in mode.stages() {
            if stage == Stage::Verify {
                counts = self.row_counts().await?;
            } else {
                self.run_stage(stage).await?;
            }
        }
        self.progress.finish_and_clear();
        Ok(counts)
    }

    /// Hand back the connection and the collected statistics
    pub fn into_parts(self) -> (Warehouse, RunStats) {
        (self.warehouse, self.stats)
    }

    async fn run_stage(&mut self, stage: Stage) -> Result<(), PipelineError> {
        let stage_start = Instant::now();
        self.stats.update(&StageEvent::StageStarted { stage });
        info!(%stage, "stage started");

        for statement in stage_statements(&self.catalog, stage) {
            self.progress.set_message(statement.name());
            let start = Instant::now();

            let rows_affected = self
                .warehouse
                .execute(&statement.sql)
                .await
                .map_err(|source| {
                    error!(%stage, statement = %statement.name(), "statement failed: {source}");
                    self.progress.abandon();
                    stage.error(statement.name(), source)
                })?;

            let duration_ms = start.elapsed().as_millis() as u64;
            debug!(statement = %statement.name(), rows_affected, duration_ms, "statement executed");
            self.stats.update(&StageEvent::StatementExecuted {
                rows_affected,
                duration_ms,
            });
            self.progress.inc(1);
        }

        self.finish_stage(stage, stage_start);
        Ok(())
    }

    fn finish_stage(&mut self, stage: Stage, stage_start: Instant) {
        let duration_ms = stage_start.elapsed().as_millis() as u64;
        self.stats
            .update(&StageEvent::StageCompleted { stage, duration_ms });
        info!(%stage, duration_ms, "stage completed");
    }
}

/// The catalog list a stage executes
fn stage_statements(catalog: &StatementCatalog, stage: Stage) -> &[Statement] {
    match stage {
        Stage::Drop => &catalog.drop_tables,
        Stage::Create => &catalog.create_tables,
        Stage::Truncate => &catalog.truncate_tables,
        Stage::Load => &catalog.copy_staging,
        Stage::Transform => &catalog.insert_tables,
        Stage::Verify => &catalog.row_counts,
    }
}

/// Render the production catalog without connecting anywhere
pub fn render_catalog(config_path: &Path) -> Result<StatementCatalog, PipelineError> {
    let config = PipelineConfig::load(config_path)?;
    Ok(StatementCatalog::build(Dialect::Redshift, &config.sources))
}

/// Run a pipeline with the specified arguments
///
/// This is the main entry point. It:
/// - Loads and validates configuration (before touching anything remote)
/// - Optionally checks the source locations in object storage
/// - Opens a single warehouse connection
/// - Executes the stages selected by `mode`, stopping at the first failure
///
/// # Example
///
/// ```no_run
/// use songplay_warehouse::runner::{RunArgs, RunMode, run_pipeline};
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// let args = RunArgs {
///     config_path: PathBuf::from("dwh.cfg"),
///     mode: RunMode::Full,
///     preflight: true,
///     quiet: true,
/// };
///
/// let report = run_pipeline(args).await?;
/// for count in &report.row_counts {
///     println!("{}: {}", count.table, count.rows);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn run_pipeline(args: RunArgs) -> Result<PipelineReport, PipelineError> {
    let start_time = Instant::now();
    let started_at = Utc::now();
    let run_id = Uuid::new_v4().to_string();
    info!(%run_id, mode = ?args.mode, "starting pipeline run");

    let config = PipelineConfig::load(&args.config_path)?;

    if args.preflight && args.mode.loads() {
        let store = S3ObjectStore::new(&config.sources.region).await;
        preflight(&store, &config.sources).await?;
    }

    // Open the connection (or use the test connection if provided)
    #[cfg(test)]
    let warehouse = if let Some(test_warehouse) = args.test_warehouse {
        test_warehouse
    } else {
        open_warehouse(&config.cluster).await?
    };

    #[cfg(not(test))]
    let warehouse = open_warehouse(&config.cluster).await?;

    let catalog = StatementCatalog::build(warehouse.dialect(), &config.sources);
    let progress = progress_bar(args.mode, &catalog, args.quiet);

    let mut pipeline = Pipeline::new(warehouse, catalog).with_progress(progress);
    let result = pipeline.run(args.mode).await;

    let (warehouse, stats) = pipeline.into_parts();
    if let Err(e) = warehouse.close().await {
        warn!("failed to close warehouse connection: {e}");
    }

    let row_counts = result?;
    let duration_ms = start_time.elapsed().as_millis() as u64;
    info!(%run_id, duration_ms, "pipeline run completed");

    Ok(PipelineReport {
        run_id,
        started_at,
        mode: args.mode,
        stages: stats.completed_stages(),
        row_counts,
        stats,
        duration_ms,
    })
}

async fn open_warehouse(cluster: &ClusterConfig) -> Result<Warehouse, PipelineError> {
    let connect_args = ConnectArgsBuilder::default()
        .host(&cluster.host)
        .port(cluster.port)
        .database(&cluster.database)
        .username(&cluster.username)
        .password(&cluster.password)
        .ssl_mode(cluster.ssl_mode)
        .build()
        .map_err(|e| ConfigError::Invalid {
            key: "CLUSTER".to_string(),
            reason: e.to_string(),
        })?;

    connect(connect_args)
        .await
        .map_err(|source| PipelineError::Connection {
            endpoint: cluster.endpoint(),
            source,
        })
}

fn progress_bar(mode: RunMode, catalog: &StatementCatalog, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let total: usize = mode
        .stages()
        .iter()
        .map(|&stage| stage_statements(catalog, stage).len())
        .sum();

    let bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] Statements: [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    bar.set_style(style);
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_stages() {
        assert_eq!(RunMode::Full.stages().len(), 5);
        assert_eq!(RunMode::CreateTables.stages(), &[Stage::Drop, Stage::Create]);
        assert_eq!(
            RunMode::Etl.stages(),
            &[Stage::Truncate, Stage::Load, Stage::Transform, Stage::Verify]
        );
        assert_eq!(RunMode::Counts.stages(), &[Stage::Verify]);
    }

    #[test]
    fn test_run_mode_loads() {
        assert!(RunMode::Full.loads());
        assert!(RunMode::Etl.loads());
        assert!(!RunMode::CreateTables.loads());
        assert!(!RunMode::Counts.loads());
    }

    #[test]
    fn test_stage_error_classification() {
        let cases = [
            (Stage::Drop, "Ddl"),
            (Stage::Create, "Ddl"),
            (Stage::Truncate, "Ddl"),
            (Stage::Load, "Load"),
            (Stage::Transform, "Transform"),
            (Stage::Verify, "Verify"),
        ];
        for (stage, expected) in cases {
            let err = stage.error("x".to_string(), sqlx::Error::RowNotFound);
            let variant = match err {
                PipelineError::Ddl { .. } => "Ddl",
                PipelineError::Load { .. } => "Load",
                PipelineError::Transform { .. } => "Transform",
                PipelineError::Verify { .. } => "Verify",
                _ => "other",
            };
            assert_eq!(variant, expected, "stage {stage}");
        }
    }
}
