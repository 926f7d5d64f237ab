use clap::{Parser, Subcommand, ValueEnum};
use songplay_warehouse::runner::{
    DEFAULT_CONFIG_PATH, PipelineError, PipelineReport, RunArgs, RunMode, StatementCatalog,
    render_catalog, run_pipeline,
};
use std::path::PathBuf;

#[derive(Parser, Clone)]
#[command(version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Quiet mode - minimal output, only show summary
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Subcommand)]
enum Command {
    /// Drop and recreate all tables, load staging data, build the star schema
    Run {
        /// Check that every S3 source location holds objects before connecting
        #[arg(long)]
        preflight: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop and recreate all tables
    CreateTables,

    /// Empty the existing tables, then load staging data and build the star schema
    Etl {
        /// Check that every S3 source location holds objects before connecting
        #[arg(long)]
        preflight: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the row count of every table
    Counts {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the rendered SQL without connecting
    ShowSql {
        /// Only print one statement list
        #[arg(short, long, value_enum)]
        list: Option<StatementList>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatementList {
    Drop,
    Create,
    Truncate,
    Copy,
    Insert,
    Count,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing based on quiet mode
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let filter = if args.quiet {
        EnvFilter::new("songplay_warehouse=warn,sqlx=off")
    } else {
        EnvFilter::new("songplay_warehouse=info,sqlx=off")
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let (mode, preflight, json) = match args.command {
        Command::Run { preflight, json } => (RunMode::Full, preflight, json),
        Command::CreateTables => (RunMode::CreateTables, false, false),
        Command::Etl { preflight, json } => (RunMode::Etl, preflight, json),
        Command::Counts { json } => (RunMode::Counts, false, json),
        Command::ShowSql { list } => {
            let catalog = render_catalog(&args.config)?;
            print_catalog(&catalog, list);
            return Ok(());
        }
    };

    let run_args = RunArgs {
        config_path: args.config,
        mode,
        preflight,
        quiet: args.quiet,
    };

    let report = match run_pipeline(run_args).await {
        Ok(report) => report,
        Err(e) => {
            print_failure_hint(&e);
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

fn print_catalog(catalog: &StatementCatalog, list: Option<StatementList>) {
    let statements: Vec<_> = match list {
        None => catalog.iter().collect(),
        Some(StatementList::Drop) => catalog.drop_tables.iter().collect(),
        Some(StatementList::Create) => catalog.create_tables.iter().collect(),
        Some(StatementList::Truncate) => catalog.truncate_tables.iter().collect(),
        Some(StatementList::Copy) => catalog.copy_staging.iter().collect(),
        Some(StatementList::Insert) => catalog.insert_tables.iter().collect(),
        Some(StatementList::Count) => catalog.row_counts.iter().collect(),
    };

    for statement in statements {
        println!("{statement}");
        println!();
    }
}

fn print_summary(report: &PipelineReport) {
    println!();
    println!("Run Summary");
    println!("===========");
    println!("Run ID: {}", report.run_id);
    println!("Started: {}", report.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "Stages: {}",
        report
            .stages
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
    println!("Statements executed: {}", report.stats.statements_executed);
    println!("Rows affected: {}", report.stats.rows_affected);
    println!("Duration: {:.2}s", report.duration_ms as f64 / 1000.0);

    if let (Some(p50), Some(p90), Some(p99)) = report.stats.get_percentiles() {
        println!("Statement time: p50 {p50}ms, p90 {p90}ms, p99 {p99}ms");
    }

    if !report.row_counts.is_empty() {
        println!();
        println!("Row Counts");
        println!("==========");
        for count in &report.row_counts {
            println!("  {:<16} {:>12}", count.table, count.rows);
        }
    }
}

/// Tell the operator how to recover; every stage is only idempotent from a clean slate
fn print_failure_hint(err: &PipelineError) {
    let hint = match err {
        PipelineError::Config(_) => "Fix the configuration and rerun.",
        PipelineError::Connection { .. } => "Check the cluster endpoint and credentials. No statements were executed.",
        PipelineError::Ddl { .. } => "Rerun `create-tables` (or `run`) once the cause is fixed.",
        PipelineError::Load { .. } | PipelineError::StorageUnavailable { .. } => {
            "Staging tables are now invalid. Rerun the full pipeline with `run`."
        }
        PipelineError::Transform { .. } => {
            "Target tables may be partially populated. Rerun the full pipeline with `run`."
        }
        PipelineError::Verify { .. } => "Row counts could not be read; the loaded data is unaffected.",
    };

    eprintln!();
    if let Some(statement) = err.statement() {
        eprintln!("Failed statement: {statement}");
    }
    eprintln!("{hint}");
}
