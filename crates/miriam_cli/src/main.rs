//! `miriam` operator binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use miriam_cli::commands::{self, collection, draft, health};
use miriam_cli::config::Config;
use miriam_core::db::migrations::latest_version;
use miriam_core::db::open_db;
use miriam_core::{core_version, init_logging};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "miriam")]
#[command(about = "MIRIAM registry persistence tool", long_about = None)]
struct Cli {
    /// Database file, overrides MIRIAM_DB_PATH
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level, overrides MIRIAM_LOG_LEVEL
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log directory, overrides MIRIAM_LOG_DIR
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or migrate the registry database
    Init,

    /// Submit a collection from a JSON file as a new draft
    Submit(draft::SubmitArgs),

    /// Show one draft with its curation metadata
    Draft(draft::DraftIdArgs),

    /// List drafts ordered by submission date
    Drafts(draft::DraftsArgs),

    /// Move a draft to another curation state
    Transition(draft::TransitionArgs),

    /// Promote a draft into the published registry
    Publish(draft::DraftIdArgs),

    /// Count open curation work
    Workload,

    /// Show one published collection
    Collection(collection::CollectionIdArgs),

    /// List published collections
    Collections(collection::CollectionsArgs),

    /// Mark a published collection obsolete
    Deprecate(collection::DeprecateArgs),

    /// Follow replacements of a deprecated collection
    Resolve(collection::CollectionIdArgs),

    /// Record the outcome of a resource check
    Check(health::CheckArgs),

    /// Show reliability or calendar of a resource
    Health(health::HealthArgs),

    /// Print the core version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?.with_overrides(cli.db, cli.log_level, cli.log_dir);

    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }

    if let Commands::Version = cli.command {
        return commands::print_json(&serde_json::json!({ "version": core_version() }));
    }

    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    info!(
        "event=cli_start module=cli status=ok db_path={}",
        config.db_path.display()
    );

    match cli.command {
        Commands::Init => commands::print_json(&serde_json::json!({
            "db_path": config.db_path.display().to_string(),
            "schema_version": latest_version(),
        })),
        Commands::Submit(args) => draft::submit(&conn, args),
        Commands::Draft(args) => draft::show(&conn, args),
        Commands::Drafts(args) => draft::list(&conn, args),
        Commands::Transition(args) => draft::transition(&conn, args),
        Commands::Publish(args) => draft::publish(&conn, args),
        Commands::Workload => draft::workload(&conn),
        Commands::Collection(args) => collection::show(&conn, args),
        Commands::Collections(args) => collection::list(&conn, args),
        Commands::Deprecate(args) => collection::deprecate(&conn, args),
        Commands::Resolve(args) => collection::resolve(&conn, args),
        Commands::Check(args) => health::check(&conn, args),
        Commands::Health(args) => health::show(&conn, args),
        Commands::Version => Ok(()),
    }
}
