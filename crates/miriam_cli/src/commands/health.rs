use super::print_json;
use anyhow::Result;
use clap::{Args, ValueEnum};
use miriam_core::{CheckReport, HealthState, ResourceHealthService, SqliteHealthRepository};
use rusqlite::Connection;

/// Check outcomes an operator can record.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Outcome {
    Up,
    Down,
    Unknown,
    ProbablyUp,
    Obsolete,
    Restricted,
}

impl From<Outcome> for HealthState {
    fn from(value: Outcome) -> Self {
        match value {
            Outcome::Up => HealthState::Success,
            Outcome::Down => HealthState::Failure,
            Outcome::Unknown => HealthState::Unknown,
            Outcome::ProbablyUp => HealthState::ProbablyUp,
            Outcome::Obsolete => HealthState::Obsolete,
            Outcome::Restricted => HealthState::Restricted,
        }
    }
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Resource identifier (MIR:001xxxxx)
    pub resource_id: String,

    #[arg(value_enum)]
    pub outcome: Outcome,

    #[arg(long)]
    pub message: Option<String>,

    #[arg(long)]
    pub errors: Option<String>,
}

#[derive(Debug, Args)]
pub struct HealthArgs {
    /// Resource identifier (MIR:001xxxxx)
    pub resource_id: String,

    /// Print the daily calendar instead of the reliability summary
    #[arg(long)]
    pub calendar: bool,
}

fn service(conn: &Connection) -> Result<ResourceHealthService<SqliteHealthRepository<'_>>> {
    Ok(ResourceHealthService::new(SqliteHealthRepository::try_new(conn)?))
}

pub fn check(conn: &Connection, args: CheckArgs) -> Result<()> {
    let mut report = CheckReport::now(args.resource_id, args.outcome.into());
    report.message = args.message;
    report.errors = args.errors;
    print_json(&service(conn)?.submit_check(&report)?)
}

pub fn show(conn: &Connection, args: HealthArgs) -> Result<()> {
    let service = service(conn)?;
    if args.calendar {
        return print_json(&service.calendar(&args.resource_id)?);
    }
    let reliability = service.reliability(&args.resource_id)?;
    print_json(&serde_json::json!({
        "resource_id": args.resource_id,
        "reliability": reliability,
    }))
}
