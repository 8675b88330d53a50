use super::print_json;
use anyhow::{Context, Result};
use clap::Args;
use miriam_core::{CurationService, CurationState, DataCollection, SqliteCurationRepository};
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// JSON file holding the collection
    pub file: PathBuf,

    /// Submitter information kept with the draft
    #[arg(long, default_value = "")]
    pub info: String,
}

#[derive(Debug, Args)]
pub struct DraftsArgs {
    /// Only drafts in this state
    #[arg(long, value_parser = parse_state)]
    pub state: Option<CurationState>,
}

#[derive(Debug, Args)]
pub struct TransitionArgs {
    /// Draft identifier (MIR:009xxxxx)
    pub id: String,

    #[arg(value_parser = parse_state)]
    pub state: CurationState,

    /// Replaces the curator comment
    #[arg(long)]
    pub comment: Option<String>,
}

#[derive(Debug, Args)]
pub struct DraftIdArgs {
    /// Draft identifier (MIR:009xxxxx)
    pub id: String,
}

fn parse_state(value: &str) -> Result<CurationState, String> {
    CurationState::parse(value).ok_or_else(|| {
        format!("unknown state `{value}`; expected Submitted|Curation|Pending|Canceled|Published")
    })
}

fn service(conn: &Connection) -> Result<CurationService<SqliteCurationRepository<'_>>> {
    Ok(CurationService::new(SqliteCurationRepository::try_new(conn)?))
}

pub fn submit(conn: &Connection, args: SubmitArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let collection: DataCollection = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a collection document", args.file.display()))?;
    let report = service(conn)?.submit(&collection, &args.info)?;
    print_json(&report)
}

pub fn show(conn: &Connection, args: DraftIdArgs) -> Result<()> {
    print_json(&service(conn)?.get_draft(&args.id)?)
}

pub fn list(conn: &Connection, args: DraftsArgs) -> Result<()> {
    print_json(&service(conn)?.queue(args.state)?)
}

pub fn transition(conn: &Connection, args: TransitionArgs) -> Result<()> {
    let service = service(conn)?;
    service.transition(&args.id, args.state, args.comment.as_deref())?;
    print_json(&service.get_draft(&args.id)?)
}

pub fn publish(conn: &Connection, args: DraftIdArgs) -> Result<()> {
    print_json(&service(conn)?.publish(&args.id)?)
}

pub fn workload(conn: &Connection) -> Result<()> {
    let (drafts, resources) = service(conn)?.workload()?;
    print_json(&serde_json::json!({
        "active_drafts": drafts,
        "active_resources": resources,
    }))
}
