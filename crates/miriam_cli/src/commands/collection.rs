use super::print_json;
use anyhow::Result;
use clap::Args;
use miriam_core::{
    CollectionListQuery, CollectionRepository, ObsoleteFilter, RegistryService,
    SqliteCollectionRepository,
};
use rusqlite::Connection;

#[derive(Debug, Args)]
pub struct CollectionsArgs {
    /// Case-insensitive name prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Include deprecated collections
    #[arg(long)]
    pub all: bool,

    #[arg(long)]
    pub limit: Option<u32>,
}

#[derive(Debug, Args)]
pub struct CollectionIdArgs {
    /// Collection identifier (MIR:000xxxxx)
    pub id: String,
}

#[derive(Debug, Args)]
pub struct DeprecateArgs {
    /// Collection identifier (MIR:000xxxxx)
    pub id: String,

    #[arg(long)]
    pub comment: String,

    /// Collection replacing the deprecated one
    #[arg(long)]
    pub replaced_by: Option<String>,
}

fn service(conn: &Connection) -> Result<RegistryService<SqliteCollectionRepository<'_>>> {
    Ok(RegistryService::new(SqliteCollectionRepository::try_new(conn)?))
}

pub fn list(conn: &Connection, args: CollectionsArgs) -> Result<()> {
    let query = CollectionListQuery {
        name_prefix: args.prefix,
        obsolete: if args.all {
            ObsoleteFilter::All
        } else {
            ObsoleteFilter::Active
        },
        restricted_only: false,
        limit: args.limit,
    };
    print_json(&service(conn)?.repo().list_collections(&query)?)
}

pub fn show(conn: &Connection, args: CollectionIdArgs) -> Result<()> {
    print_json(&service(conn)?.get(&args.id)?)
}

pub fn deprecate(conn: &Connection, args: DeprecateArgs) -> Result<()> {
    let service = service(conn)?;
    service.deprecate(&args.id, &args.comment, args.replaced_by.as_deref())?;
    print_json(&service.repo().obsolete_info(&args.id)?)
}

pub fn resolve(conn: &Connection, args: CollectionIdArgs) -> Result<()> {
    let current = service(conn)?.resolve_replacement(&args.id)?;
    print_json(&serde_json::json!({ "id": args.id, "current": current }))
}
