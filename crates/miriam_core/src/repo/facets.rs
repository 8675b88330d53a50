//! Collection storage shared by the published and draft schemas.
//!
//! # Responsibility
//! - Read and write the main collection row and its facets (synonyms, URIs,
//!   resources, documentation, restrictions) in either schema.
//! - Implement the two facet update strategies: replace-all for value lists,
//!   reconcile for resources.
//!
//! # Invariants
//! - Write helpers never open transactions; callers own the transaction.
//! - Resources are never deleted: dropped ones are flagged obsolete so their
//!   ids stay stable.
//! - Facet lists come back in insertion order.

use super::error::{RepoError, RepoResult, WriteReport};
use super::id_generator::next_identifier;
use super::schema::Schema;
use crate::model::collection::{non_blank, DataCollection, DeprecatedUri, DocumentationId, UriKind};
use crate::model::health::reliability;
use crate::model::identifier::ResourceId;
use crate::model::resource::{diff_resources, Resource};
use crate::model::restriction::{Restriction, RestrictionKind};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Row};

const DOC_URL_TYPE: &str = "URL";

/// How a collection read treats facet query failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetPolicy {
    /// Propagate the first failure.
    Strict,
    /// Log the failure and return the facet as empty.
    Tolerant,
}

/// Loads the main row and every facet of collection `id`.
///
/// Returns `Ok(None)` when the main row does not exist. Under
/// [`FacetPolicy::Tolerant`] only the main lookup can fail the call.
pub fn load_collection(
    conn: &Connection,
    schema: Schema,
    id: &str,
    policy: FacetPolicy,
) -> RepoResult<Option<DataCollection>> {
    let Some(mut collection) = load_collection_row(conn, schema, id)? else {
        return Ok(None);
    };

    collection.synonyms = facet(policy, schema, id, "synonyms", load_synonyms(conn, schema, id))?;
    collection.url = facet(
        policy,
        schema,
        id,
        "url",
        load_official_uri(conn, schema, id, UriKind::Url),
    )?;
    collection.urn = facet(
        policy,
        schema,
        id,
        "urn",
        load_official_uri(conn, schema, id, UriKind::Urn),
    )?;
    collection.deprecated_uris = facet(
        policy,
        schema,
        id,
        "deprecated_uris",
        load_deprecated_uris(conn, schema, id),
    )?;
    collection.resources = facet(policy, schema, id, "resources", load_resources(conn, schema, id))?;
    let (urls, ids) = facet(
        policy,
        schema,
        id,
        "documentation",
        load_documentation(conn, schema, id),
    )?;
    collection.documentation_urls = urls;
    collection.documentation_ids = ids;
    collection.restrictions = facet(
        policy,
        schema,
        id,
        "restrictions",
        load_restrictions(conn, schema, id),
    )?;

    Ok(Some(collection))
}

/// Applies `policy` to the outcome of one facet query.
pub(crate) fn facet<T: Default>(
    policy: FacetPolicy,
    schema: Schema,
    id: &str,
    name: &'static str,
    result: RepoResult<T>,
) -> RepoResult<T> {
    match (result, policy) {
        (Ok(value), _) => Ok(value),
        (Err(err), FacetPolicy::Strict) => Err(err),
        (Err(err), FacetPolicy::Tolerant) => {
            warn!(
                "event=facet_fetch module=repo status=error schema={} collection_id={} facet={} error={}",
                schema, id, name, err
            );
            Ok(T::default())
        }
    }
}

const COLLECTION_COLUMNS: &str = "datatype_id,
    name,
    pattern,
    definition,
    date_creation,
    date_modif,
    obsolete,
    obsolete_comment,
    replacement,
    restriction";

/// Loads the main row only; facets are left empty.
pub fn load_collection_row(
    conn: &Connection,
    schema: Schema,
    id: &str,
) -> RepoResult<Option<DataCollection>> {
    let sql = format!(
        "SELECT {COLLECTION_COLUMNS} FROM {} WHERE datatype_id = ?1;",
        schema.tables().datatype
    );
    let collection = conn
        .query_row(&sql, [id], parse_collection_row)
        .optional()?;
    Ok(collection)
}

fn parse_collection_row(row: &Row<'_>) -> rusqlite::Result<DataCollection> {
    Ok(DataCollection {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        pattern: row.get(2)?,
        definition: row.get(3)?,
        date_creation: Some(row.get(4)?),
        date_modification: Some(row.get(5)?),
        obsolete: row.get::<_, i64>(6)? == 1,
        obsolete_comment: row.get(7)?,
        replaced_by: row.get(8)?,
        restricted: row.get::<_, i64>(9)? == 1,
        ..DataCollection::default()
    })
}

pub fn load_synonyms(conn: &Connection, schema: Schema, id: &str) -> RepoResult<Vec<String>> {
    let sql = format!(
        "SELECT name FROM {} WHERE ptr_datatype = ?1 ORDER BY id ASC;",
        schema.tables().synonym
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([id], |row| row.get::<_, String>(0))?;
    let synonyms = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(synonyms)
}

/// Official (non-deprecated) URI of the given kind.
pub fn load_official_uri(
    conn: &Connection,
    schema: Schema,
    id: &str,
    kind: UriKind,
) -> RepoResult<Option<String>> {
    let sql = format!(
        "SELECT uri FROM {}
         WHERE ptr_datatype = ?1 AND uri_type = ?2 AND deprecated = 0
         ORDER BY id ASC
         LIMIT 1;",
        schema.tables().uri
    );
    let uri = conn
        .query_row(&sql, params![id, uri_kind_to_db(kind)], |row| {
            row.get::<_, String>(0)
        })
        .optional()?;
    Ok(uri)
}

pub fn load_deprecated_uris(
    conn: &Connection,
    schema: Schema,
    id: &str,
) -> RepoResult<Vec<DeprecatedUri>> {
    let sql = format!(
        "SELECT uri, uri_type FROM {} WHERE ptr_datatype = ?1 AND deprecated = 1 ORDER BY id ASC;",
        schema.tables().uri
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([id])?;
    let mut deprecated = Vec::new();
    while let Some(row) = rows.next()? {
        let uri: String = row.get(0)?;
        let kind = parse_uri_kind(&row.get::<_, String>(1)?)?;
        deprecated.push(DeprecatedUri { uri, kind });
    }
    Ok(deprecated)
}

const RESOURCE_COLUMNS: &str = "r.resource_id,
    r.url_element_prefix,
    r.url_element_suffix,
    r.url_resource,
    r.info,
    r.institution,
    r.location,
    r.example,
    r.obsolete,
    r.official";

/// Loads resources of one collection. Published resources carry reliability.
pub fn load_resources(conn: &Connection, schema: Schema, id: &str) -> RepoResult<Vec<Resource>> {
    let sql = resource_select_sql(schema, "r.ptr_datatype = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([id], |row| parse_resource_row(row, schema))?;
    let resources = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(resources)
}

/// Loads one resource by id.
pub fn load_resource(
    conn: &Connection,
    schema: Schema,
    resource_id: &str,
) -> RepoResult<Option<Resource>> {
    let sql = resource_select_sql(schema, "r.resource_id = ?1");
    let resource = conn
        .query_row(&sql, [resource_id], |row| parse_resource_row(row, schema))
        .optional()?;
    Ok(resource)
}

fn resource_select_sql(schema: Schema, filter: &str) -> String {
    match schema {
        Schema::Published => format!(
            "SELECT {RESOURCE_COLUMNS}, c.uptime, c.downtime
             FROM mir_resource r
             LEFT JOIN mir_url_check c ON c.resource_id = r.resource_id
             WHERE {filter}
             ORDER BY r.resource_id ASC;"
        ),
        Schema::Draft => format!(
            "SELECT {RESOURCE_COLUMNS}
             FROM cura_resource r
             WHERE {filter}
             ORDER BY r.resource_id ASC;"
        ),
    }
}

fn parse_resource_row(row: &Row<'_>, schema: Schema) -> rusqlite::Result<Resource> {
    let reliability = match schema {
        Schema::Published => {
            let uptime: Option<i64> = row.get(10)?;
            let downtime: Option<i64> = row.get(11)?;
            Some(reliability(
                uptime.unwrap_or(0).max(0) as u64,
                downtime.unwrap_or(0).max(0) as u64,
            ))
        }
        Schema::Draft => None,
    };
    Ok(Resource {
        id: Some(row.get(0)?),
        url_prefix: row.get(1)?,
        url_suffix: row.get(2)?,
        url_root: row.get(3)?,
        info: row.get(4)?,
        institution: row.get(5)?,
        location: row.get(6)?,
        example: row.get(7)?,
        obsolete: row.get::<_, i64>(8)? == 1,
        primary: row.get::<_, i64>(9)? == 1,
        reliability,
    })
}

pub fn load_documentation(
    conn: &Connection,
    schema: Schema,
    id: &str,
) -> RepoResult<(Vec<String>, Vec<DocumentationId>)> {
    let sql = format!(
        "SELECT uri, uri_type FROM {} WHERE ptr_datatype = ?1 ORDER BY id ASC;",
        schema.tables().doc
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([id])?;
    let mut urls = Vec::new();
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let uri: String = row.get(0)?;
        let uri_type: String = row.get(1)?;
        if uri_type == DOC_URL_TYPE {
            urls.push(uri);
        } else {
            ids.push(DocumentationId {
                id: uri,
                id_type: uri_type,
            });
        }
    }
    Ok((urls, ids))
}

pub fn load_restrictions(
    conn: &Connection,
    schema: Schema,
    id: &str,
) -> RepoResult<Vec<Restriction>> {
    let sql = format!(
        "SELECT id, ptr_restriction, info, link, link_text
         FROM {}
         WHERE ptr_datatype = ?1
         ORDER BY id ASC;",
        schema.tables().restriction
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([id])?;
    let mut restrictions = Vec::new();
    while let Some(row) = rows.next()? {
        let code: i64 = row.get(1)?;
        let kind = RestrictionKind::from_code(code)
            .ok_or_else(|| RepoError::InvalidData(format!("unknown restriction type {code}")))?;
        restrictions.push(Restriction {
            id: Some(row.get(0)?),
            kind,
            info: row.get(2)?,
            link: row.get(3)?,
            link_text: row.get(4)?,
        });
    }
    Ok(restrictions)
}

fn parse_uri_kind(value: &str) -> RepoResult<UriKind> {
    match value {
        "URL" => Ok(UriKind::Url),
        "URN" => Ok(UriKind::Urn),
        other => Err(RepoError::InvalidData(format!("invalid uri_type value: {other}"))),
    }
}

fn uri_kind_to_db(kind: UriKind) -> &'static str {
    match kind {
        UriKind::Url => "URL",
        UriKind::Urn => "URN",
    }
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

/// Inserts the main row of a new collection.
pub fn insert_collection_row(
    conn: &Connection,
    schema: Schema,
    id: &str,
    collection: &DataCollection,
) -> RepoResult<usize> {
    let sql = format!(
        "INSERT INTO {} (
            datatype_id,
            name,
            pattern,
            definition,
            obsolete,
            obsolete_comment,
            replacement,
            restriction
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
        schema.tables().datatype
    );
    let rows = conn.execute(
        &sql,
        params![
            id,
            collection.name.trim(),
            collection.pattern,
            collection.definition,
            bool_to_int(collection.obsolete),
            collection.obsolete_comment,
            collection.replaced_by,
            bool_to_int(collection.restricted || !collection.restrictions.is_empty()),
        ],
    )?;
    Ok(rows)
}

/// Updates the main row and bumps its modification date.
///
/// # Errors
/// - [`RepoError::NotFound`] when no row has this id.
pub fn update_collection_row(
    conn: &Connection,
    schema: Schema,
    id: &str,
    collection: &DataCollection,
) -> RepoResult<usize> {
    let sql = format!(
        "UPDATE {}
         SET name = ?2,
             pattern = ?3,
             definition = ?4,
             obsolete = ?5,
             obsolete_comment = ?6,
             replacement = ?7,
             restriction = ?8,
             date_modif = (strftime('%s', 'now') * 1000)
         WHERE datatype_id = ?1;",
        schema.tables().datatype
    );
    let rows = conn.execute(
        &sql,
        params![
            id,
            collection.name.trim(),
            collection.pattern,
            collection.definition,
            bool_to_int(collection.obsolete),
            collection.obsolete_comment,
            collection.replaced_by,
            bool_to_int(collection.restricted || !collection.restrictions.is_empty()),
        ],
    )?;
    if rows == 0 {
        return Err(RepoError::NotFound(id.to_string()));
    }
    Ok(rows)
}

/// Sets the modification date of one collection to now.
pub fn touch_collection(conn: &Connection, schema: Schema, id: &str) -> RepoResult<()> {
    let sql = format!(
        "UPDATE {} SET date_modif = (strftime('%s', 'now') * 1000) WHERE datatype_id = ?1;",
        schema.tables().datatype
    );
    if conn.execute(&sql, [id])? == 0 {
        return Err(RepoError::NotFound(id.to_string()));
    }
    Ok(())
}

/// Sets or clears the restricted flag of one collection.
pub fn set_restricted_flag(
    conn: &Connection,
    schema: Schema,
    id: &str,
    restricted: bool,
) -> RepoResult<()> {
    let sql = format!(
        "UPDATE {} SET restriction = ?2 WHERE datatype_id = ?1;",
        schema.tables().datatype
    );
    if conn.execute(&sql, params![id, bool_to_int(restricted)])? == 0 {
        return Err(RepoError::NotFound(id.to_string()));
    }
    Ok(())
}

/// Replace-all strategy: delete every synonym, insert the new list.
pub fn replace_synonyms(
    conn: &Connection,
    schema: Schema,
    id: &str,
    synonyms: &[String],
) -> RepoResult<usize> {
    let table = schema.tables().synonym;
    conn.execute(&format!("DELETE FROM {table} WHERE ptr_datatype = ?1;"), [id])?;
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} (name, ptr_datatype) VALUES (?1, ?2);"
    ))?;
    let mut rows = 0;
    for synonym in synonyms.iter().map(|value| value.trim()).filter(|value| !value.is_empty()) {
        rows += stmt.execute(params![synonym, id])?;
    }
    Ok(rows)
}

/// Replace-all strategy for official and deprecated URIs.
pub fn replace_uris(
    conn: &Connection,
    schema: Schema,
    id: &str,
    collection: &DataCollection,
) -> RepoResult<usize> {
    let table = schema.tables().uri;
    conn.execute(&format!("DELETE FROM {table} WHERE ptr_datatype = ?1;"), [id])?;
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} (uri, uri_type, deprecated, ptr_datatype) VALUES (?1, ?2, ?3, ?4);"
    ))?;

    let official = non_blank(collection.url.as_deref())
        .map(|uri| (uri, UriKind::Url))
        .into_iter()
        .chain(non_blank(collection.urn.as_deref()).map(|uri| (uri, UriKind::Urn)));
    let mut rows = 0;
    for (uri, kind) in official {
        rows += stmt.execute(params![uri, uri_kind_to_db(kind), 0, id])?;
    }
    for deprecated in &collection.deprecated_uris {
        rows += stmt.execute(params![
            deprecated.uri,
            uri_kind_to_db(deprecated.kind),
            1,
            id
        ])?;
    }
    Ok(rows)
}

/// Replace-all strategy for documentation URLs and typed identifiers.
pub fn replace_documentation(
    conn: &Connection,
    schema: Schema,
    id: &str,
    collection: &DataCollection,
) -> RepoResult<usize> {
    let table = schema.tables().doc;
    conn.execute(&format!("DELETE FROM {table} WHERE ptr_datatype = ?1;"), [id])?;
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} (uri, uri_type, ptr_datatype) VALUES (?1, ?2, ?3);"
    ))?;
    let mut rows = 0;
    for url in &collection.documentation_urls {
        rows += stmt.execute(params![url, DOC_URL_TYPE, id])?;
    }
    for doc in &collection.documentation_ids {
        rows += stmt.execute(params![doc.id, doc.id_type, id])?;
    }
    Ok(rows)
}

/// Replace-all strategy for restrictions.
pub fn replace_restrictions(
    conn: &Connection,
    schema: Schema,
    id: &str,
    restrictions: &[Restriction],
) -> RepoResult<usize> {
    let table = schema.tables().restriction;
    conn.execute(&format!("DELETE FROM {table} WHERE ptr_datatype = ?1;"), [id])?;
    let mut rows = 0;
    for restriction in restrictions {
        insert_restriction(conn, schema, id, restriction)?;
        rows += 1;
    }
    Ok(rows)
}

/// Inserts one restriction and returns its storage id.
pub fn insert_restriction(
    conn: &Connection,
    schema: Schema,
    id: &str,
    restriction: &Restriction,
) -> RepoResult<i64> {
    conn.execute(
        &format!(
            "INSERT INTO {} (info, link, link_text, ptr_datatype, ptr_restriction)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            schema.tables().restriction
        ),
        params![
            restriction.info,
            restriction.link,
            restriction.link_text,
            id,
            restriction.kind.code(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts `resources` under fresh identifiers of the schema's resource kind.
pub fn insert_new_resources(
    conn: &Connection,
    schema: Schema,
    collection_id: &str,
    resources: &[Resource],
) -> RepoResult<Vec<ResourceId>> {
    let mut ids = Vec::with_capacity(resources.len());
    for resource in resources {
        let resource_id = next_identifier(conn, schema.resource_kind())?;
        conn.execute(
            &format!(
                "INSERT INTO {} (
                    resource_id,
                    url_element_prefix,
                    url_element_suffix,
                    url_resource,
                    info,
                    institution,
                    location,
                    example,
                    obsolete,
                    official,
                    ptr_datatype
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
                schema.tables().resource
            ),
            params![
                resource_id,
                resource.url_prefix,
                resource.url_suffix,
                resource.url_root,
                resource.info,
                resource.institution,
                resource.location,
                resource.example,
                bool_to_int(resource.obsolete),
                bool_to_int(resource.primary),
                collection_id,
            ],
        )?;
        ids.push(resource_id);
    }
    Ok(ids)
}

/// Row counts of a resource reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub updated: usize,
    pub added: Vec<ResourceId>,
    pub retired: usize,
}

impl ReconcileOutcome {
    pub fn rows(&self) -> usize {
        self.updated + self.added.len() + self.retired
    }
}

/// Reconcile strategy: update kept resources in place, insert new ones,
/// flag dropped ones obsolete.
///
/// # Errors
/// - [`RepoError::NotFound`] when a kept resource id does not belong to the
///   collection.
pub fn reconcile_resources(
    conn: &Connection,
    schema: Schema,
    collection_id: &str,
    old: &[Resource],
    new: &[Resource],
) -> RepoResult<ReconcileOutcome> {
    let diff = diff_resources(old, new);
    let table = schema.tables().resource;
    let mut outcome = ReconcileOutcome::default();

    let mut update = conn.prepare(&format!(
        "UPDATE {table}
         SET url_element_prefix = ?3,
             url_element_suffix = ?4,
             url_resource = ?5,
             info = ?6,
             institution = ?7,
             location = ?8,
             example = ?9,
             obsolete = ?10,
             official = ?11
         WHERE resource_id = ?1 AND ptr_datatype = ?2;"
    ))?;
    for resource in &diff.unchanged {
        let resource_id = resource.id.as_deref().unwrap_or_default();
        let rows = update.execute(params![
            resource_id,
            collection_id,
            resource.url_prefix,
            resource.url_suffix,
            resource.url_root,
            resource.info,
            resource.institution,
            resource.location,
            resource.example,
            bool_to_int(resource.obsolete),
            bool_to_int(resource.primary),
        ])?;
        if rows == 0 {
            return Err(RepoError::NotFound(resource_id.to_string()));
        }
        outcome.updated += rows;
    }

    outcome.added = insert_new_resources(conn, schema, collection_id, &diff.added)?;

    let mut retire = conn.prepare(&format!(
        "UPDATE {table} SET obsolete = 1 WHERE resource_id = ?1 AND ptr_datatype = ?2;"
    ))?;
    for resource in &diff.removed {
        if let Some(resource_id) = resource.id.as_deref() {
            outcome.retired += retire.execute(params![resource_id, collection_id])?;
        }
    }

    Ok(outcome)
}

/// Writes main row and every facet of a brand new collection.
pub fn insert_collection(
    conn: &Connection,
    schema: Schema,
    id: &str,
    collection: &DataCollection,
    report: &mut WriteReport,
) -> RepoResult<()> {
    report.run("collection", || insert_collection_row(conn, schema, id, collection))?;
    report.run("synonyms", || replace_synonyms(conn, schema, id, &collection.synonyms))?;
    report.run("uris", || replace_uris(conn, schema, id, collection))?;
    report.run("resources", || {
        insert_new_resources(conn, schema, id, &collection.resources).map(|ids| ids.len())
    })?;
    report.run("documentation", || replace_documentation(conn, schema, id, collection))?;
    report.run("restrictions", || {
        replace_restrictions(conn, schema, id, &collection.restrictions)
    })?;
    Ok(())
}

/// Rewrites main row and facets of an existing collection.
pub fn update_collection(
    conn: &Connection,
    schema: Schema,
    id: &str,
    new: &DataCollection,
    old: &DataCollection,
    report: &mut WriteReport,
) -> RepoResult<()> {
    report.run("collection", || update_collection_row(conn, schema, id, new))?;
    report.run("synonyms", || replace_synonyms(conn, schema, id, &new.synonyms))?;
    report.run("uris", || replace_uris(conn, schema, id, new))?;
    report.run("resources", || {
        reconcile_resources(conn, schema, id, &old.resources, &new.resources)
            .map(|outcome| outcome.rows())
    })?;
    report.run("documentation", || replace_documentation(conn, schema, id, new))?;
    report.run("restrictions", || {
        replace_restrictions(conn, schema, id, &new.restrictions)
    })?;
    Ok(())
}
