//! Resource health repository.
//!
//! # Responsibility
//! - Keep one aggregate check record per published resource.
//! - Append one history row per recorded check.
//! - Serve check details, reliability and calendar history.
//!
//! # Invariants
//! - Each recorded check updates counters, timestamps and state, and appends
//!   its history row, in one transaction.
//! - A streak start (`begin_uptime_period` / `begin_downtime_period`) only
//!   moves when the state changes into that streak.
//! - Calendar states (`NotApplicable`, `Nonexistent`) are never recorded.

use super::error::{RepoError, RepoResult};
use crate::db::ensure_registry_ready;
use crate::model::health::{CheckReport, HealthCalendar, HealthState, ResourceCheckDetails};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

pub trait HealthRepository {
    /// Creates the aggregate record of a resource.
    fn create_check_record(
        &self,
        collection_id: &str,
        resource_id: &str,
        state: HealthState,
        message: Option<&str>,
    ) -> RepoResult<()>;
    /// Creates the aggregate record if missing, looking up the resource's
    /// collection. Returns whether a record was created.
    fn ensure_check_record(&self, resource_id: &str) -> RepoResult<bool>;
    /// Records a success or probably-up check.
    fn record_success(&self, report: &CheckReport) -> RepoResult<()>;
    fn record_failure(&self, report: &CheckReport) -> RepoResult<()>;
    fn record_unknown(&self, report: &CheckReport) -> RepoResult<()>;
    /// Records an obsolete or restricted state without touching counters.
    fn record_state(&self, report: &CheckReport) -> RepoResult<()>;
    fn check_details(&self, resource_id: &str) -> RepoResult<Option<ResourceCheckDetails>>;
    fn state(&self, resource_id: &str) -> RepoResult<Option<HealthState>>;
    /// Uptime percentage, 0 when the resource was never checked.
    fn reliability(&self, resource_id: &str) -> RepoResult<u8>;
    fn history(&self, resource_id: &str) -> RepoResult<HealthCalendar>;
    fn resources_in_state(&self, state: HealthState) -> RepoResult<Vec<ResourceCheckDetails>>;
    fn checking_keyword(&self, resource_id: &str) -> RepoResult<Option<String>>;
    fn set_checking_keyword(&self, resource_id: &str, keyword: Option<&str>) -> RepoResult<()>;

    /// Dispatches `report` to the recorder matching its state.
    fn record_check(&self, report: &CheckReport) -> RepoResult<()> {
        match report.state {
            HealthState::Success | HealthState::ProbablyUp => self.record_success(report),
            HealthState::Failure => self.record_failure(report),
            HealthState::Unknown => self.record_unknown(report),
            _ => self.record_state(report),
        }
    }
}

pub struct SqliteHealthRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHealthRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_registry_ready(conn)?;
        Ok(Self { conn })
    }

    fn apply(&self, report: &CheckReport, update_sql: &str) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let changed = tx.execute(
            update_sql,
            params![
                report.resource_id,
                report.state.code(),
                report.checked_at,
                report.message,
                report.errors
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(report.resource_id.clone()));
        }
        tx.execute(
            "INSERT INTO mir_url_history (resource_id, check_date, state) VALUES (?1, ?2, ?3);",
            params![report.resource_id, report.checked_at, report.state.code()],
        )?;
        tx.commit()?;

        debug!(
            "event=health_record module=repo status=ok resource_id={} state={}",
            report.resource_id,
            report.state.code()
        );
        Ok(())
    }
}

fn expect_state(report: &CheckReport, accepted: &[HealthState]) -> RepoResult<()> {
    if accepted.contains(&report.state) {
        return Ok(());
    }
    Err(RepoError::InvalidData(format!(
        "state `{}` cannot be recorded this way for {}",
        report.state.description(),
        report.resource_id
    )))
}

const SUCCESS_UPDATE_SQL: &str = "UPDATE mir_url_check
 SET uptime = uptime + 1,
     date_last_check = ?3,
     date_last_check_success = ?3,
     begin_uptime_period = CASE WHEN state IN (1, 3) THEN begin_uptime_period ELSE ?3 END,
     state = ?2,
     comment = ?4,
     errors = ?5
 WHERE resource_id = ?1;";

const FAILURE_UPDATE_SQL: &str = "UPDATE mir_url_check
 SET downtime = downtime + 1,
     date_last_check = ?3,
     date_last_check_failure = ?3,
     begin_downtime_period = CASE WHEN state = 0 THEN begin_downtime_period ELSE ?3 END,
     state = ?2,
     comment = ?4,
     errors = ?5
 WHERE resource_id = ?1;";

const UNKNOWN_UPDATE_SQL: &str = "UPDATE mir_url_check
 SET unknown = unknown + 1,
     date_last_check = ?3,
     state = ?2,
     comment = ?4,
     errors = ?5
 WHERE resource_id = ?1;";

const STATE_UPDATE_SQL: &str = "UPDATE mir_url_check
 SET date_last_check = ?3,
     state = ?2,
     comment = ?4,
     errors = ?5
 WHERE resource_id = ?1;";

const DETAILS_SELECT_SQL: &str = "SELECT
    resource_id,
    datatype_id,
    state,
    date_last_check,
    date_last_check_success,
    date_last_check_failure,
    begin_uptime_period,
    begin_downtime_period,
    uptime,
    downtime,
    unknown,
    keyword,
    comment,
    errors
 FROM mir_url_check";

impl HealthRepository for SqliteHealthRepository<'_> {
    fn create_check_record(
        &self,
        collection_id: &str,
        resource_id: &str,
        state: HealthState,
        message: Option<&str>,
    ) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO mir_url_check (resource_id, datatype_id, state, comment)
             VALUES (?1, ?2, ?3, ?4);",
            params![resource_id, collection_id, state.code(), message],
        )?;
        info!(
            "event=health_record_create module=repo status=ok resource_id={} collection_id={}",
            resource_id, collection_id
        );
        Ok(())
    }

    fn ensure_check_record(&self, resource_id: &str) -> RepoResult<bool> {
        let existing: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM mir_url_check WHERE resource_id = ?1);",
            [resource_id],
            |row| row.get(0),
        )?;
        if existing == 1 {
            return Ok(false);
        }
        let collection_id: String = self
            .conn
            .query_row(
                "SELECT ptr_datatype FROM mir_resource WHERE resource_id = ?1;",
                [resource_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RepoError::NotFound(resource_id.to_string()))?;
        self.create_check_record(&collection_id, resource_id, HealthState::NotApplicable, None)?;
        Ok(true)
    }

    fn record_success(&self, report: &CheckReport) -> RepoResult<()> {
        expect_state(report, &[HealthState::Success, HealthState::ProbablyUp])?;
        self.apply(report, SUCCESS_UPDATE_SQL)
    }

    fn record_failure(&self, report: &CheckReport) -> RepoResult<()> {
        expect_state(report, &[HealthState::Failure])?;
        self.apply(report, FAILURE_UPDATE_SQL)
    }

    fn record_unknown(&self, report: &CheckReport) -> RepoResult<()> {
        expect_state(report, &[HealthState::Unknown])?;
        self.apply(report, UNKNOWN_UPDATE_SQL)
    }

    fn record_state(&self, report: &CheckReport) -> RepoResult<()> {
        expect_state(report, &[HealthState::Obsolete, HealthState::Restricted])?;
        self.apply(report, STATE_UPDATE_SQL)
    }

    fn check_details(&self, resource_id: &str) -> RepoResult<Option<ResourceCheckDetails>> {
        let details = self
            .conn
            .query_row(
                &format!("{DETAILS_SELECT_SQL} WHERE resource_id = ?1;"),
                [resource_id],
                parse_details_row,
            )
            .optional()?;
        details.transpose()
    }

    fn state(&self, resource_id: &str) -> RepoResult<Option<HealthState>> {
        Ok(self.check_details(resource_id)?.map(|details| details.state))
    }

    fn reliability(&self, resource_id: &str) -> RepoResult<u8> {
        Ok(self
            .check_details(resource_id)?
            .map_or(0, |details| details.reliability()))
    }

    fn history(&self, resource_id: &str) -> RepoResult<HealthCalendar> {
        let mut stmt = self.conn.prepare(
            "SELECT check_date, state
             FROM mir_url_history
             WHERE resource_id = ?1
             ORDER BY check_date ASC, id ASC;",
        )?;
        let mut rows = stmt.query([resource_id])?;
        let mut checks = Vec::new();
        while let Some(row) = rows.next()? {
            let code: i64 = row.get(1)?;
            let state = HealthState::from_code(code)
                .ok_or_else(|| RepoError::InvalidData(format!("invalid health state: {code}")))?;
            checks.push((row.get::<_, i64>(0)?, state));
        }
        Ok(HealthCalendar::from_checks(&checks))
    }

    fn resources_in_state(&self, state: HealthState) -> RepoResult<Vec<ResourceCheckDetails>> {
        let mut stmt = self.conn.prepare(&format!(
            "{DETAILS_SELECT_SQL} WHERE state = ?1 ORDER BY datatype_id ASC, resource_id ASC;"
        ))?;
        let mut rows = stmt.query([state.code()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_details_row(row)??);
        }
        Ok(items)
    }

    fn checking_keyword(&self, resource_id: &str) -> RepoResult<Option<String>> {
        let keyword: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT keyword FROM mir_url_check WHERE resource_id = ?1;",
                [resource_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(keyword.flatten())
    }

    fn set_checking_keyword(&self, resource_id: &str, keyword: Option<&str>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE mir_url_check SET keyword = ?2 WHERE resource_id = ?1;",
            params![resource_id, keyword],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(resource_id.to_string()));
        }
        Ok(())
    }
}

/// Outer error is SQLite, inner error is a corrupt state code.
fn parse_details_row(row: &Row<'_>) -> rusqlite::Result<RepoResult<ResourceCheckDetails>> {
    let code: i64 = row.get(2)?;
    let counter = |index: usize| -> rusqlite::Result<u64> { Ok(row.get::<_, i64>(index)?.max(0) as u64) };
    let Some(state) = HealthState::from_code(code) else {
        return Ok(Err(RepoError::InvalidData(format!(
            "invalid health state: {code}"
        ))));
    };
    Ok(Ok(ResourceCheckDetails {
        resource_id: row.get(0)?,
        collection_id: row.get(1)?,
        state,
        last_check: row.get(3)?,
        last_success: row.get(4)?,
        last_failure: row.get(5)?,
        uptime_since: row.get(6)?,
        downtime_since: row.get(7)?,
        uptime: counter(8)?,
        downtime: counter(9)?,
        unknown: counter(10)?,
        keyword: row.get(11)?,
        message: row.get(12)?,
        errors: row.get(13)?,
    }))
}
