//! Protein repository over the `protein_data` table.
//!
//! CRUD operations used by the HTTP routes plus a guarded read-only query
//! path used by the database query agent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use rusqlite::types::ValueRef;
use rusqlite::{ErrorCode, OptionalExtension};
use serde_json::Value;

use protea_core::error::ProteaError;
use protea_core::types::{ProteinRecord, ProteinSummary};

use crate::db::Database;
use crate::migrations::PROTEIN_COLUMNS;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Virtual machine steps between deadline checks.
const PROGRESS_STEPS: i32 = 1_000;

/// Result set of an ad-hoc read-only query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    /// At most `max_rows` rows, in result order.
    pub rows: Vec<Vec<Value>>,
    /// The statement had more rows than were kept.
    pub truncated: bool,
}

/// Repository for protein records.
pub struct ProteinRepository {
    db: Arc<Database>,
}

impl ProteinRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Find a protein by its entry accession.
    pub fn find_by_entry(&self, entry: &str) -> Result<Option<ProteinRecord>, ProteaError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {} FROM protein_data WHERE entry = ?1", PROTEIN_COLUMNS);
            let result = conn
                .query_row(&sql, rusqlite::params![entry], |row| Ok(row_to_record(row)))
                .optional()
                .map_err(|e| ProteaError::Storage(e.to_string()))?;

            match result {
                Some(record) => Ok(Some(record?)),
                None => Ok(None),
            }
        })
    }

    /// List proteins in insertion order, skipping `skip` and returning at most `limit`.
    pub fn list(&self, skip: u32, limit: u32) -> Result<Vec<ProteinSummary>, ProteaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT entry, length, first_seen, last_seen, sequence, pfam, smart,
                            avg_hydrophobicity
                     FROM protein_data
                     ORDER BY id ASC
                     LIMIT ?1 OFFSET ?2",
                )
                .map_err(|e| ProteaError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(rusqlite::params![limit, skip], |row| {
                    Ok(row_to_summary(row))
                })
                .map_err(|e| ProteaError::Storage(e.to_string()))?;

            let mut summaries = Vec::new();
            for row in rows {
                let summary = row.map_err(|e| ProteaError::Storage(e.to_string()))??;
                summaries.push(summary);
            }
            Ok(summaries)
        })
    }

    /// Insert a new protein. Fails with `Persistence` if the entry exists.
    pub fn create(&self, record: &ProteinRecord) -> Result<ProteinRecord, ProteaError> {
        let composition = serde_json::to_string(&record.amino_acid_composition)?;
        let structure = serde_json::to_string(&record.secondary_structure)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO protein_data (entry, length, first_seen, last_seen, organism_id,
                     protein_names, sequence, pfam, smart, amino_acid_composition,
                     avg_hydrophobicity, secondary_structure)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    record.entry,
                    record.length,
                    record.first_seen.format(DATE_FORMAT).to_string(),
                    record.last_seen.format(DATE_FORMAT).to_string(),
                    record.organism_id,
                    record.protein_names,
                    record.sequence,
                    record.pfam,
                    record.smart,
                    composition,
                    record.avg_hydrophobicity,
                    structure,
                ],
            )
            .map_err(|e| write_error("create", &record.entry, e))?;
            Ok(())
        })?;

        tracing::debug!(entry = %record.entry, "Protein created");
        Ok(record.clone())
    }

    /// Update the mutable columns of an existing protein and return the stored row.
    ///
    /// `entry`, `organism_id` and `protein_names` are not touched.
    pub fn update(
        &self,
        entry: &str,
        record: &ProteinRecord,
    ) -> Result<ProteinRecord, ProteaError> {
        let composition = serde_json::to_string(&record.amino_acid_composition)?;
        let structure = serde_json::to_string(&record.secondary_structure)?;

        let affected = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE protein_data
                 SET length = ?1, first_seen = ?2, last_seen = ?3, sequence = ?4, pfam = ?5,
                     smart = ?6, amino_acid_composition = ?7, avg_hydrophobicity = ?8,
                     secondary_structure = ?9
                 WHERE entry = ?10",
                rusqlite::params![
                    record.length,
                    record.first_seen.format(DATE_FORMAT).to_string(),
                    record.last_seen.format(DATE_FORMAT).to_string(),
                    record.sequence,
                    record.pfam,
                    record.smart,
                    composition,
                    record.avg_hydrophobicity,
                    structure,
                    entry,
                ],
            )
            .map_err(|e| write_error("update", entry, e))
        })?;

        if affected == 0 {
            return Err(ProteaError::NotFound(format!("protein {}", entry)));
        }

        self.find_by_entry(entry)?
            .ok_or_else(|| ProteaError::NotFound(format!("protein {}", entry)))
    }

    /// Delete a protein by entry.
    pub fn delete(&self, entry: &str) -> Result<(), ProteaError> {
        let affected = self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM protein_data WHERE entry = ?1",
                rusqlite::params![entry],
            )
            .map_err(|e| write_error("delete", entry, e))
        })?;

        if affected == 0 {
            return Err(ProteaError::NotFound(format!("protein {}", entry)));
        }
        Ok(())
    }

    /// Count stored proteins.
    pub fn count(&self) -> Result<u64, ProteaError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM protein_data", [], |row| row.get(0))
                .map_err(|e| ProteaError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    /// Run a single statement that SQLite reports as read-only.
    ///
    /// Statements that fail to prepare or would write are rejected with
    /// `Persistence` before any row is stepped. Stepping stops once
    /// `max_rows` rows are kept and one more is seen. A statement still
    /// running after `timeout` is aborted with `Interrupted`.
    pub fn run_read_only(
        &self,
        sql: &str,
        max_rows: usize,
        timeout: Duration,
    ) -> Result<QueryRows, ProteaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| ProteaError::Persistence(format!("Invalid query: {}", e)))?;

            if !stmt.readonly() {
                return Err(ProteaError::Persistence(
                    "only read-only statements are allowed".to_string(),
                ));
            }

            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let width = columns.len();

            let deadline = Instant::now() + timeout;
            conn.progress_handler(PROGRESS_STEPS, Some(move || Instant::now() >= deadline));

            let stepped = collect_rows(&mut stmt, width, max_rows, timeout);
            conn.progress_handler(0, None::<fn() -> bool>);

            let (rows, truncated) = stepped?;
            Ok(QueryRows {
                columns,
                rows,
                truncated,
            })
        })
    }
}

fn collect_rows(
    stmt: &mut rusqlite::Statement<'_>,
    width: usize,
    max_rows: usize,
    timeout: Duration,
) -> Result<(Vec<Vec<Value>>, bool), ProteaError> {
    let mut rows = stmt.query([]).map_err(|e| read_error(e, timeout))?;

    let mut kept = Vec::new();
    while let Some(row) = rows.next().map_err(|e| read_error(e, timeout))? {
        if kept.len() >= max_rows {
            return Ok((kept, true));
        }
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            let value = row
                .get_ref(i)
                .map_err(|e| ProteaError::Storage(e.to_string()))?;
            values.push(value_to_json(value));
        }
        kept.push(values);
    }
    Ok((kept, false))
}

fn read_error(err: rusqlite::Error, timeout: Duration) -> ProteaError {
    match err.sqlite_error_code() {
        Some(ErrorCode::OperationInterrupted) => ProteaError::Interrupted(format!(
            "query exceeded {} ms",
            timeout.as_millis()
        )),
        _ => ProteaError::Storage(err.to_string()),
    }
}

fn write_error(op: &str, entry: &str, err: rusqlite::Error) -> ProteaError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => {
            ProteaError::Persistence(format!("{} {} violates a constraint: {}", op, entry, err))
        }
        _ => ProteaError::Storage(format!("Failed to {} protein {}: {}", op, entry, err)),
    }
}

fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
    }
}

fn parse_date(raw: &str, column: &str) -> Result<NaiveDate, ProteaError> {
    // Older rows may carry a time part after the date.
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map_err(|e| ProteaError::Storage(format!("Invalid {} '{}': {}", column, raw, e)))
}

fn parse_mapping(raw: Option<String>, column: &str) -> Result<BTreeMap<String, f64>, ProteaError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(BTreeMap::new()),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| ProteaError::Serialization(format!("Invalid {}: {}", column, e))),
    }
}

fn row_to_record(row: &rusqlite::Row) -> Result<ProteinRecord, ProteaError> {
    let get_err = |e: rusqlite::Error| ProteaError::Storage(e.to_string());

    let first_seen: String = row.get(2).map_err(get_err)?;
    let last_seen: String = row.get(3).map_err(get_err)?;
    let composition: Option<String> = row.get(9).map_err(get_err)?;
    let structure: Option<String> = row.get(11).map_err(get_err)?;

    Ok(ProteinRecord {
        entry: row.get(0).map_err(get_err)?,
        length: row.get(1).map_err(get_err)?,
        first_seen: parse_date(&first_seen, "first_seen")?,
        last_seen: parse_date(&last_seen, "last_seen")?,
        organism_id: row.get(4).map_err(get_err)?,
        protein_names: row.get(5).map_err(get_err)?,
        sequence: row.get(6).map_err(get_err)?,
        pfam: row.get(7).map_err(get_err)?,
        smart: row.get(8).map_err(get_err)?,
        amino_acid_composition: parse_mapping(composition, "amino_acid_composition")?,
        avg_hydrophobicity: row.get(10).map_err(get_err)?,
        secondary_structure: parse_mapping(structure, "secondary_structure")?,
    })
}

fn row_to_summary(row: &rusqlite::Row) -> Result<ProteinSummary, ProteaError> {
    let get_err = |e: rusqlite::Error| ProteaError::Storage(e.to_string());

    let first_seen: String = row.get(2).map_err(get_err)?;
    let last_seen: String = row.get(3).map_err(get_err)?;

    Ok(ProteinSummary {
        entry: row.get(0).map_err(get_err)?,
        length: row.get(1).map_err(get_err)?,
        first_seen: parse_date(&first_seen, "first_seen")?,
        last_seen: parse_date(&last_seen, "last_seen")?,
        sequence: row.get(4).map_err(get_err)?,
        pfam: row.get(5).map_err(get_err)?,
        smart: row.get(6).map_err(get_err)?,
        avg_hydrophobicity: row.get(7).map_err(get_err)?,
    })
}
