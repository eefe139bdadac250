//! Database schema migrations.
//!
//! Applies the `protein_data` table and the `schema_migrations` bookkeeping
//! table. Migrations are idempotent and run on every open.

use rusqlite::Connection;
use tracing::info;

use protea_core::error::ProteaError;

/// Column list of `protein_data`, in the order the repository reads them.
pub const PROTEIN_COLUMNS: &str = "entry, length, first_seen, last_seen, organism_id, \
     protein_names, sequence, pfam, smart, amino_acid_composition, avg_hydrophobicity, \
     secondary_structure";

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), ProteaError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| ProteaError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ProteaError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: protein_data");
    }

    Ok(())
}

/// Version 1: the protein table.
fn apply_v1(conn: &Connection) -> Result<(), ProteaError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS protein_data (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            entry                   TEXT NOT NULL UNIQUE,
            length                  INTEGER NOT NULL,
            first_seen              TEXT NOT NULL,
            last_seen               TEXT NOT NULL,
            organism_id             INTEGER,
            protein_names           TEXT,
            sequence                TEXT NOT NULL DEFAULT '',
            pfam                    TEXT,
            smart                   TEXT,
            amino_acid_composition  TEXT NOT NULL DEFAULT '{}',
            avg_hydrophobicity      REAL,
            secondary_structure     TEXT NOT NULL DEFAULT '{}'
        );

        CREATE INDEX IF NOT EXISTS idx_protein_data_organism
            ON protein_data (organism_id);

        CREATE INDEX IF NOT EXISTS idx_protein_data_length
            ON protein_data (length);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'protein_data');
        ",
    )
    .map_err(|e| ProteaError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_entry_is_unique() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let insert = "INSERT INTO protein_data (entry, length, first_seen, last_seen)
                      VALUES ('P1', 1, '2020-01-01', '2020-01-01')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
