use std::path::Path;

use rusqlite::Connection;
use rusqlite_migration::{M, Migrations};

use crate::state::map_sqlite_error;
use crate::{ResolverError, ResolverResult};

const BOOTSTRAP_SQL: &str = include_str!("migrations/0001_bootstrap.sql");

const MERCHANTS_COLUMNS: [&str; 7] = [
    "merchant_id",
    "display_name",
    "category",
    "aliases",
    "embedding",
    "created_at",
    "updated_at",
];
const EMBEDDING_CACHE_COLUMNS: [&str; 7] = [
    "entry_id",
    "text_hash",
    "normalized_text",
    "embedding",
    "usage_count",
    "created_at",
    "last_used_at",
];
const INTERNAL_META_COLUMNS: [&str; 2] = ["key", "value"];

const REQUIRED_CORE_TABLES: [(&str, &[&str]); 3] = [
    ("internal_meta", &INTERNAL_META_COLUMNS),
    ("merchants", &MERCHANTS_COLUMNS),
    ("embedding_cache", &EMBEDDING_CACHE_COLUMNS),
];

pub const REQUIRED_INDEX_NAMES: [&str; 4] = [
    "idx_merchants_display_name",
    "idx_merchants_created_at",
    "idx_embedding_cache_text_hash",
    "idx_embedding_cache_last_used_at",
];

pub fn run_pending(conn: &mut Connection) -> rusqlite_migration::Result<()> {
    let migrations = Migrations::new(vec![M::up(BOOTSTRAP_SQL)]);
    migrations.to_latest(conn)
}

pub fn map_migration_error(db_path: &Path, error: &rusqlite_migration::Error) -> ResolverError {
    match error {
        rusqlite_migration::Error::RusqliteError { query: _, err } => {
            let mapped = map_sqlite_error(db_path, err);
            if matches!(
                mapped,
                ResolverError::StoreLocked { .. }
                    | ResolverError::StoreCorrupt { .. }
                    | ResolverError::StorePermissionDenied { .. }
            ) {
                mapped
            } else {
                ResolverError::Migration {
                    path: db_path.to_path_buf(),
                    detail: error.to_string(),
                }
            }
        }
        _ => ResolverError::Migration {
            path: db_path.to_path_buf(),
            detail: error.to_string(),
        },
    }
}

pub fn verify_core_objects(connection: &Connection, db_path: &Path) -> ResolverResult<()> {
    for (table_name, required_columns) in REQUIRED_CORE_TABLES {
        if !sqlite_object_exists(connection, "table", table_name, db_path)? {
            return Err(ResolverError::StoreCorrupt {
                path: db_path.to_path_buf(),
            });
        }

        let columns = table_columns(connection, table_name, db_path)?;
        for required_column in required_columns {
            if !columns.iter().any(|column| column == required_column) {
                return Err(ResolverError::StoreCorrupt {
                    path: db_path.to_path_buf(),
                });
            }
        }
    }

    for index_name in REQUIRED_INDEX_NAMES {
        if !sqlite_object_exists(connection, "index", index_name, db_path)? {
            return Err(ResolverError::StoreCorrupt {
                path: db_path.to_path_buf(),
            });
        }
    }

    Ok(())
}

fn sqlite_object_exists(
    connection: &Connection,
    object_type: &str,
    object_name: &str,
    db_path: &Path,
) -> ResolverResult<bool> {
    use rusqlite::OptionalExtension;

    let exists = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2 LIMIT 1",
            rusqlite::params![object_type, object_name],
            |_row| Ok(true),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?
        .unwrap_or(false);

    Ok(exists)
}

fn table_columns(
    connection: &Connection,
    table_name: &str,
    db_path: &Path,
) -> ResolverResult<Vec<String>> {
    if !is_required_core_table(table_name) {
        return Err(ResolverError::Store {
            path: db_path.to_path_buf(),
            detail: "Refused PRAGMA table inspection for non-core table.".to_string(),
        });
    }

    // SAFETY: `table_name` is restricted to the compile-time allowlist from
    // REQUIRED_CORE_TABLES above and never originates from user input.
    let sql = format!("PRAGMA table_info({table_name})");
    let mut statement = connection
        .prepare(&sql)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let column_iter = statement
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut columns: Vec<String> = Vec::new();
    for row in column_iter {
        let column = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        columns.push(column);
    }

    Ok(columns)
}

fn is_required_core_table(table_name: &str) -> bool {
    REQUIRED_CORE_TABLES
        .iter()
        .any(|(required_name, _)| required_name == &table_name)
}

#[cfg(test)]
mod tests {
    use super::{run_pending, verify_core_objects};
    use rusqlite::Connection;

    #[test]
    fn bootstrap_creates_all_core_objects() {
        let mut conn = Connection::open_in_memory().expect("in-memory db");
        run_pending(&mut conn).expect("migrations apply");
        let verified = verify_core_objects(&conn, std::path::Path::new(":memory:"));
        assert!(verified.is_ok());
    }

    #[test]
    fn bootstrap_seeds_meta_keys() {
        let mut conn = Connection::open_in_memory().expect("in-memory db");
        run_pending(&mut conn).expect("migrations apply");
        let version: String = conn
            .query_row(
                "SELECT value FROM internal_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .expect("schema_version present");
        assert_eq!(version, "v1");
    }

    #[test]
    fn bootstrap_seeds_the_current_match_policy_version() {
        let mut conn = Connection::open_in_memory().expect("in-memory db");
        run_pending(&mut conn).expect("migrations apply");
        let version: String = conn
            .query_row(
                "SELECT value FROM internal_meta WHERE key = 'match_policy_version'",
                [],
                |row| row.get(0),
            )
            .expect("match_policy_version present");
        assert_eq!(version, crate::resolve::policy::MATCH_POLICY_VERSION);
    }

    #[test]
    fn display_name_uniqueness_is_case_insensitive() {
        let mut conn = Connection::open_in_memory().expect("in-memory db");
        run_pending(&mut conn).expect("migrations apply");
        conn.execute(
            "INSERT INTO merchants (merchant_id, display_name, aliases, created_at, updated_at)
             VALUES ('mer_a', 'AMAZON', '[]', 't', 't')",
            [],
        )
        .expect("first insert");
        let duplicate = conn.execute(
            "INSERT INTO merchants (merchant_id, display_name, aliases, created_at, updated_at)
             VALUES ('mer_b', 'amazon', '[]', 't', 't')",
            [],
        );
        assert!(duplicate.is_err());
    }
}
