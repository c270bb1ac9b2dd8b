use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, Error as SqliteError, ffi::ErrorCode};

use crate::{ResolverError, ResolverResult};

pub fn resolve_ledger_home(home_override: Option<&Path>) -> ResolverResult<PathBuf> {
    let candidate = match home_override {
        Some(path) => path.to_path_buf(),
        None => {
            if let Some(override_path) = std::env::var_os("MERCAT_HOME") {
                PathBuf::from(override_path)
            } else if let Some(home_path) = home::home_dir() {
                home_path.join(".mercat")
            } else {
                return Err(ResolverError::Store {
                    path: PathBuf::from("."),
                    detail: "Could not resolve a home directory for ledger initialization."
                        .to_string(),
                });
            }
        }
    };

    absolutize(&candidate)
}

pub fn ensure_ledger_directory(path: &Path) -> ResolverResult<()> {
    fs::create_dir_all(path).map_err(|error| map_io_error(path, &error))?;
    set_private_permissions_best_effort(path);
    Ok(())
}

pub fn ledger_db_path(home: &Path) -> PathBuf {
    home.join("merchants.db")
}

pub fn open_connection(db_path: &Path) -> ResolverResult<Connection> {
    let connection =
        Connection::open(db_path).map_err(|error| map_sqlite_error(db_path, &error))?;
    connection
        .busy_timeout(Duration::from_millis(250))
        .map_err(|error| map_sqlite_error(db_path, &error))?;
    Ok(connection)
}

pub fn map_io_error(path: &Path, error: &std::io::Error) -> ResolverError {
    if error.kind() == std::io::ErrorKind::PermissionDenied {
        return ResolverError::StorePermissionDenied {
            path: path.to_path_buf(),
            detail: error.to_string(),
        };
    }

    ResolverError::Store {
        path: path.to_path_buf(),
        detail: error.to_string(),
    }
}

pub fn map_sqlite_error(path: &Path, error: &SqliteError) -> ResolverError {
    let error_code = error.sqlite_error_code();

    if matches!(
        error_code,
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    ) {
        return ResolverError::StoreLocked {
            path: path.to_path_buf(),
        };
    }

    if matches!(error_code, Some(ErrorCode::NotADatabase)) {
        return ResolverError::StoreCorrupt {
            path: path.to_path_buf(),
        };
    }

    if matches!(
        error_code,
        Some(ErrorCode::CannotOpen | ErrorCode::ReadOnly)
    ) {
        return ResolverError::StorePermissionDenied {
            path: path.to_path_buf(),
            detail: error.to_string(),
        };
    }

    ResolverError::Store {
        path: path.to_path_buf(),
        detail: error.to_string(),
    }
}

pub(crate) fn is_constraint_violation(error: &SqliteError) -> bool {
    matches!(
        error.sqlite_error_code(),
        Some(ErrorCode::ConstraintViolation)
    )
}

fn absolutize(path: &Path) -> ResolverResult<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|error| ResolverError::Store {
            path: path.to_path_buf(),
            detail: error.to_string(),
        })
}

#[cfg(unix)]
fn set_private_permissions_best_effort(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o700));
}

#[cfg(not(unix))]
fn set_private_permissions_best_effort(_path: &Path) {}
