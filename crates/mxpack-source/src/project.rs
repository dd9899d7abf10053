//! Project database access.
//!
//! A `.mpr` project file is a SQLite database; the product version that
//! created it is stored in the `_MetaData` table.

use std::path::Path;

use mxpack_core::{Error, Result};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tracing::debug;

const PRODUCT_VERSION_QUERY: &str = "SELECT _ProductVersion FROM _MetaData LIMIT 1";

/// Read the product version string recorded in a project database.
pub async fn read_product_version(project_file: &Path) -> Result<String> {
    let options = SqliteConnectOptions::new()
        .filename(project_file)
        .read_only(true);

    let mut conn = options.connect().await.map_err(|e| {
        Error::ProjectDatabase(format!("cannot open {}: {}", project_file.display(), e))
    })?;

    let version: Option<String> = sqlx::query_scalar(PRODUCT_VERSION_QUERY)
        .fetch_optional(&mut conn)
        .await
        .map_err(|e| {
            Error::ProjectDatabase(format!(
                "cannot read product version from {}: {}",
                project_file.display(),
                e
            ))
        })?;

    // Closing is best-effort; the connection is read-only.
    let _ = conn.close().await;

    let version = version.ok_or_else(|| {
        Error::ProjectDatabase(format!("{} has no product version", project_file.display()))
    })?;

    debug!(project = %project_file.display(), version = %version, "Detected product version");
    Ok(version)
}
