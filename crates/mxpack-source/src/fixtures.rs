//! On-disk fixtures for tests of this crate and its dependents.
//!
//! Compiled for this crate's own tests and, through the `test-fixtures`
//! feature, for other workspace crates' dev builds.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection};
use zip::write::SimpleFileOptions;

use crate::destination::Scaffold;

/// Write a zip archive holding `files` (path, contents) to `path`.
pub fn write_zip(path: &Path, files: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, contents) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Lay out a scaffold (`Dockerfile` plus `scripts/`) under `root`.
pub fn write_scaffold(root: &Path) -> Scaffold {
    fs::create_dir_all(root.join("scripts")).unwrap();
    fs::write(root.join("Dockerfile"), "FROM runtime\n").unwrap();
    fs::write(root.join("scripts/startup.py"), "print('start')\n").unwrap();
    Scaffold::from_root(root)
}

/// Create a minimal project database recording `version`.
pub async fn write_project_file(path: &Path, version: &str) {
    let mut conn = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap();
    sqlx::query("CREATE TABLE _MetaData (_ProductVersion TEXT, _BuildVersion TEXT)")
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query("INSERT INTO _MetaData (_ProductVersion, _BuildVersion) VALUES (?, ?)")
        .bind(version)
        .bind(version)
        .execute(&mut conn)
        .await
        .unwrap();
    conn.close().await.unwrap();
}
