//! CSV exports of the historical table, written under `~/.rcaview/exports`
//! and logged in the `exports` table.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::HistoryRequest;
use crate::db::DbPool;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub id: i64,
    pub path: String,
    pub data_source: String,
    pub start_time: String,
    pub end_time: String,
    pub bytes: i64,
    pub created_at: String,
}

pub fn export_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("exports")
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// `anomalies_<source>_<start>_<end>.csv`, with a numeric suffix when the
/// name is already taken in `dir`.
pub fn export_file_name(dir: &Path, req: &HistoryRequest) -> PathBuf {
    let stem = format!(
        "anomalies_{}_{}_{}",
        req.data_source.as_str(),
        sanitize(&req.start_time),
        sanitize(&req.end_time)
    );
    let mut path = dir.join(format!("{}.csv", stem));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{}_{}.csv", stem, n));
        n += 1;
    }
    path
}

/// Write `csv` for `req` into `dir` and record it.
pub fn save_export(pool: &DbPool, dir: &Path, req: &HistoryRequest, csv: &[u8]) -> Result<ExportRecord> {
    std::fs::create_dir_all(dir)?;
    let path = export_file_name(dir, req);
    std::fs::write(&path, csv)?;

    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO exports (path, data_source, start_time, end_time, bytes)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            path.to_string_lossy().into_owned(),
            req.data_source.as_str(),
            req.start_time,
            req.end_time,
            csv.len() as i64,
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(path = %path.display(), bytes = csv.len(), "export written");
    export_get(pool, id)
}

pub fn export_get(pool: &DbPool, id: i64) -> Result<ExportRecord> {
    let conn = pool.get()?;
    Ok(conn.query_row(
        "SELECT id, path, data_source, start_time, end_time, bytes, created_at
         FROM exports WHERE id = ?1",
        [id],
        row_to_record,
    )?)
}

/// Most recent exports first.
pub fn export_list(pool: &DbPool, limit: u32) -> Result<Vec<ExportRecord>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, path, data_source, start_time, end_time, bytes, created_at
         FROM exports ORDER BY id DESC LIMIT ?1",
    )?;
    let records = stmt
        .query_map([limit], row_to_record)?
        .filter_map(|r| r.ok())
        .collect();
    Ok(records)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExportRecord> {
    Ok(ExportRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        data_source: row.get(2)?,
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        bytes: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::types::source::DataSource;
    use std::collections::BTreeMap;

    fn test_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&dir.path().join("test.sqlite")).unwrap();
        db::init_db(&pool).unwrap();
        crate::migrations::run_pending(&pool).unwrap();
        (dir, pool)
    }

    fn request() -> HistoryRequest {
        HistoryRequest {
            data_source: DataSource::Dns,
            start_time: "2024-01-01 11:00:00".to_string(),
            end_time: "2024-01-01 12:00:00".to_string(),
            filters: vec![],
            severity: vec![],
            service: None,
            page: 1,
            limit: 25,
            sort_by: None,
            sort_order: None,
            identifiers: BTreeMap::new(),
        }
    }

    #[test]
    fn file_name_is_filesystem_safe() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_file_name(dir.path(), &request());
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "anomalies_dns_2024_01_01_11_00_00_2024_01_01_12_00_00.csv"
        );
    }

    #[test]
    fn save_writes_file_and_logs_it() {
        let (dir, pool) = test_pool();
        let out = export_dir(dir.path());
        let csv = b"timestamp,domain,score\n2024-01-01 11:05:00,example.com,0.93\n";
        let record = save_export(&pool, &out, &request(), csv).unwrap();
        assert_eq!(record.bytes, csv.len() as i64);
        assert_eq!(record.data_source, "dns");
        assert_eq!(std::fs::read(&record.path).unwrap(), csv.to_vec());
    }

    #[test]
    fn repeated_export_gets_a_new_name() {
        let (dir, pool) = test_pool();
        let out = export_dir(dir.path());
        let first = save_export(&pool, &out, &request(), b"a\n").unwrap();
        let second = save_export(&pool, &out, &request(), b"b\n").unwrap();
        assert_ne!(first.path, second.path);
        assert!(second.path.ends_with("_1.csv"));

        let listed = export_list(&pool, 10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(export_list(&pool, 1).unwrap().len(), 1);
    }
}
