use crate::{Db, ScanRow};
use anyhow::Result;
use rusqlite::params;

impl Db {
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let cnt: i64 = self.conn.query_row(
            "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name=?",
            [name],
            |r| r.get(0),
        )?;
        Ok(cnt > 0)
    }

    pub fn count_scans(&self) -> Result<u64> {
        let cnt: i64 = self.conn.query_row("SELECT COUNT(1) FROM scans", [], |r| r.get(0))?;
        Ok(cnt.max(0) as u64)
    }

    /// Newest first. Ties on the timestamp fall back to the v7 id, which is time-ordered too.
    pub fn recent_scans(&self, limit: u32, offset: u64) -> Result<Vec<ScanRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT scan_id,url,vulnerabilities_json,created_at_ms FROM scans ORDER BY created_at_ms DESC, scan_id DESC LIMIT ? OFFSET ?",
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?, r.get::<_, String>(2)?, r.get::<_, i64>(3)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, url, vulns, created_at_ms) = row?;
            let vulnerabilities: Vec<String> = serde_json::from_str(&vulns)?;
            out.push(ScanRow { id, url, vulnerabilities, created_at_ms });
        }
        Ok(out)
    }

    /// Raw stored results for one scan, if present.
    pub fn scan_results(&self, scan_id: &str) -> Result<Option<serde_json::Value>> {
        let mut stmt = self.conn.prepare("SELECT results_json FROM scans WHERE scan_id=?")?;
        let mut rows = stmt.query([scan_id])?;
        match rows.next()? {
            Some(r) => {
                let raw: String = r.get(0)?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }
}
