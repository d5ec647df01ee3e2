use crate::{Db, NewScan};
use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;

impl Db {
    pub fn insert_scan(&self, scan: &NewScan) -> Result<Uuid> {
        let vulns = serde_json::to_string(&scan.vulnerabilities)?;
        let results = serde_json::to_string(&scan.results)?;
        self.conn.execute(
            "INSERT INTO scans(scan_id,url,vulnerabilities_json,results_json,created_at_ms) VALUES (?,?,?,?,?)",
            params![scan.scan_id.to_string(), scan.url, vulns, results, scan.created_at_ms],
        )?;
        Ok(scan.scan_id)
    }
}
