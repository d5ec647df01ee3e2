pub const MIG_0001_INIT: &str = r#"
BEGIN;

CREATE TABLE scans (
  scan_id              TEXT PRIMARY KEY,
  url                  TEXT NOT NULL,
  vulnerabilities_json TEXT NOT NULL,
  results_json         TEXT NOT NULL,
  created_at_ms        INTEGER NOT NULL
);

CREATE INDEX idx_scans_created ON scans(created_at_ms DESC);
CREATE INDEX idx_scans_url ON scans(url);

COMMIT;
"#
;
