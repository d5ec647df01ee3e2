use crate::fetch::fetch_page;
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use url::Url;
use vulnscan_core::{Probe, ProbeFinding};

const REFLECTION_MARKER: &str = "\"'><vsx-7f3a>";

/// Database error signatures, matched case-insensitively.
const SQL_ERROR_PATTERNS: &[(&str, &str)] = &[
    (r"SQL syntax.*MySQL", "MySQL"),
    (r"you have an error in your sql syntax", "MySQL"),
    (r"Warning.*mysql_", "MySQL"),
    (r"PostgreSQL.*ERROR", "PostgreSQL"),
    (r"Warning.*\Wpg_", "PostgreSQL"),
    (r"unterminated quoted string", "PostgreSQL"),
    (r"Unclosed quotation mark after", "MSSQL"),
    (r"Driver.*SQL[\-\_\ ]*Server", "MSSQL"),
    (r"ORA-\d{5}", "Oracle"),
    (r"quoted string not properly terminated", "Oracle"),
    (r"SQLite\.Exception", "SQLite"),
    (r"\[SQLITE_ERROR\]", "SQLite"),
    (r"SQLSTATE\[\w+\]", "PDO"),
];

/// Copy of `url` with `payload` appended to every query value, or added as
/// `fallback_param` when the URL has no query.
pub(crate) fn inject(url: &Url, payload: &str, fallback_param: &str) -> Url {
    let pairs: Vec<(String, String)> = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
    let mut out = url.clone();
    {
        let mut q = out.query_pairs_mut();
        q.clear();
        if pairs.is_empty() {
            q.append_pair(fallback_param, payload);
        } else {
            for (k, v) in &pairs {
                q.append_pair(k, &format!("{v}{payload}"));
            }
        }
    }
    out
}

/// Reflected XSS: the marker must come back unescaped.
pub struct ReflectionProbe {
    client: Client,
    body_limit: usize,
}

impl ReflectionProbe {
    pub fn new(client: Client, body_limit: usize) -> Self {
        ReflectionProbe { client, body_limit }
    }
}

#[async_trait]
impl Probe for ReflectionProbe {
    async fn invoke(&self, url: &str) -> Result<ProbeFinding> {
        let target = inject(&Url::parse(url)?, REFLECTION_MARKER, "q");
        let page = fetch_page(&self.client, &target, self.body_limit).await?;
        Ok(evaluate_reflection(&page.body, target.as_str()))
    }
}

fn evaluate_reflection(body: &str, target: &str) -> ProbeFinding {
    if body.contains(REFLECTION_MARKER) {
        ProbeFinding::vulnerable()
            .with_details(format!("Injected markup was reflected unescaped by {target}"))
            .with_recommendation("Context-encode all user input on output and deploy a restrictive Content-Security-Policy.")
    } else {
        ProbeFinding::clean()
    }
}

/// Error-based SQL injection: a quote that surfaces a database error the
/// unmodified page does not show.
pub struct SqlErrorProbe {
    client: Client,
    body_limit: usize,
    signatures: Vec<(Regex, &'static str)>,
}

impl SqlErrorProbe {
    pub fn new(client: Client, body_limit: usize) -> Result<Self> {
        let signatures = SQL_ERROR_PATTERNS
            .iter()
            .map(|(pattern, engine)| Ok::<_, anyhow::Error>((Regex::new(&format!("(?i){pattern}"))?, *engine)))
            .collect::<Result<Vec<_>>>()?;
        Ok(SqlErrorProbe { client, body_limit, signatures })
    }

    fn signature_in(&self, body: &str) -> Option<&'static str> {
        self.signatures.iter().find(|(re, _)| re.is_match(body)).map(|(_, engine)| *engine)
    }

    fn evaluate(&self, baseline: &str, mutated: &str, target: &str) -> ProbeFinding {
        match self.signature_in(mutated) {
            Some(engine) if self.signature_in(baseline).is_none() => ProbeFinding::vulnerable()
                .with_details(format!("{engine} error message returned for a quote injected at {target}"))
                .with_recommendation("Use parameterized queries and suppress database errors in responses."),
            _ => ProbeFinding::clean(),
        }
    }
}

#[async_trait]
impl Probe for SqlErrorProbe {
    async fn invoke(&self, url: &str) -> Result<ProbeFinding> {
        let base = Url::parse(url)?;
        let baseline = fetch_page(&self.client, &base, self.body_limit).await?;
        let target = inject(&base, "'", "id");
        let mutated = fetch_page(&self.client, &target, self.body_limit).await?;
        Ok(self.evaluate(&baseline.body, &mutated.body, target.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inject_appends_to_existing_values() {
        let url = Url::parse("https://a.test/item?id=7&sort=asc").unwrap();
        let out = inject(&url, "'", "id");
        let pairs: Vec<_> = out.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        assert_eq!(pairs, [("id".to_string(), "7'".to_string()), ("sort".to_string(), "asc'".to_string())]);
        assert_eq!(out.path(), "/item");
    }

    #[test]
    fn inject_falls_back_to_named_param() {
        let url = Url::parse("https://a.test/").unwrap();
        let out = inject(&url, REFLECTION_MARKER, "q");
        let (k, v) = out.query_pairs().next().unwrap();
        assert_eq!(k, "q");
        assert_eq!(v, REFLECTION_MARKER);
    }

    #[test]
    fn reflection_requires_raw_marker() {
        let escaped = "<p>&quot;&#39;&gt;&lt;vsx-7f3a&gt;</p>";
        assert!(!evaluate_reflection(escaped, "https://a.test/?q=x").vulnerable);
        let raw = format!("<p>You searched for {REFLECTION_MARKER}</p>");
        assert!(evaluate_reflection(&raw, "https://a.test/?q=x").vulnerable);
    }

    #[test]
    fn sql_errors_only_count_when_absent_from_baseline() {
        let probe = SqlErrorProbe::new(Client::new(), 1024).unwrap();
        let error = "Warning: You have an error in your SQL syntax; check the manual for MySQL";
        let f = probe.evaluate("<p>ok</p>", error, "https://a.test/?id=1'");
        assert!(f.vulnerable);
        assert!(f.details.unwrap().starts_with("MySQL"));

        assert!(!probe.evaluate(error, error, "https://a.test/?id=1'").vulnerable);
        assert!(!probe.evaluate("<p>ok</p>", "<p>ok</p>", "https://a.test/?id=1'").vulnerable);
        assert!(probe.evaluate("", "ORA-01756: quoted string not properly terminated", "t").vulnerable);
    }
}
