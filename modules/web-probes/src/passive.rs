use crate::fetch::{fetch_page, Page};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use url::Url;
use vulnscan_core::{Probe, ProbeFinding};

/// Pure evaluation of a single fetched page.
pub type PassiveCheck = fn(&Page) -> ProbeFinding;

/// One GET, then a pure check over the response.
pub struct PassiveProbe {
    client: Client,
    check: PassiveCheck,
    body_limit: usize,
}

impl PassiveProbe {
    pub fn new(client: Client, check: PassiveCheck, body_limit: usize) -> Self {
        PassiveProbe { client, check, body_limit }
    }
}

#[async_trait]
impl Probe for PassiveProbe {
    async fn invoke(&self, url: &str) -> Result<ProbeFinding> {
        let url = Url::parse(url)?;
        let page = fetch_page(&self.client, &url, self.body_limit).await?;
        Ok((self.check)(&page))
    }
}

const SECURITY_HEADERS: &[&str] = &["Content-Security-Policy", "X-Frame-Options", "X-Content-Type-Options"];

pub fn check_security_headers(page: &Page) -> ProbeFinding {
    let missing: Vec<&str> = SECURITY_HEADERS.iter().copied().filter(|h| page.header(h).is_none()).collect();
    if missing.is_empty() {
        return ProbeFinding::clean();
    }
    ProbeFinding::vulnerable()
        .with_details(format!("Missing security headers: {}", missing.join(", ")))
        .with_recommendation(format!("Add the {} header(s) to every response.", missing.join(", ")))
}

pub fn check_transport(page: &Page) -> ProbeFinding {
    if page.final_url.scheme() == "http" {
        return ProbeFinding::vulnerable()
            .with_details(format!("{} is served over plain HTTP", page.final_url))
            .with_recommendation("Serve the site over HTTPS and redirect all HTTP traffic.");
    }
    if page.header("Strict-Transport-Security").is_none() {
        return ProbeFinding::vulnerable()
            .with_details("Strict-Transport-Security header is not set")
            .with_recommendation("Send Strict-Transport-Security with a long max-age.");
    }
    ProbeFinding::clean()
}

pub fn check_version_disclosure(page: &Page) -> ProbeFinding {
    let leaks: Vec<String> = ["Server", "X-Powered-By"]
        .iter()
        .filter_map(|h| page.header(h).filter(|v| discloses_version(v)).map(|v| format!("{h}: {v}")))
        .collect();
    if leaks.is_empty() {
        return ProbeFinding::clean();
    }
    ProbeFinding::vulnerable()
        .with_details(format!("Component versions disclosed ({})", leaks.join("; ")))
        .with_recommendation("Keep components patched and strip version numbers from response headers.")
}

// "Apache/2.4.41", "PHP/7.4.3"
fn discloses_version(value: &str) -> bool {
    value.split_whitespace().any(|token| {
        token
            .split_once('/')
            .map(|(_, rest)| rest.chars().next().is_some_and(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    })
}

pub fn check_cookies(page: &Page) -> ProbeFinding {
    let https = page.final_url.scheme() == "https";
    let mut weak = Vec::new();
    for raw in page.set_cookies() {
        let mut parts = raw.split(';').map(str::trim);
        let name = parts.next().and_then(|nv| nv.split_once('=')).map(|(n, _)| n).unwrap_or(raw);
        let attrs: Vec<String> = parts.map(|a| a.to_ascii_lowercase()).collect();
        let has = |flag: &str| attrs.iter().any(|a| a == flag || a.starts_with(&format!("{flag}=")));
        let mut missing = Vec::new();
        if !has("httponly") {
            missing.push("HttpOnly");
        }
        if https && !has("secure") {
            missing.push("Secure");
        }
        if !missing.is_empty() {
            weak.push(format!("{name} (missing {})", missing.join(", ")));
        }
    }
    if weak.is_empty() {
        return ProbeFinding::clean();
    }
    ProbeFinding::vulnerable()
        .with_details(format!("Cookies without protective flags: {}", weak.join("; ")))
        .with_recommendation("Set HttpOnly and Secure on session cookies.")
}

const CSRF_FIELD_HINTS: &[&str] =
    &["csrf", "xsrf", "_token", "authenticity_token", "__requestverificationtoken", "nonce"];

pub fn check_csrf_forms(page: &Page) -> ProbeFinding {
    let lower = page.body.to_ascii_lowercase();
    let mut post_forms = 0usize;
    let mut unprotected = 0usize;
    let mut rest = lower.as_str();
    while let Some(start) = rest.find("<form") {
        let form = &rest[start..];
        let end = form.find("</form>").map(|e| e + "</form>".len()).unwrap_or(form.len());
        let (markup, tail) = form.split_at(end);
        rest = tail;

        let open_tag = markup.split('>').next().unwrap_or(markup);
        let compact: String = open_tag.chars().filter(|c| !c.is_whitespace()).collect();
        let is_post = ["method=\"post\"", "method='post'", "method=post"].iter().any(|m| compact.contains(m));
        if !is_post {
            continue;
        }
        post_forms += 1;
        if !CSRF_FIELD_HINTS.iter().any(|hint| markup.contains(hint)) {
            unprotected += 1;
        }
    }
    if unprotected == 0 {
        return ProbeFinding::clean();
    }
    ProbeFinding::vulnerable()
        .with_details(format!("{unprotected} of {post_forms} POST form(s) carry no anti-CSRF token"))
        .with_recommendation("Include a per-session anti-CSRF token in every state-changing form and verify it server-side.")
}
