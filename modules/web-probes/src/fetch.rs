use anyhow::{bail, Result};
use reqwest::header::{HeaderMap, SET_COOKIE};
use reqwest::Client;
use url::Url;

/// A fetched response, body capped and decoded lossily.
#[derive(Debug, Clone)]
pub struct Page {
    pub final_url: Url,
    pub headers: HeaderMap,
    pub body: String,
}

impl Page {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers.get_all(SET_COOKIE).iter().filter_map(|v| v.to_str().ok())
    }
}

pub async fn fetch_page(client: &Client, url: &Url, body_limit: usize) -> Result<Page> {
    match url.scheme() {
        "http" | "https" => {}
        other => bail!("unsupported scheme {other}"),
    }
    let mut resp = client.get(url.clone()).send().await?;
    let final_url = resp.url().clone();
    let headers = resp.headers().clone();

    let mut buf = Vec::new();
    while let Some(chunk) = resp.chunk().await? {
        let room = body_limit.saturating_sub(buf.len());
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            tracing::debug!(url = %final_url, limit = body_limit, "response body truncated");
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    let body = String::from_utf8_lossy(&buf).into_owned();
    Ok(Page { final_url, headers, body })
}

#[cfg(test)]
pub(crate) fn page_for_test(url: &str, headers: &[(&'static str, &str)], body: &str) -> Page {
    use reqwest::header::{HeaderName, HeaderValue};
    let mut map = HeaderMap::new();
    for &(k, v) in headers {
        map.append(HeaderName::from_static(k), HeaderValue::from_str(v).unwrap());
    }
    Page { final_url: Url::parse(url).unwrap(), headers: map, body: body.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn non_http_schemes_are_rejected_before_sending() {
        let client = Client::new();
        let url = Url::parse("ftp://example.test/").unwrap();
        let err = fetch_page(&client, &url, 1024).await.unwrap_err();
        assert!(err.to_string().contains("unsupported scheme ftp"));
    }

    #[tokio::test]
    async fn bodies_are_capped_at_the_limit() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut req = [0u8; 1024];
            let _ = sock.read(&mut req).await;
            let body = "a".repeat(5000);
            let head = format!("HTTP/1.1 200 OK\r\ncontent-length: {}\r\nserver: test\r\nconnection: close\r\n\r\n", body.len());
            sock.write_all(head.as_bytes()).await.unwrap();
            let _ = sock.write_all(body.as_bytes()).await;
        });

        let client = Client::builder().no_proxy().build().unwrap();
        let url = Url::parse(&format!("http://{addr}/")).unwrap();
        let page = fetch_page(&client, &url, 1024).await.unwrap();
        assert_eq!(page.body.len(), 1024);
        assert_eq!(page.header("server"), Some("test"));
        assert_eq!(page.final_url, url);
    }

    #[test]
    fn header_lookup_is_case_insensitive_and_cookies_repeat() {
        let page = page_for_test(
            "https://a.test/",
            &[("server", "nginx"), ("set-cookie", "a=1"), ("set-cookie", "b=2")],
            "",
        );
        assert_eq!(page.header("Server"), Some("nginx"));
        assert_eq!(page.set_cookies().collect::<Vec<_>>(), ["a=1", "b=2"]);
    }
}
