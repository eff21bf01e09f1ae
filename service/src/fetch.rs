use anyhow::{bail, ensure, Context, Result};
use reqwest::{Client, Url};
use tracing::info;

pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 64 * 1024 * 1024;

/// Only plain http(s) documents are fetched.
pub fn document_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid document url: {raw}"))?;
    ensure!(
        matches!(url.scheme(), "http" | "https"),
        "unsupported url scheme: {}",
        url.scheme()
    );
    Ok(url)
}

/// Download a document, refusing bodies over `max_bytes`.
///
/// A declared `Content-Length` over the limit fails before the body is read;
/// otherwise the body is read chunk by chunk and cut off at the limit.
pub async fn fetch_document(http: &Client, url: Url, max_bytes: usize) -> Result<String> {
    let mut res = http
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("fetch {url}"))?;

    if !res.status().is_success() {
        let status = res.status();
        bail!("document fetch failed: {status}");
    }
    check_declared_length(res.content_length(), max_bytes)?;

    let mut body = Vec::new();
    while let Some(chunk) = res.chunk().await.context("read document body")? {
        append_capped(&mut body, &chunk, max_bytes)?;
    }
    let body = String::from_utf8(body).context("document body is not UTF-8")?;
    info!(%url, bytes = body.len(), "fetched document");
    Ok(body)
}

fn check_declared_length(declared: Option<u64>, max_bytes: usize) -> Result<()> {
    if let Some(len) = declared {
        ensure!(
            len <= max_bytes as u64,
            "document too large: {len} bytes (limit {max_bytes})"
        );
    }
    Ok(())
}

fn append_capped(body: &mut Vec<u8>, chunk: &[u8], max_bytes: usize) -> Result<()> {
    ensure!(
        body.len() + chunk.len() <= max_bytes,
        "document too large: over {max_bytes} bytes"
    );
    body.extend_from_slice(chunk);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};

    async fn serve(body: &'static str) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/doc", get(move || async move { body }));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        Url::parse(&format!("http://{addr}/doc")).unwrap()
    }

    fn client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    #[test]
    fn accepts_http_and_https() {
        assert!(document_url("https://bucket.example.com/export.json").is_ok());
        assert!(document_url(" http://localhost:9000/logs.ndjson ").is_ok());
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        let err = document_url("file:///etc/passwd").unwrap_err();
        assert!(err.to_string().contains("unsupported url scheme"));
        assert!(document_url("not a url").is_err());
    }

    #[test]
    fn declared_length_over_the_limit_fails() {
        assert!(check_declared_length(None, 10).is_ok());
        assert!(check_declared_length(Some(10), 10).is_ok());
        let err = check_declared_length(Some(11), 10).unwrap_err();
        assert!(err.to_string().contains("document too large"));
    }

    #[test]
    fn streamed_body_is_cut_off_at_the_limit() {
        let mut body = Vec::new();
        append_capped(&mut body, b"12345", 8).unwrap();
        append_capped(&mut body, b"678", 8).unwrap();
        assert_eq!(body, b"12345678");

        let err = append_capped(&mut body, b"9", 8).unwrap_err();
        assert!(err.to_string().contains("document too large"));
        assert_eq!(body.len(), 8);
    }

    #[tokio::test]
    async fn fetches_within_the_limit() {
        let url = serve(r#"{"ts": 1704067200}"#).await;
        let body = fetch_document(&client(), url, 1024).await.unwrap();
        assert_eq!(body, r#"{"ts": 1704067200}"#);
    }

    #[tokio::test]
    async fn oversized_documents_are_refused() {
        let url = serve(r#"{"ts": 1704067200}"#).await;
        let err = fetch_document(&client(), url, 8).await.unwrap_err();
        assert!(err.to_string().contains("document too large"));
    }
}
