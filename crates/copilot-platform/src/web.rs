//! Web pages for index builds, fetched with the browser's `fetch()`.
//!
//! Pages on other origins load only when they allow cross-origin reads;
//! anything else fails like any other network error.

use gloo_net::http::Request;

use copilot_core::ingest::{check_url, web_document};
use copilot_types::{document::Document, CopilotError, Result};

use crate::llm::ollama::{net_err, with_timeout};

/// GET `url` and keep its visible text.
pub async fn fetch_page(url: &str, timeout_ms: u64) -> Result<Document> {
    check_url(url)?;
    let html = with_timeout(
        async {
            let response = Request::get(url).send().await.map_err(net_err)?;
            if !response.ok() {
                return Err(CopilotError::Network(format!(
                    "HTTP {} {}",
                    response.status(),
                    response.status_text()
                )));
            }
            response.text().await.map_err(net_err)
        },
        timeout_ms,
    )
    .await?;
    log::info!("fetched {} ({} bytes)", url, html.len());
    web_document(url, &html)
}

/// Fetch every URL in turn. A page that fails is reported with its URL and
/// the rest still load.
pub async fn fetch_pages(
    urls: &[String],
    timeout_ms: u64,
) -> (Vec<Document>, Vec<(String, CopilotError)>) {
    let mut docs = Vec::new();
    let mut failures = Vec::new();
    for url in urls {
        match fetch_page(url, timeout_ms).await {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                log::warn!("Failed to load {}: {}", url, e);
                failures.push((url.clone(), e));
            }
        }
    }
    (docs, failures)
}
