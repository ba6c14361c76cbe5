//! Remote notebook transport: GET a document from a URL, POST one back.
//!
//! Failures carry the failing URL and are never retried; the caller
//! surfaces them and leaves the current notebook untouched.

use crate::error::{Error, Result};
use crate::ipynb::Document;
use log::debug;
use std::path::Path;
use std::time::Duration;

/// Media type identifying a notebook document body.
pub const NOTEBOOK_MIME: &str = "application/x-ipynb+json";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Title for a remote notebook: the URL's last path segment minus its
/// extension, or "notebook" when the URL has no usable segment.
pub fn title_from_url(url: &str) -> String {
    let segment = url::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .filter(|segment| !segment.is_empty());

    match segment {
        Some(name) => Path::new(&name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or(name),
        None => "notebook".to_string(),
    }
}

/// GET a document. Returns the derived title alongside it.
pub async fn fetch(url: &str) -> Result<(String, Document)> {
    debug!("[transport] GET {}", url);
    let response = reqwest::Client::new()
        .get(url)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|source| Error::Transport {
            url: url.to_string(),
            source,
        })?;
    let text = response.text().await.map_err(|source| Error::Transport {
        url: url.to_string(),
        source,
    })?;
    let document = Document::parse(&text)?;
    Ok((title_from_url(url), document))
}

/// POST a document with the notebook media type. Any non-success status is
/// a transport error.
pub async fn push(url: &str, document: &Document) -> Result<()> {
    debug!("[transport] POST {}", url);
    let body = document.to_json_string()?;
    reqwest::Client::new()
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, NOTEBOOK_MIME)
        .body(body)
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|source| Error::Transport {
            url: url.to_string(),
            source,
        })?;
    Ok(())
}
