//! WebFetch tool
//!
//! Fetches a public URL and returns its body as text. Only textual content
//! types are accepted and the body is cut off after a fixed number of
//! characters.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use sdk::errors::EngineError;
use sdk::types::{param_str, Parameters, ToolOutcome};
use tracing::{debug, info};

use super::{fail, Tool, ToolContext};

const TRUNCATION_MARKER: &str = "\n... (content truncated)";

/// Upper bound on UTF-8 bytes per character, used to cap the download
const MAX_BYTES_PER_CHAR: usize = 4;

pub struct WebFetchTool;

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &'static str {
        "WebFetch"
    }

    fn description(&self) -> &'static str {
        "Fetch the content of a public http(s) URL as text. Use it when you need the content of a URL given by the user. Binary content is rejected and long pages are truncated."
    }

    fn parameters(&self) -> &'static str {
        r#"{"url": "full URL, e.g. \"https://example.com/docs\" (required)"}"#
    }

    async fn execute(&self, params: &Parameters, ctx: &ToolContext<'_>) -> ToolOutcome {
        match fetch(params, ctx).await {
            Ok(body) => ToolOutcome::success(body),
            Err(e) => fail(self.name(), e),
        }
    }
}

async fn fetch(params: &Parameters, ctx: &ToolContext<'_>) -> Result<String, EngineError> {
    let raw_url = param_str(params, "url")?;
    let url = reqwest::Url::parse(raw_url).map_err(|e| EngineError::InvalidParameter {
        name: "url".to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(EngineError::InvalidParameter {
            name: "url".to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    info!("Fetching URL: {}", url);
    let mut response = ctx
        .env
        .http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| EngineError::Network(describe(&e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EngineError::Network(format!(
            "Failed to fetch {}. Status: {}",
            url, status
        )));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    if !is_textual(&content_type) {
        return Err(EngineError::ToolError(format!(
            "Unsupported content type '{}'. Only text content can be fetched",
            content_type
        )));
    }

    let max_chars = ctx.settings().fetch_max_chars;
    let byte_limit = max_chars.saturating_mul(MAX_BYTES_PER_CHAR);
    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| EngineError::Network(describe(&e)))?
    {
        bytes.extend_from_slice(&chunk);
        // Past this many bytes the text is over the limit whatever the encoding
        if bytes.len() > byte_limit {
            debug!("Stopped reading {} after {} bytes", url, bytes.len());
            break;
        }
    }
    debug!("Fetched {} bytes from {}", bytes.len(), url);

    let body = String::from_utf8_lossy(&bytes).into_owned();
    Ok(truncate(body, max_chars))
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("Request timed out: {}", err)
    } else {
        err.to_string()
    }
}

/// A missing content type is treated as text
fn is_textual(content_type: &str) -> bool {
    content_type.is_empty()
        || content_type.starts_with("text/")
        || ["json", "xml", "javascript", "css"]
            .iter()
            .any(|kind| content_type.contains(kind))
}

fn truncate(body: String, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &body[..cut], TRUNCATION_MARKER),
        None => body,
    }
}
