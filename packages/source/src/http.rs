//! Single-attempt HTTP helpers.
//!
//! A failed request is fatal for the run: there is no retry. The helpers
//! only make the failure legible by capturing the URL, status, and a
//! preview of the body before reporting it.

use crate::SourceError;

/// Maximum length of the response body preview included in errors.
const BODY_PREVIEW_LEN: usize = 500;

/// Sends the request once and parses the body as JSON.
///
/// Non-2xx responses and bodies that are not valid JSON are reported as
/// errors carrying a preview of the body.
///
/// # Errors
///
/// Returns [`SourceError::Http`] on connection failure or timeout,
/// [`SourceError::Status`] for a non-2xx status, and
/// [`SourceError::InvalidResponse`] if the body is not JSON.
pub async fn send_json(request: reqwest::RequestBuilder) -> Result<serde_json::Value, SourceError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            log::error!("Request timed out: {e}");
        }
        SourceError::Http(e)
    })?;

    let url = response.url().to_string();
    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let text = response.text().await?;

    if !status.is_success() {
        return Err(SourceError::Status {
            url,
            status: status.as_u16(),
            body_preview: preview(&text),
        });
    }

    serde_json::from_str(&text).map_err(|json_err| {
        log::error!(
            "JSON parse failed\n  \
             url: {url}\n  \
             status: {status}\n  \
             content-type: {content_type:?}\n  \
             received: {} bytes\n  \
             parse error: {json_err}\n  \
             body preview: {}",
            text.len(),
            preview(&text),
        );
        SourceError::InvalidResponse {
            message: format!(
                "JSON parse failed: {json_err} (status={status}, received {} bytes, \
                 content-type={content_type:?})",
                text.len()
            ),
        }
    })
}

fn preview(text: &str) -> String {
    if text.len() <= BODY_PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
