use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::CONTENT_TYPE;
use reqwest::Response;
use serde_json::Value;

use crate::error::ProviderError;

const ERROR_BODY_CHARS: usize = 512;

pub(crate) async fn expect_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        status: status.as_u16(),
        body: truncate_text(body.trim(), ERROR_BODY_CHARS),
    })
}

/// Reads a successful response that must carry image bytes.
pub(crate) async fn image_body(response: Response) -> Result<Vec<u8>, ProviderError> {
    let response = expect_success(response).await?;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !content_type.contains("image") {
        return Err(ProviderError::NotAnImage { content_type });
    }
    Ok(response.bytes().await?.to_vec())
}

pub(crate) async fn json_body(response: Response) -> Result<Value, ProviderError> {
    let response = expect_success(response).await?;
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|err| {
        ProviderError::Malformed(format!(
            "invalid JSON ({err}): {}",
            truncate_text(&body, ERROR_BODY_CHARS)
        ))
    })
}

/// Accepts raw base64 as well as `data:image/png;base64,...` URLs.
pub(crate) fn decode_base64_image(encoded: &str) -> Result<Vec<u8>, ProviderError> {
    let payload = match encoded.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => encoded,
    };
    BASE64
        .decode(payload.trim())
        .map_err(|err| ProviderError::Malformed(format!("invalid base64 image: {err}")))
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
