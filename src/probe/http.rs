//! HTTP probe implementation.

use super::{ProbeConfig, ProbeError};

/// Run a single HTTP GET against the configured URL.
///
/// With an expected status code redirects are not followed, so the first
/// response decides. The body is always read in full and, when a substring
/// is configured, searched for it.
pub async fn run_http_probe(config: &ProbeConfig) -> Result<(), ProbeError> {
    let mut builder = reqwest::Client::builder().timeout(config.timeout);
    if config.expected_status != 0 {
        builder = builder.redirect(reqwest::redirect::Policy::none());
    }

    let client = builder
        .build()
        .map_err(|e| ProbeError::Transport(e.to_string()))?;

    let response = client
        .get(&config.url)
        .send()
        .await
        .map_err(|e| transport_error(e, config))?;

    let status = response.status().as_u16();
    if config.expected_status != 0 && status != config.expected_status {
        return Err(ProbeError::StatusMismatch {
            got: status,
            expected: config.expected_status,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(e, config))?;

    if !contains_bytes(&body, config.contains.as_bytes()) {
        return Err(ProbeError::SubstringNotFound(config.contains.clone()));
    }

    Ok(())
}

fn transport_error(e: reqwest::Error, config: &ProbeConfig) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout(config.timeout)
    } else {
        ProbeError::Transport(e.to_string())
    }
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}
