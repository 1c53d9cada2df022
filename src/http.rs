//! Shared outbound HTTP client.

use reqwest::Client;

use crate::config::HttpConfig;

/// Build the client every adapter shares; connection pools are reused across
/// bots through `Client`'s internal `Arc`.
pub fn build_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(config.timeout)
        .user_agent(config.user_agent.as_str())
        .build()
}

/// Read a response body for an error message, capped so logs stay readable
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    const MAX_ERROR_BODY: usize = 512;
    let text = response.text().await.unwrap_or_default();
    if text.len() <= MAX_ERROR_BODY {
        return text;
    }
    let mut cut = MAX_ERROR_BODY;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}
