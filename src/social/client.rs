//! Colony announcements via the social relay.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::info;

/// Posts announcements to the relay under the agent's handle.
#[derive(Debug, Clone)]
pub struct SocialClient {
    relay_url: String,
    handle: String,
    http: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct PostRequest<'a> {
    handle: &'a str,
    text: &'a str,
}

impl SocialClient {
    pub fn new(relay_url: &str, handle: &str) -> Self {
        Self {
            relay_url: relay_url.trim_end_matches('/').to_string(),
            handle: handle.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// Publish one post.
    pub async fn broadcast(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            bail!("Refusing to broadcast an empty post");
        }

        let resp = self
            .http
            .post(format!("{}/v1/posts", self.relay_url))
            .json(&PostRequest {
                handle: &self.handle,
                text,
            })
            .send()
            .await
            .context("Failed to reach social relay")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Broadcast failed ({}): {}", status, body);
        }

        info!(handle = %self.handle, "Post published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_relay_url() {
        let client = SocialClient::new("https://relay.example/", "LobsterForge");
        assert_eq!(client.relay_url, "https://relay.example");
        assert_eq!(client.handle(), "LobsterForge");
    }

    #[tokio::test]
    async fn test_empty_post_rejected() {
        let client = SocialClient::new("http://127.0.0.1:9", "LobsterForge");
        assert!(client.broadcast("   ").await.is_err());
    }
}
