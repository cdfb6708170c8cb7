//! Action execution: the side effects behind each approved action.
//!
//! Mode changes and periodic posts are broadcast through the social relay.
//! Growth actions (deploy, molt, proposal) are queued as work orders for the
//! external deployer; their announcement is best effort. Only the periodic
//! metrics post fails the action when the relay rejects it.

use crate::evolution::{format_metrics_post, generate_announcement};
use crate::social::SocialClient;
use crate::state::Journal;
use crate::types::{EvolutionAction, MetricsSnapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Performs the real-world effect of an approved action.
///
/// Returning `Ok` means the effect happened and the action's state change
/// may be applied. Retry policy, if any, belongs to the implementation.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &EvolutionAction, metrics: &MetricsSnapshot) -> Result<()>;
}

/// Text to publish for an action, if it has one.
pub fn post_text(action: &EvolutionAction, metrics: &MetricsSnapshot) -> Option<String> {
    let text = match action {
        EvolutionAction::PostMetrics => format_metrics_post(metrics),
        other => generate_announcement(other),
    };
    (!text.is_empty()).then_some(text)
}

/// Executor wired to the social relay and the journal's work queue.
pub struct LiveExecutor {
    social: Option<SocialClient>,
    journal: Arc<Mutex<Journal>>,
}

impl LiveExecutor {
    pub fn new(social: Option<SocialClient>, journal: Arc<Mutex<Journal>>) -> Self {
        Self { social, journal }
    }

    async fn publish(&self, text: &str) -> Result<()> {
        match &self.social {
            Some(client) => client.broadcast(text).await,
            None => {
                info!("No social relay configured, post not sent:\n{}", text);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ActionExecutor for LiveExecutor {
    async fn execute(&self, action: &EvolutionAction, metrics: &MetricsSnapshot) -> Result<()> {
        if action.is_growth() {
            let order_id = {
                let journal = self.journal.lock().await;
                journal
                    .enqueue_work_order(action, Utc::now())
                    .with_context(|| format!("Failed to queue work order for {}", action))?
            };
            info!(action = %action, order = %order_id, "Work order queued");
        }

        let Some(text) = post_text(action, metrics) else {
            return Ok(());
        };

        match action {
            EvolutionAction::PostMetrics => self
                .publish(&text)
                .await
                .context("Failed to publish metrics post"),
            _ => {
                if let Err(e) = self.publish(&text).await {
                    warn!(action = %action, "Announcement not published: {e:#}");
                }
                Ok(())
            }
        }
    }
}
