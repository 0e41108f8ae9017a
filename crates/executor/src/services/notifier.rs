use async_trait::async_trait;
use tracing::error;

/// Outbound side of the chat platform.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: i64, text: &str) -> anyhow::Result<()>;
}

/// Sends and logs a failure instead of propagating it; a lost report must not abort a trade flow.
pub async fn notify(notifier: &dyn Notifier, destination: i64, text: &str) {
    if let Err(e) = notifier.send(destination, text).await {
        error!("Failed to send notification to {}: {}", destination, e);
    }
}
