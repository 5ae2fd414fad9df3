use async_trait::async_trait;

use crate::models::Deal;
use crate::utils::error::Result;

/// Delivers a summary of newly qualified deals (email, etc.)
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with `AppError::Notify` on transport failure. Callers do not retry.
    async fn send_summary(&self, deals: &[Deal]) -> Result<()>;
}
