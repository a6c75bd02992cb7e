use async_trait::async_trait;

use crate::utils::error::Result;

/// Single-recipient delivery primitive. One call per recipient; a failure is
/// reported as [`AppError::Delivery`](crate::AppError::Delivery).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()>;
}
