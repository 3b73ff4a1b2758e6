//! Delivery of password reset tokens to account holders

use crate::error::Result;
use crate::registry::User;
use async_trait::async_trait;
use inscribe_log::debug;

/// Hands a freshly issued reset token to the account holder, out of band
/// from the request that asked for it
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_reset(&self, user: &User, token: &str) -> Result<()>;
}

/// Notifier for deployments without outbound mail. The token only appears in
/// debug-level logs.
pub struct LogResetNotifier;

#[async_trait]
impl ResetNotifier for LogResetNotifier {
    async fn send_reset(&self, user: &User, token: &str) -> Result<()> {
        debug!(user = %user.id, email = %user.email, token, "Password reset token issued");
        Ok(())
    }
}
