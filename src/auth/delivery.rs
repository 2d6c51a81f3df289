use crate::error::Result;

/// Hands a login link to the owner. Production setups plug in a mailer;
/// the default only logs.
pub trait LinkSender: Send + Sync {
    fn send_magic_link(&self, email: &str, link: &str) -> Result<()>;
}

pub struct LogLinkSender;

impl LinkSender for LogLinkSender {
    fn send_magic_link(&self, email: &str, link: &str) -> Result<()> {
        tracing::info!(%email, "magic link issued: {link}");
        Ok(())
    }
}
