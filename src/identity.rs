use anyhow::{Context, Result};
use teloxide::types::UserId;

/// The bot's own identity, derived once at startup and shared immutably
/// with every handler.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    /// The bot's Telegram user id, parsed from the token prefix.
    pub user_id: UserId,
    /// Greeting template sent when the bot joins a group or receives /start.
    pub greeting: String,
}

impl BotIdentity {
    /// Derive the bot's identity from its token.
    ///
    /// Telegram bot tokens have the form `<numeric id>:<secret>`; the prefix
    /// before the first `:` is the bot's own user id. A token without the
    /// separator or with a non-numeric prefix aborts startup.
    pub fn from_token(token: &str, greeting: String) -> Result<Self> {
        let (raw_id, _) = token
            .split_once(':')
            .context("Bot token has no ':' separator")?;

        let id: u64 = raw_id
            .parse()
            .with_context(|| format!("Bot token prefix is not a numeric id: {raw_id}"))?;

        Ok(Self {
            user_id: UserId(id),
            greeting,
        })
    }
}
