use std::path::PathBuf;
use std::str::FromStr;

use crate::StringBotError;

/// Port of the health listener when `PORT` is unset
pub const DEFAULT_PORT: u16 = 8000;
/// Link used by `/share` when `SHARE_LINK` is unset
pub const DEFAULT_SHARE_LINK: &str = "t.me/YourBotName";

/// Everything the bot reads from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub bot_token: String,
    pub api_id: i32,
    pub api_hash: String,
    /// Receives a copy of every issued session string and error
    pub operator_id: i64,
    pub port: u16,
    pub public_domain: Option<String>,
    pub share_link: String,
    /// Where the bot keeps its own session, memory only when `None`
    pub session_file: Option<PathBuf>,
    /// Cap on flood wait retries per remote call, unbounded when `None`
    pub flood_wait_retries: Option<u32>,
}

impl BotConfig {
    /// Load from process environment variables
    pub fn from_env() -> Result<BotConfig, StringBotError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using custom variable lookup
    pub fn from_lookup<L>(lookup: L) -> Result<BotConfig, StringBotError>
    where
        L: Fn(&str) -> Option<String>
    {
        // Empty values count as unset
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| var(key).ok_or(StringBotError::MissingParameters(key));

        Ok(BotConfig {
            bot_token: required("BOT_TOKEN")?,
            api_id: parse("API_ID", &required("API_ID")?)?,
            api_hash: required("API_HASH")?,
            operator_id: parse("OPERATOR_ID", &required("OPERATOR_ID")?)?,
            port: match var("PORT") {
                Some(port) => parse("PORT", &port)?,
                None => DEFAULT_PORT,
            },
            public_domain: var("RAILWAY_PUBLIC_DOMAIN"),
            share_link: var("SHARE_LINK").unwrap_or_else(|| DEFAULT_SHARE_LINK.to_string()),
            session_file: var("SESSION_FILE").map(PathBuf::from),
            flood_wait_retries: var("FLOOD_WAIT_RETRIES").map(|v| parse("FLOOD_WAIT_RETRIES", &v)).transpose()?,
        })
    }

    /// Public URL of the deployment, if the hosting platform provides a domain
    pub fn public_url(&self) -> Option<String> {
        self.public_domain.as_ref().map(|domain| format!("https://{domain}/"))
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, StringBotError>
where
    T: FromStr,
    T::Err: std::fmt::Display
{
    value.parse::<T>().map_err(|e| StringBotError::Config { key, reason: format!("{value:?}: {e}") })
}
