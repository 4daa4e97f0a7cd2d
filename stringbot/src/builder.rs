use std::path::{Path, PathBuf};
use grammers_client::{InitParams, Client, Config};
use grammers_session::Session;

use crate::StringBot;
use crate::config::BotConfig;
use crate::error::StringBotError;

pub struct StringBotBuilder {
    api_id: i32,
    api_hash: String,
    bot_token: Option<String>,
    session: Session,
    session_path: Option<PathBuf>,
}

impl StringBotBuilder {
    /// Create new builder instance
    pub fn new(api_id: i32, api_hash: &str) -> StringBotBuilder {
        StringBotBuilder {
            api_id,
            api_hash: api_hash.to_string(),
            bot_token: None,
            session: Session::new(),
            session_path: None,
        }
    }

    /// Builder with credentials, token and session file from config
    pub fn from_config(config: &BotConfig) -> Result<StringBotBuilder, StringBotError> {
        let builder = StringBotBuilder::new(config.api_id, &config.api_hash).bot_token(&config.bot_token);
        match &config.session_file {
            Some(path) => builder.session_file(path),
            None => Ok(builder),
        }
    }

    /// Load the bot session from path, it will be saved there after signing in
    pub fn session_file(mut self, path: impl AsRef<Path>) -> Result<Self, StringBotError> {
        self.session = Session::load_file_or_create(path.as_ref())?;
        self.session_path = Some(path.as_ref().to_path_buf());
        Ok(self)
    }

    /// Login using bot token
    pub fn bot_token(mut self, token: &str) -> Self {
        self.bot_token = Some(token.to_string());
        self
    }

    /// Build the client and sign in as the bot
    pub async fn connect(self) -> Result<StringBot, StringBotError> {
        let mut client = Client::connect(Config {
            session: self.session,
            api_id: self.api_id,
            api_hash: self.api_hash.clone(),
            params: InitParams::default(),
        })
        .await?;

        if client.is_authorized().await? {
            info!("Reusing saved bot session");
            return StringBot::from_client(client).await;
        }

        let token = self.bot_token.ok_or(StringBotError::MissingParameters("bot_token"))?;
        client.bot_sign_in(&token, self.api_id, &self.api_hash).await?;
        info!("Signed in as bot");

        if let Some(path) = &self.session_path {
            client.session().save_to_file(path)?;
        }
        StringBot::from_client(client).await
    }
}
