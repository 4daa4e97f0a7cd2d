#[macro_use] extern crate log;
extern crate self as stringbot;

use std::future::Future;
use std::pin::Pin;
use grammers_client::{Client, Update};
use grammers_client::types::User;
use trait_bound_typemap::{CloneSendSyncTypeMap, TypeMap};
use handler::Handlers;

pub use grammers_client;
pub use grammers_session;
pub use stringbot_macro::command;
pub use crate::builder::StringBotBuilder;
pub use crate::config::BotConfig;
pub use crate::error::StringBotError;
pub use crate::handler::{HandlerResult, HandlerFilter, Data, HandlerData, FromHandlerData, ChatId};

pub mod acquire;
pub mod config;
pub mod conversation;
pub mod flow;
pub mod health;
pub mod keypad;
pub mod reply;
pub mod retry;
pub mod telegram;
mod error;
mod builder;
mod handler;

/// Boxed future returned by the bot's trait objects
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct StringBot {
    client: Client,
    handlers: Handlers,
    me: User,
    data: CloneSendSyncTypeMap
}

impl StringBot {
    /// Create new instance from client
    pub async fn from_client(mut client: Client) -> Result<StringBot, StringBotError> {
        Ok(StringBot {
            me: client.get_me().await?,
            client,
            handlers: Handlers::new(),
            data: CloneSendSyncTypeMap::new(),
        })
    }

    /// Get a client handle
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Get own user
    pub fn me(&self) -> &User {
        &self.me
    }

    /// Add custom data to use in handlers
    pub fn add_data<T: Send + Sync + Clone + 'static>(&mut self, data: T) -> &mut Self {
        self.data.insert::<Data<T>>(data);
        self
    }

    /// Run infinite event loop
    pub async fn start_event_loop(&mut self) -> Result<(), StringBotError> {
        info!("Starting event loop");
        while let Some(update) = self.client.next_update().await? {
            // Remembered for the error handler, the update itself is consumed by handling
            let chat = match &update {
                Update::NewMessage(message) => Some(message.chat()),
                Update::CallbackQuery(query) => Some(query.chat().clone()),
                _ => None,
            };

            // Run handler in own task
            let handlers = self.handlers.clone();
            let client = self.client.clone();
            let me = self.me.clone();
            let data = self.data.clone();
            tokio::task::spawn(async move {
                if let Err(e) = handlers.handle(client.clone(), update, me, data).await {
                    if let Err(e) = (*handlers.error)(e, client, chat).await {
                        error!("Error occured while running error handler: {e}");
                    }
                }
            });
        }
        info!("Update stream ended");
        Ok(())
    }
}
