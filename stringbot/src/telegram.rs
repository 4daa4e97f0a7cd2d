//! Delivery of [`Reply`]s through the bot's Telegram client.

use grammers_client::{button, reply_markup, Client, InputMessage};
use grammers_client::client::chats::InvocationError;
use grammers_client::types::{Chat, Message};
use grammers_session::{PackedChat, PackedType};

use crate::{BoxFuture, FromHandlerData, HandlerData, StringBotError};
use crate::flow::{Operator, Outbox};
use crate::keypad;
use crate::reply::{Markup, Reply, SHARE_PHONE_BUTTON};

const NOT_MODIFIED: &str = "MESSAGE_NOT_MODIFIED";

/// Build the message to send for a reply
pub fn render(reply: &Reply) -> InputMessage {
    let message = InputMessage::text(&reply.text);
    match &reply.markup {
        Markup::None => message,
        Markup::RequestPhone => message.reply_markup(
            &reply_markup::keyboard(vec![vec![button::request_phone(SHARE_PHONE_BUTTON)]])
                .single_use()
                .fit_size()
        ),
        Markup::Keypad(buffer) => message.reply_markup(&keypad_markup(buffer)),
        Markup::Remove => message.reply_markup(&reply_markup::hide()),
    }
}

fn keypad_markup(buffer: &str) -> reply_markup::Inline {
    let rows = keypad::layout(buffer)
        .into_iter()
        .map(|row| row.into_iter().map(|b| button::inline(b.label, b.data.into_bytes())).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    reply_markup::inline(rows)
}

/// [`Outbox`] of one chat.
///
/// Created for a keypad press it also holds the keypad message, which `edit` replaces.
pub struct ChatOutbox {
    client: Client,
    chat: PackedChat,
    keypad: Option<Message>,
}

impl ChatOutbox {
    pub fn new(client: Client, chat: &Chat) -> ChatOutbox {
        ChatOutbox { client, chat: chat.pack(), keypad: None }
    }

    /// Outbox editing `message` in place
    pub fn for_keypad(client: Client, message: Message) -> ChatOutbox {
        ChatOutbox { client, chat: message.chat().pack(), keypad: Some(message) }
    }
}

impl Outbox for ChatOutbox {
    fn send(&self, reply: Reply) -> BoxFuture<'_, Result<(), StringBotError>> {
        Box::pin(async move {
            self.client.send_message(self.chat, render(&reply)).await?;
            Ok(())
        })
    }

    fn edit(&self, reply: Reply) -> BoxFuture<'_, Result<(), StringBotError>> {
        Box::pin(async move {
            let Some(message) = &self.keypad else {
                self.client.send_message(self.chat, render(&reply)).await?;
                return Ok(());
            };
            match message.edit(render(&reply)).await {
                // Pressed on a keypad that already shows this
                Err(InvocationError::Rpc(rpc)) if rpc.name == NOT_MODIFIED => {
                    debug!("Keypad message {} unchanged", message.id());
                    Ok(())
                }
                result => Ok(result?),
            }
        })
    }

    fn delete(&self, message_id: i32) -> BoxFuture<'_, Result<(), StringBotError>> {
        Box::pin(async move {
            let deleted = self.client.delete_messages(self.chat, &[message_id]).await?;
            if deleted == 0 {
                return Err(StringBotError::Error("message was not deleted".into()));
            }
            Ok(())
        })
    }
}

impl FromHandlerData for ChatOutbox {
    fn from_data(data: &HandlerData) -> Option<Self> {
        Some(ChatOutbox::new(data.client.clone(), &data.message.chat()))
    }
}

/// Private chat with the operator
pub struct OperatorLink {
    client: Client,
    operator: PackedChat,
}

impl OperatorLink {
    pub fn new(client: Client, operator_id: i64) -> OperatorLink {
        OperatorLink {
            client,
            operator: PackedChat { ty: PackedType::User, id: operator_id, access_hash: None },
        }
    }
}

impl Operator for OperatorLink {
    fn notify(&self, text: String) -> BoxFuture<'_, Result<(), StringBotError>> {
        Box::pin(async move {
            self.client.send_message(self.operator, InputMessage::text(text)).await?;
            Ok(())
        })
    }
}
