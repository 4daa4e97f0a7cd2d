#[macro_use] extern crate log;

use std::error::Error;
use std::sync::Arc;
use stringbot::grammers_client::Client;
use stringbot::grammers_client::types::{CallbackQuery, Media, Message};
use stringbot::grammers_client::types::media::Contact;
use stringbot::acquire::TelegramAcquirer;
use stringbot::conversation::ConversationStore;
use stringbot::flow::{Outbox, SessionFlow};
use stringbot::keypad::KeypadPress;
use stringbot::reply::Reply;
use stringbot::retry::{FloodPolicy, TokioSleeper};
use stringbot::telegram::{ChatOutbox, OperatorLink};
use stringbot::{command, h, health};
use stringbot::{BotConfig, ChatId, Data, HandlerFilter, HandlerResult, StringBotBuilder};

type Flow = Arc<SessionFlow>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let config = BotConfig::from_env()?;

    let listener = health::bind(config.port).await?;
    tokio::spawn(async move {
        if let Err(e) = health::serve(listener).await {
            error!("Health listener stopped: {e}");
        }
    });
    if let Some(url) = config.public_url() {
        info!("Public endpoint: {url}");
    }

    let mut bot = StringBotBuilder::from_config(&config)?.connect().await?;
    info!("Logged in as @{}", bot.me().username().unwrap_or("bot"));

    // Everything the conversations need, owned here and handed to the flow
    let sleeper = Arc::new(TokioSleeper);
    let policy = config.flood_wait_retries.map(FloodPolicy::bounded).unwrap_or_default();
    let acquirer = TelegramAcquirer::new(config.api_id, &config.api_hash, sleeper.clone()).flood_policy(policy);
    let operator = OperatorLink::new(bot.client(), config.operator_id);
    let flow: Flow = Arc::new(SessionFlow::new(ConversationStore::new(), Arc::new(acquirer), Arc::new(operator), sleeper));

    let keypad_flow = flow.clone();
    let error_flow = flow.clone();
    bot
        .add_data(flow)
        .add_data(config)
        .add_handler(h!(start))
        .add_handler(h!(cancel))
        .add_handler(h!(share))
        .add_handler(h!(feedback))
        .add_handler((vec![HandlerFilter::contact()], contact))
        .message_fallback_handler(text)
        .callback_handler(move |client, query, _| keypad(client, query, keypad_flow.clone()))
        .error_handler(move |error, client, chat| {
            let flow = error_flow.clone();
            async move {
                let outbox = chat.as_ref().map(|chat| ChatOutbox::new(client, chat));
                flow.fail(chat.map(|c| c.id()), &error, outbox.as_ref().map(|o| o as &dyn Outbox)).await;
                Ok(())
            }
        })
        .start_event_loop()
        .await?;

    Ok(())
}

/// Begin a new conversation
#[command("start")]
async fn start(chat: ChatId, outbox: ChatOutbox, flow: Data<Flow>) -> HandlerResult {
    let flow = flow.inner();
    flow.start(chat.0, &outbox).await
}

/// Abort the current conversation
#[command("cancel")]
async fn cancel(chat: ChatId, outbox: ChatOutbox, flow: Data<Flow>) -> HandlerResult {
    let flow = flow.inner();
    flow.cancel(chat.0, &outbox).await
}

#[command("share")]
async fn share(outbox: ChatOutbox, config: Data<BotConfig>) -> HandlerResult {
    outbox.send(Reply::share(&config.inner().share_link)).await
}

#[command("feedback")]
async fn feedback(outbox: ChatOutbox) -> HandlerResult {
    outbox.send(Reply::feedback()).await
}

/// Phone number shared with the request button
async fn contact(chat: ChatId, message: Message, contact: Contact, outbox: ChatOutbox, flow: Data<Flow>) -> HandlerResult {
    let flow = flow.inner();
    flow.contact(chat.0, contact.phone_number(), message.id(), &outbox).await
}

/// Any other message, the password when one is expected
async fn text(chat: ChatId, message: Message, outbox: ChatOutbox, flow: Data<Flow>) -> HandlerResult {
    let flow = flow.inner();
    // Link previews still count as text, captions of photos and such don't
    let plain = matches!(message.media(), None | Some(Media::WebPage(_)));
    if !plain || message.text().is_empty() {
        return flow.other(chat.0, &outbox).await;
    }
    if message.text().starts_with('/') {
        debug!("Unknown command: {}", message.text());
        return Ok(());
    }
    flow.text(chat.0, message.text(), message.id(), &outbox).await
}

/// Code keypad button
async fn keypad(client: Client, mut query: CallbackQuery, flow: Flow) -> HandlerResult {
    // Stop the loading indicator right away, logging in may take a while
    query.answer().send().await?;
    let Some(press) = KeypadPress::parse(query.data()) else {
        warn!("Unknown button payload");
        return Ok(());
    };
    let chat = query.chat().id();
    let message = query.load_message().await?;
    let outbox = ChatOutbox::for_keypad(client, message);
    flow.keypad(chat, press, &outbox).await
}
