//! Credits:
//! 1. https://stackoverflow.com/questions/71083061/function-variable-with-dynamic-function-parameters
//! 2. https://stackoverflow.com/questions/68700171/how-can-i-assign-metadata-to-a-trait


use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use grammers_client::{Update, Client};
use grammers_client::types::{CallbackQuery, Chat, Message, Media};
use grammers_client::types::media::Contact;
use grammers_client::types::User;
use regex::Regex;
use trait_bound_typemap::{CloneSendSyncTypeMap, TypeMapKey, TypeMap};

use crate::{StringBotError, StringBot};

pub type HandlerResult = Result<(), StringBotError>;
type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;
type HandlerFn = dyn Fn(&HandlerData) -> Option<HandlerFuture> + Send + Sync;
type CallbackFn = dyn Fn(Client, CallbackQuery, CloneSendSyncTypeMap) -> HandlerFuture + Send + Sync;
type ErrorHandlerFn = dyn Fn(StringBotError, Client, Option<Chat>) -> HandlerFuture + Send + Sync;
type FallbackFn = dyn Fn(Client, Update) -> HandlerFuture + Send + Sync;

/// For registering handlers
#[macro_export]
macro_rules! h {
    ($a:ident) => {
        ($a::info(), $a)
    };
}

/// Default fallback handler
pub(crate) async fn default_message_fallback_handler(message: String) -> HandlerResult {
    debug!("Unhandled message: {message}");
    Ok(())
}

impl StringBot {
    /// Register message handler
    pub fn add_handler<F, A>(&mut self, handler: (Vec<HandlerFilter>, F)) -> &mut Self
    where
        F: Handler<A>,
        A: FromHandlerData + 'static
    {
        let (filters, handler) = handler;
        self.handlers.add(filters, Handlers::box_handler(handler));
        self
    }

    /// Register message fallback handler function
    /// Will be called if no NewMessage handler will be matched
    pub fn message_fallback_handler<F, A>(&mut self, handler: F) -> &mut Self
    where
        F: Handler<A>,
        A: FromHandlerData + 'static
    {
        self.handlers.message_fallback = Handlers::box_handler(handler);
        self
    }

    /// Register handler for inline button presses
    pub fn callback_handler<H, F>(&mut self, handler: H) -> &mut Self
    where
        H: (Fn(Client, CallbackQuery, CloneSendSyncTypeMap) -> F) + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static
    {
        self.handlers.callback = Some(Arc::new(Box::new(move |c, q, d| {
            Box::pin(handler(c, q, d))
        })));
        self
    }

    /// Register error handler, receives the chat the failed update came from
    pub fn error_handler<H, F>(&mut self, handler: H) -> &mut Self
    where
        H: Fn(StringBotError, Client, Option<Chat>) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static
    {
        self.handlers.error = Arc::new(Box::new(move |e, c, chat| {
            Box::pin(handler(e, c, chat))
        }));
        self
    }
}

/// All the registered handlers
#[derive(Clone)]
pub(crate) struct Handlers {
    message_fallback: Arc<Box<HandlerFn>>,
    callback: Option<Arc<Box<CallbackFn>>>,
    fallback: Arc<Box<FallbackFn>>,
    handlers: Vec<HandlerWrap>,
    pub error: Arc<Box<ErrorHandlerFn>>,
}

/// Whether the handler should be executed or no
#[derive(Clone)]
pub enum HandlerFilter {
    Regex(String),
    Fn(Arc<Box<dyn Fn(&Message, &HandlerData) -> bool + Send + Sync>>)
}

impl HandlerFilter {
    /// Matches messages with a shared contact
    pub fn contact() -> HandlerFilter {
        HandlerFilter::Fn(Arc::new(Box::new(|message: &Message, _: &HandlerData| {
            matches!(message.media(), Some(Media::Contact(_)))
        })))
    }

    /// Does the filter match
    pub fn is_match(&self, message: &Message, data: &HandlerData) -> bool {
        match self {
            HandlerFilter::Regex(r) => Self::regex_match(r, message.text()),
            HandlerFilter::Fn(f) => (*f)(message, data),
        }
    }

    fn regex_match(pattern: &str, text: &str) -> bool {
        match Regex::new(pattern) {
            Ok(regex) => regex.is_match(text),
            Err(e) => {
                error!("Invalid handler pattern {pattern}: {e}");
                false
            }
        }
    }
}

/// Wrapper for handler with metadata
#[derive(Clone)]
pub(crate) struct HandlerWrap {
    pub filters: Vec<HandlerFilter>,
    pub handler: Arc<Box<HandlerFn>>
}

impl Handlers {
    /// Create new empty instance
    pub(crate) fn new() -> Handlers {
        Handlers {
            handlers: vec![],
            message_fallback: Self::box_handler(default_message_fallback_handler),
            callback: None,
            // Default error handler
            error: Arc::new(Box::new(|e, _, _| { Box::pin(async move {
                error!("Unhandled error occured: {e}");
                Ok(())
            }) })),
            // Default update fallback
            fallback: Arc::new(Box::new(|_, u| { Box::pin(async move {
                debug!("Unhandled Update: {u:?}");
                Ok(())
            }) })),
        }
    }

    /// Box handler fn
    fn box_handler<F, A>(handler: F) -> Arc<Box<HandlerFn>>
    where
        F: Handler<A>,
        A: FromHandlerData + 'static
    {
        // Wrap handler with calling function
        let f = move |data: &HandlerData| -> Option<HandlerFuture> {
            Some(Box::pin(handler.call(A::from_data(data)?)))
        };
        Arc::new(Box::new(f))
    }

    /// Register new handler
    fn add(&mut self, filters: Vec<HandlerFilter>, handler: Arc<Box<HandlerFn>>) {
        self.handlers.push(HandlerWrap { filters, handler });
    }

    /// Handle incoming update
    pub(crate) async fn handle(&self, client: Client, update: Update, me: User, data: CloneSendSyncTypeMap) -> HandlerResult {
        let message = match update {
            Update::NewMessage(m) if !m.outgoing() => m,
            Update::CallbackQuery(query) => {
                return match &self.callback {
                    Some(callback) => (*callback)(client, query, data).await,
                    None => (*self.fallback)(client, Update::CallbackQuery(query)).await,
                };
            }
            update => {
                return (*self.fallback)(client, update).await;
            },
        };

        debug!("NewMessage in chat {}", message.chat().id());
        // Arguments
        let data = HandlerData { client, data, me, message: message.clone() };

        // Find handler
        for handler in &self.handlers {
            // Run all filters
            let matched = handler.filters.iter().all(|f| f.is_match(&message, &data));
            if matched {
                if let Some(f) = (*handler.handler)(&data) {
                    return f.await;
                }
            }
        }

        // Run fallback
        if let Some(f) = (*self.message_fallback)(&data) {
            return f.await;
        }
        Err(StringBotError::MissingParameters("Fallback handle function parameter"))
    }

}


/// Should contain all the data for Handler argument
#[derive(Clone)]
pub struct HandlerData {
    pub client: Client,
    pub message: Message,
    pub me: User,
    pub data: CloneSendSyncTypeMap
}

/// Wrapper for querying user data
#[derive(Clone)]
pub struct Data<T: Send + Sync + Clone>(pub T);

impl<T: Send + Sync + Clone> Data<T> {
    /// Get inner value
    pub fn inner(self) -> T {
        self.0
    }
}

impl<T: Send + Sync + Clone + 'static> TypeMapKey for Data<T> {
    type Value = T;
}

/// Id of the chat the message was sent in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatId(pub i64);

/// For generating handler function parameters
pub trait FromHandlerData: where Self: Sized {
    fn from_data(data: &HandlerData) -> Option<Self>;
}

impl FromHandlerData for Client {
    fn from_data(data: &HandlerData) -> Option<Self> {
        Some(data.client.clone())
    }
}

impl FromHandlerData for Message {
    fn from_data(data: &HandlerData) -> Option<Self> {
        Some(data.message.clone())
    }
}

impl FromHandlerData for String {
    fn from_data(data: &HandlerData) -> Option<Self> {
        Some(data.message.text().to_string())
    }
}

impl FromHandlerData for Contact {
    fn from_data(data: &HandlerData) -> Option<Self> {
        match data.message.media()? {
            Media::Contact(c) => Some(c),
            _ => None
        }
    }
}

impl FromHandlerData for Chat {
    fn from_data(data: &HandlerData) -> Option<Self> {
        Some(data.message.chat())
    }
}

impl FromHandlerData for ChatId {
    fn from_data(data: &HandlerData) -> Option<Self> {
        Some(ChatId(data.message.chat().id()))
    }
}

impl<T: Send + Sync + Clone + 'static> FromHandlerData for Data<T> {
    fn from_data(data: &HandlerData) -> Option<Self> {
        data.data.get::<Data<T>>().map(|t| Data(t.clone()))
    }
}


/// Generate FromHandlerData for n-tuple of FromHandlerData:
/// ```ignore
/// impl<A: FromHandlerData + 'static> FromHandlerData for (A,) {
///     fn from_data(data: &HandlerData) -> Option<Self> {
///         Some((A::from_data(data)?,))
///     }
/// }
/// ```
macro_rules! from_handler_data_impl({ $($param:ident)* } => {
    impl<$($param: FromHandlerData + 'static,)*> FromHandlerData for ($($param,)*) {
        #[allow(unused)]
        fn from_data(data: &HandlerData) -> Option<Self> {
            Some(($($param::from_data(data)?,)*))
        }
    }
});

from_handler_data_impl! { }
from_handler_data_impl! { A }
from_handler_data_impl! { A B }
from_handler_data_impl! { A B C }
from_handler_data_impl! { A B C D }
from_handler_data_impl! { A B C D E }
from_handler_data_impl! { A B C D E F }


/// Trait of handler function
pub trait Handler<Args>: Send + Sync + Clone + 'static {
    type Future: Future<Output = HandlerResult> + Send + 'static;

    fn call(&self, args: Args) -> Self::Future;
}

/// Generates a [`Handler`] trait impl for N-ary functions where N is specified with a sequence of
/// space separated type parameters.
macro_rules! handler_fn({ $($param:ident)* } => {
    impl<Func, Fut, $($param,)*> Handler<($($param,)*)> for Func
    where
        Func: Fn($($param),*) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static
    {
        type Future = Fut;

        #[inline]
        #[allow(non_snake_case)]
        fn call(&self, ($($param,)*): ($($param,)*)) -> Self::Future {
            (self)($($param,)*)
        }
    }
});

handler_fn! { }
handler_fn! { A }
handler_fn! { A B }
handler_fn! { A B C }
handler_fn! { A B C D }
handler_fn! { A B C D E }
handler_fn! { A B C D E F }


#[cfg(test)]
mod tests {
    use stringbot_macro::command;
    use super::*;

    #[command("start")]
    async fn start_command() -> HandlerResult {
        Ok(())
    }

    #[command("share")]
    async fn share_command() -> HandlerResult {
        Ok(())
    }

    fn pattern(filters: Vec<HandlerFilter>) -> String {
        match filters.into_iter().next() {
            Some(HandlerFilter::Regex(pattern)) => pattern,
            _ => panic!("command should produce a single regex filter"),
        }
    }

    #[test]
    fn test_command_pattern() {
        let start = pattern(start_command::info());
        for text in ["/start", "/start@string_session_bot", "/start now", "/start\nnow"] {
            assert!(HandlerFilter::regex_match(&start, text), "{text}");
        }
        for text in ["/started", "start", "say /start", "/share", ""] {
            assert!(!HandlerFilter::regex_match(&start, text), "{text}");
        }

        let share = pattern(share_command::info());
        assert!(HandlerFilter::regex_match(&share, "/share"));
        assert!(!HandlerFilter::regex_match(&share, "/start"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(!HandlerFilter::regex_match("(unclosed", "(unclosed"));
    }
}
