use std::fmt;
use grammers_client::client::chats::{AuthorizationError, InvocationError};
use grammers_client::client::SignInError;

#[derive(Debug)]
pub enum StringBotError {
    IO(std::io::Error),
    AuthorizationError(AuthorizationError),
    MissingParameters(&'static str),
    Config { key: &'static str, reason: String },
    SignInError(SignInError),
    InvocationError(InvocationError),
    Error(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for StringBotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringBotError::IO(e) => write!(f, "IO error: {e}"),
            StringBotError::AuthorizationError(e) => write!(f, "Authorization error: {e}"),
            StringBotError::MissingParameters(e) => write!(f, "Missing parameters: {e}"),
            StringBotError::Config { key, reason } => write!(f, "Invalid configuration {key}: {reason}"),
            StringBotError::SignInError(e) => write!(f, "Sign in error: {e}"),
            StringBotError::InvocationError(e) => write!(f, "Other error: {e}"),
            StringBotError::Error(e) => write!(f, "{e}"),
        }
    }
}

impl From<std::io::Error> for StringBotError {
    fn from(e: std::io::Error) -> Self {
        StringBotError::IO(e)
    }
}

impl From<AuthorizationError> for StringBotError {
    fn from(e: AuthorizationError) -> Self {
        StringBotError::AuthorizationError(e)
    }
}

impl From<SignInError> for StringBotError {
    fn from(e: SignInError) -> Self {
        StringBotError::SignInError(e)
    }
}

impl From<InvocationError> for StringBotError {
    fn from(e: InvocationError) -> Self {
        StringBotError::InvocationError(e)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for StringBotError {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        StringBotError::Error(e)
    }
}

impl std::error::Error for StringBotError {}
