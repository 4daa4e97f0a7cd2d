//! Inline digit keypad used to enter the login code.
//!
//! Every button carries the full code typed so far (`code_<digits>` for a
//! digit, `submit_<digits>` for the submit button), so pressing a button is
//! enough to know the new buffer without looking anything up.

/// Length of a Telegram login code
pub const CODE_LENGTH: usize = 5;
/// Longest buffer a button can carry (callback payloads are limited to 64 bytes)
pub const MAX_BUFFER: usize = 32;

const DIGIT_PREFIX: &str = "code_";
const SUBMIT_PREFIX: &str = "submit_";
const SUBMIT_LABEL: &str = "Submit";

/// A parsed keypad button press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeypadPress {
    /// Digit pressed, `buffer` already contains it
    Digit { buffer: String },
    /// Submit pressed with the current `buffer`
    Submit { buffer: String },
}

impl KeypadPress {
    /// Parse button payload, `None` if it doesn't belong to the keypad
    pub fn parse(data: &[u8]) -> Option<KeypadPress> {
        let data = std::str::from_utf8(data).ok()?;
        let (buffer, submit) = match data.strip_prefix(SUBMIT_PREFIX) {
            Some(buffer) => (buffer, true),
            None => (data.strip_prefix(DIGIT_PREFIX)?, false),
        };
        if buffer.len() > MAX_BUFFER || !buffer.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let buffer = buffer.to_string();
        Some(match submit {
            true => KeypadPress::Submit { buffer },
            false => KeypadPress::Digit { buffer },
        })
    }

    /// Digits typed so far
    pub fn buffer(&self) -> &str {
        match self {
            KeypadPress::Digit { buffer } => buffer,
            KeypadPress::Submit { buffer } => buffer,
        }
    }
}

/// One inline button of the keypad
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeypadButton {
    pub label: String,
    pub data: String,
}

/// Rows of the keypad for the given buffer:
/// ```text
/// 1 2 3
/// 4 5 6
/// 7 8 9
/// 0 Submit
/// ```
pub fn layout(buffer: &str) -> Vec<Vec<KeypadButton>> {
    let digit = |d: char| KeypadButton {
        label: d.to_string(),
        data: match buffer.len() < MAX_BUFFER {
            true => format!("{DIGIT_PREFIX}{buffer}{d}"),
            // Full, pressing digits just redraws the same buffer
            false => format!("{DIGIT_PREFIX}{buffer}"),
        },
    };

    let mut rows: Vec<Vec<KeypadButton>> = ["123", "456", "789"]
        .iter()
        .map(|row| row.chars().map(digit).collect())
        .collect();
    rows.push(vec![
        digit('0'),
        KeypadButton { label: SUBMIT_LABEL.to_string(), data: format!("{SUBMIT_PREFIX}{buffer}") },
    ]);
    rows
}
