use crate::domain::{MessageRef, UserId};

/// Identity of the Telegram user behind an incoming update.
#[derive(Clone, Debug)]
pub struct Sender {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: String,
}

impl Sender {
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.first_name)
    }
}

/// An inline-button press, as delivered by the callback query update.
#[derive(Clone, Debug)]
pub struct CallbackPress {
    pub sender: Sender,
    pub callback_id: String,
    pub data: String,
    /// The message carrying the keyboard, when Telegram still has it.
    pub message: Option<MessageRef>,
}

/// Inline keyboard attached to an outgoing message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}
