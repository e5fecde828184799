use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::InlineKeyboard,
    Result,
};

/// Outbound messenger port.
///
/// Telegram is the first implementation; the shape is kept small so tests can
/// stand in a recording fake and future adapters can fit behind it.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    /// Plain-text message, optionally with an inline keyboard.
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef>;

    /// HTML-formatted message (menus, status screens).
    async fn send_html(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<MessageRef>;

    /// Rewrite an existing message in place, replacing its keyboard.
    async fn edit_html(
        &self,
        msg: MessageRef,
        html: &str,
        keyboard: Option<InlineKeyboard>,
    ) -> Result<()>;

    /// "typing…" indicator.
    async fn send_typing(&self, chat_id: ChatId) -> Result<()>;

    /// Acknowledge a callback query so the client stops its spinner.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()>;
}
