//! Telegram update handlers.
//!
//! Each handler is a thin adapter: it maps the teloxide update into core
//! types and hands off to `BotService`, which owns auth, session state and
//! replies. Service errors are logged here, never bubbled to the dispatcher.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, User},
};

use otb_core::{domain::UserId, messaging::types::Sender};

use crate::router::AppState;

mod callback;
mod commands;
mod text;

fn sender_from(user: &User) -> Sender {
    Sender {
        user_id: UserId(user.id.0 as i64),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
    }
}

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    callback::handle_callback(q, state).await
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    // Text-only bot: photos, voice and the rest are ignored.
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with('/') {
        return commands::handle_command(&msg, state).await;
    }
    text::handle_text(&msg, text, state).await
}
