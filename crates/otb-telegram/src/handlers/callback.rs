use std::sync::Arc;

use teloxide::prelude::*;
use tracing::error;

use otb_core::{
    domain::{ChatId, MessageId, MessageRef},
    messaging::types::CallbackPress,
};

use crate::router::AppState;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let message = q.message.as_ref().map(|m| MessageRef {
        chat_id: ChatId(m.chat.id.0),
        message_id: MessageId(m.id.0),
    });

    let press = CallbackPress {
        sender: super::sender_from(&q.from),
        callback_id: q.id,
        // Empty data still reaches the service so the spinner gets answered.
        data: q.data.unwrap_or_default(),
        message,
    };

    if let Err(e) = state.service.handle_callback(&press).await {
        error!(
            user_id = press.sender.user_id.0,
            data = %press.data,
            error = %e,
            "callback handler failed"
        );
    }
    Ok(())
}
