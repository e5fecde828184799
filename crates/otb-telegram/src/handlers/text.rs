use std::sync::Arc;

use teloxide::prelude::*;
use tracing::error;

use crate::router::AppState;

pub async fn handle_text(msg: &Message, text: &str, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    if text.trim().is_empty() {
        return Ok(());
    }

    let sender = super::sender_from(user);
    if let Err(e) = state.service.handle_text(&sender, text).await {
        error!(user_id = sender.user_id.0, error = %e, "text handler failed");
    }
    Ok(())
}
