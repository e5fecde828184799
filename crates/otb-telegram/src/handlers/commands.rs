use std::sync::Arc;

use teloxide::prelude::*;
use tracing::error;

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub async fn handle_command(msg: &Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let sender = super::sender_from(user);
    let (cmd, _args) = parse_command(text);

    let outcome = match cmd.as_str() {
        "start" => state.service.handle_start(&sender).await,
        "menu" => state.service.handle_menu(sender.user_id).await,
        "admin" => state.service.handle_admin(sender.user_id).await,
        "cancel" => state.service.handle_cancel(sender.user_id).await,
        // Unregistered commands are dropped like any other noise.
        _ => Ok(()),
    };

    if let Err(e) = outcome {
        error!(user_id = sender.user_id.0, command = %cmd, error = %e, "command failed");
    }
    Ok(())
}
