use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::info;

use otb_core::{
    completion::CompletionClient, config::Config, messaging::port::MessagingPort,
    service::BotService, store::RecordStore,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<BotService>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    store: Arc<dyn RecordStore>,
    completion: Arc<dyn CompletionClient>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    if let Ok(me) = bot.get_me().await {
        info!(bot = %me.username(), owner_id = cfg.owner_id.0, "bot started");
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let service = Arc::new(BotService::new(cfg, store, completion, messenger));

    let state = Arc::new(AppState { service });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
