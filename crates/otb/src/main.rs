use std::sync::Arc;

use otb_core::{
    completion::CompletionClient,
    config::Config,
    store::{JsonFileStore, RecordStore},
};
use otb_openrouter::OpenRouterClient;

#[tokio::main]
async fn main() -> Result<(), otb_core::Error> {
    otb_core::logging::init("otb")?;

    let cfg = Arc::new(Config::load()?);

    let store: Arc<dyn RecordStore> = Arc::new(JsonFileStore::new(&cfg.data_dir)?);
    let completion: Arc<dyn CompletionClient> = Arc::new(OpenRouterClient::new(
        cfg.openrouter_api_key.clone(),
        cfg.upstream_timeout,
    ));

    otb_telegram::router::run_polling(cfg, store, completion)
        .await
        .map_err(|e| otb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
