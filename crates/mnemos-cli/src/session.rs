//! Wiring a [`Client`] from the configuration, plus the REPL's mutable state.

use std::path::Path;
use std::sync::Arc;

use mnemos_memory::{Database, Embedder, HashEmbedder, Memory};
use mnemos_runtime::{Client, HttpEmbedder, LlmDriver, ProviderRouter, RemoteClient};
use mnemos_types::{AgentName, Deadline, Result};
use tracing::info;

use crate::config::Config;

/// Build the client described by `cfg`, keeping local state under `data_dir`.
pub fn build_client(cfg: &Config, data_dir: &Path) -> Result<Client> {
    if let Some(remote) = &cfg.remote {
        let mut client = RemoteClient::new(remote.url.as_str());
        if let Some(key) = remote.api_key.expose() {
            client = client.with_api_key(key);
        }
        info!(endpoint = %client.endpoint(), "remote mode");
        return Ok(Client::remote(client));
    }

    let path = cfg.database_path(data_dir);
    let db = Arc::new(Database::open(&path)?);

    let embedder: Arc<dyn Embedder> = match &cfg.embedding.url {
        Some(url) => {
            let mut http = HttpEmbedder::new(url.as_str(), cfg.embedding.model.as_str(), cfg.embedding.dimensions);
            if let Some(key) = cfg.embedding.api_key.expose() {
                http = http.with_api_key(key);
            }
            Arc::new(http)
        }
        None => Arc::new(HashEmbedder::new(cfg.embedding.dimensions)),
    };

    let mut router = ProviderRouter::new();
    for provider in &cfg.providers {
        let mut driver = LlmDriver::new(provider.url.as_str());
        if let Some(key) = provider.api_key.expose() {
            driver = driver.with_api_key(key);
        }
        router = router.route(provider.models.iter().cloned(), Arc::new(driver));
    }

    info!(database = %path.display(), embedder = embedder.name(), "local mode");
    Ok(Client::local(Memory::new(db, embedder), Arc::new(router)))
}

/// REPL state: the client, the selected agent and model.
pub struct Session {
    pub client: Client,
    pub config: Config,
    pub agent: Option<AgentName>,
    pub model: String,
}

impl Session {
    pub fn new(client: Client, config: Config) -> Self {
        let model = config.default_model.clone();
        Self {
            client,
            config,
            agent: None,
            model,
        }
    }

    pub fn deadline(&self) -> Deadline {
        self.config.deadline()
    }
}
