use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mongodb::{options::ClientOptions, Client};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::users::repo::{MongoUserStore, UserStore};
use crate::users::service::UserService;

#[derive(Clone)]
pub struct AppState {
    pub users: UserService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let mut options = ClientOptions::parse(&config.mongo.url)
            .await
            .context("parse MONGO_URL")?;
        options.max_pool_size = Some(10);
        options.min_pool_size = Some(1);
        options.connect_timeout = Some(Duration::from_secs(10));
        options.server_selection_timeout = Some(Duration::from_secs(30));
        options.app_name = Some("userhub".into());

        let client = Client::with_options(options).context("build mongodb client")?;
        // Lightweight ping so a bad URL fails at startup, not on first request.
        client
            .list_database_names()
            .await
            .context("connect to mongodb")?;
        info!(database = %config.mongo.database, "connected to mongodb");

        let db = client.database(&config.mongo.database);
        let store = MongoUserStore::new(&db);
        if let Err(e) = store.init_indexes().await {
            warn!(error = %e, "user index creation failed; continuing");
        }

        Ok(Self::from_parts(Arc::new(store), config))
    }

    pub fn from_parts(store: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self {
            users: UserService::new(store),
            config,
        }
    }
}
