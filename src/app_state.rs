//! Application State Management
//!
//! Process-wide context built once at startup: the store and media
//! backends are chosen from configuration, wrapped in the services, and
//! passed explicitly to the handlers. Tests build the same state over the
//! mock backends.

use log::info;
use std::sync::Arc;

use crate::auth::TokenAuthority;
use crate::config::{AppConfig, DatabaseBackend, MediaBackend};
use crate::error::ApiError;
use crate::media::http_host::HttpMediaHost;
use crate::media::mock_host::MockMediaHost;
use crate::media::{MediaHost, MediaPipeline};
use crate::service::account::AccountService;
use crate::service::blog::BlogService;
use crate::service::engagement::EngagementService;
use crate::store::mock_store::MockDataStore;
use crate::store::mongo_store::MongoDataStore;
use crate::store::DataStore;

/// Application state containing all services and their dependencies
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub blogs: Arc<BlogService>,
    pub engagement: Arc<EngagementService>,
    pub tokens: Arc<TokenAuthority>,
    pub store: Arc<dyn DataStore>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state from configuration.
    pub async fn from_config(config: AppConfig) -> Result<Self, ApiError> {
        info!("Initializing application state");

        let store: Arc<dyn DataStore> = match config.database.backend {
            DatabaseBackend::Mongo => {
                info!(
                    "Using MongoDB backend, database '{}'",
                    config.database.db_name
                );
                Arc::new(MongoDataStore::connect(&config.database).await?)
            }
            DatabaseBackend::Mock => {
                info!("Using mock store backend");
                Arc::new(MockDataStore::new())
            }
        };

        let media_host: Arc<dyn MediaHost> = match config.media.backend {
            MediaBackend::Http => {
                info!("Using HTTP media host at {}", config.media.upload_url);
                Arc::new(HttpMediaHost::new(&config.media))
            }
            MediaBackend::Mock => {
                info!("Using mock media host");
                Arc::new(MockMediaHost::new())
            }
        };

        Ok(Self::with_backends(store, media_host, config))
    }

    /// Wire services over explicit backends. Used by `from_config` and by
    /// tests that need to keep a handle on the concrete mocks.
    pub fn with_backends(
        store: Arc<dyn DataStore>,
        media_host: Arc<dyn MediaHost>,
        config: AppConfig,
    ) -> Self {
        let media = Arc::new(MediaPipeline::new(media_host, &config.media.staging_path));
        let tokens = Arc::new(TokenAuthority::new(
            &config.auth.jwt_secret,
            config.auth.token_ttl_days,
        ));

        let accounts = Arc::new(AccountService::new(
            Arc::clone(&store),
            Arc::clone(&media),
            Arc::clone(&tokens),
        ));
        let blogs = Arc::new(BlogService::new(Arc::clone(&store)));
        let engagement = Arc::new(EngagementService::new(Arc::clone(&store), media));

        Self {
            accounts,
            blogs,
            engagement,
            tokens,
            store,
            config,
        }
    }

    /// Create application state for testing with mock backends and a
    /// throwaway staging directory.
    pub fn new_for_testing() -> Self {
        let mut config = AppConfig::default();
        config.database.backend = DatabaseBackend::Mock;
        config.media.backend = MediaBackend::Mock;
        config.auth.jwt_secret = "test-secret".to_string();
        config.media.staging_path = std::env::temp_dir()
            .join(format!("moonhalo-staging-{}", uuid::Uuid::new_v4()))
            .display()
            .to_string();

        Self::with_backends(
            Arc::new(MockDataStore::new()),
            Arc::new(MockMediaHost::new()),
            config,
        )
    }
}
