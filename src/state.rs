use crate::backend::{AuthClient, StorageClient};
use crate::catalog::{CatalogStore, TagStore};
use crate::config::Config;
use crate::users::UserDirectory;

/// Process-wide services, constructed once at startup and shared immutably.
/// Every clone is cheap; the underlying HTTP clients hold no per-request
/// state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub catalog: CatalogStore,
    pub tags: TagStore,
    pub users: UserDirectory,
    pub auth: AuthClient,
    pub storage: StorageClient,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let data = crate::backend::DataClient::new(&config.backend.url, &config.backend.service_key);
        let auth = AuthClient::new(&config.backend.url, &config.backend.anon_key);
        let storage = StorageClient::new(
            &config.backend.url,
            &config.backend.service_key,
            &config.backend.bucket,
        );
        Self {
            catalog: CatalogStore::new(data.clone()),
            tags: TagStore::new(data.clone()),
            users: UserDirectory::new(data),
            auth,
            storage,
            config,
        }
    }
}
