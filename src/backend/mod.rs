pub mod auth;
pub mod data;
pub mod storage;

pub use auth::{AuthClient, AuthSession, AuthUser, ProviderLookup};
pub use data::DataClient;
pub use storage::StorageClient;
