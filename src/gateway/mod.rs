//! Asset cache gateway: version-scoped caching of static resources with
//! environment-dependent fetch strategies and offline fallback.

mod fetch;
mod store;
mod types;
mod worker;

pub use fetch::HttpClient;
pub use store::{AssetStore, SqliteAssetStore};
pub use types::{
  AssetRequest, Destination, Environment, RequestClass, ResponseSnapshot, ServedFrom,
  ServedResponse,
};
pub use worker::{CacheWorker, WorkerSettings, WorkerState};
