mod db;
mod error;
mod models;

pub use db::SqliteStore;
pub use error::{PersistenceError, PersistenceResult};
pub use models::StoredAsset;
