mod connection;
mod error;
mod models;
pub mod config;
pub mod store;

pub use error::MongoDaoError;
pub use store::MongoQuizStore;

use crate::dao::store::StoreError;

impl From<MongoDaoError> for StoreError {
    fn from(err: MongoDaoError) -> Self {
        StoreError::unavailable(err.to_string(), err)
    }
}
