/// Entities exchanged with the quiz catalogue.
pub mod models;
/// Quiz store trait and its backends.
pub mod quiz_store;
/// Backend-agnostic store errors.
pub mod store;
