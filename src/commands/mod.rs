pub mod ingest;
pub mod inventory;
pub mod query;
pub mod resolve;
pub mod status;
