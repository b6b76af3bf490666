pub mod analytics;
pub mod models;
pub mod testing;
pub mod upload;
