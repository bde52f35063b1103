pub mod bar;
pub mod gateway;
pub mod yahoo;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Bar`).
pub use bar::{closes, Bar, Snapshot};
pub use gateway::MarketDataGateway;
pub use yahoo::YahooClient;
