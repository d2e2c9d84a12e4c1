// Append-only Postgres persistence
pub mod postgres;

pub use postgres::TradeStore;
