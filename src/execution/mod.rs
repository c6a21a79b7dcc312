pub mod exchange;
pub mod executor;

pub use exchange::{BinanceClient, ExchangeApi, OrderResponse};
pub use executor::{normalize_symbol, ExecutionSink};
