//! Market-data boundary: where price tables come from and how a ticker
//! selection becomes an optimization request.

pub mod provider;

pub use provider::{assemble_request, PriceSource, TickerSelection};
