//! Return statistics: price tables to annualized mean vector and covariance matrix.

pub mod prices;
pub mod returns;

pub use prices::{PriceSeries, PriceTable};
pub use returns::{
    analyze_prices, compute_statistics, simple_returns, statistics_from_returns, ReturnStatistics,
    ReturnTable, TRADING_PERIODS_PER_YEAR,
};
