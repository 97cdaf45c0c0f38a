pub mod error;
pub mod traits;
pub mod types;
pub mod universe;

pub use error::AdvisorError;
pub use traits::MarketDataProvider;
pub use types::{
    InstrumentMetrics, Market, MetricsTable, PriceSeries, PriceTable, RankedEtf, ReturnSeries,
    ReturnTable, Theme, UserProfile,
};
