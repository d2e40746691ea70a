pub mod mock;
pub mod yahoo;

pub use mock::MockMarketDataService;
pub use yahoo::YahooMarketDataService;
