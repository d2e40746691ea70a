// Market analysis domain
pub mod candle;
pub mod live_strategy;
pub mod market_regime;

pub use candle::Candle;
pub use live_strategy::LiveStrategyConfig;
pub use market_regime::{RegimeClassification, RegimeDetection, Trend, VolatilityLevel};
