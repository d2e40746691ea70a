pub mod detector;
pub mod strategy_mapper;

pub use detector::MarketRegimeDetector;
pub use strategy_mapper::{HistoricalWinner, RegimeStrategyMapper};
