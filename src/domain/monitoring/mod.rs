// Background analytics state and reports
pub mod correlation;

pub use correlation::{AnalyzerState, CorrelationReport, StrongPair, pearson_correlation};
