pub mod correlation_analyzer;

pub use correlation_analyzer::{AnalyzerHandle, AnalyzerSettings, CorrelationAnalyzer};
