use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// Moving average periods used by the trend classifier.
pub const FAST_SMA_PERIOD: usize = 50;
pub const SLOW_SMA_PERIOD: usize = 200;

/// Volatility-index thresholds. Both comparisons are strict.
pub const HIGH_VOL_THRESHOLD: f64 = 25.0;
pub const LOW_VOL_THRESHOLD: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bull,
    Bear,
    Sideways,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bull => write!(f, "Bull"),
            Trend::Bear => write!(f, "Bear"),
            Trend::Sideways => write!(f, "Sideways"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityLevel {
    #[serde(rename = "High_Vol")]
    HighVol,
    Normal,
    #[serde(rename = "Low_Vol")]
    LowVol,
}

impl fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityLevel::HighVol => write!(f, "High_Vol"),
            VolatilityLevel::Normal => write!(f, "Normal"),
            VolatilityLevel::LowVol => write!(f, "Low_Vol"),
        }
    }
}

/// Bull when price is above both averages, Bear when below both, Sideways otherwise.
pub fn classify_trend(price: f64, sma_fast: f64, sma_slow: f64) -> Trend {
    if price > sma_fast && price > sma_slow {
        Trend::Bull
    } else if price < sma_fast && price < sma_slow {
        Trend::Bear
    } else {
        Trend::Sideways
    }
}

pub fn classify_volatility(index_level: f64) -> VolatilityLevel {
    if index_level > HIGH_VOL_THRESHOLD {
        VolatilityLevel::HighVol
    } else if index_level < LOW_VOL_THRESHOLD {
        VolatilityLevel::LowVol
    } else {
        VolatilityLevel::Normal
    }
}

/// Current trend × volatility state. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeClassification {
    pub regime: String,
    pub trend: Trend,
    pub volatility: VolatilityLevel,
    pub vix_level: f64,
    pub sma200_distance_pct: f64,
    pub price: f64,
    pub sma50: f64,
    pub sma200: f64,
}

impl RegimeClassification {
    pub fn new(price: f64, sma50: f64, sma200: f64, vix_level: f64) -> Self {
        let trend = classify_trend(price, sma50, sma200);
        let volatility = classify_volatility(vix_level);
        let sma200_distance_pct = if sma200 != 0.0 {
            (price - sma200) / sma200 * 100.0
        } else {
            0.0
        };
        Self {
            regime: format!("{}_{}", trend, volatility),
            trend,
            volatility,
            vix_level,
            sma200_distance_pct,
            price,
            sma50,
            sma200,
        }
    }
}

/// Result of a detection attempt. Insufficient data is a value, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum RegimeDetection {
    Classified(RegimeClassification),
    Unknown { reason: String },
}

impl RegimeDetection {
    pub fn unknown(reason: impl Into<String>) -> Self {
        RegimeDetection::Unknown {
            reason: reason.into(),
        }
    }

    /// Compound tag such as `"Bull_Low_Vol"`, or `"Unknown"`.
    pub fn tag(&self) -> &str {
        match self {
            RegimeDetection::Classified(c) => &c.regime,
            RegimeDetection::Unknown { .. } => "Unknown",
        }
    }

    pub fn classification(&self) -> Option<&RegimeClassification> {
        match self {
            RegimeDetection::Classified(c) => Some(c),
            RegimeDetection::Unknown { .. } => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RegimeDetection::Classified(c) => {
                serde_json::to_value(c).unwrap_or_else(|_| json!({ "regime": c.regime }))
            }
            RegimeDetection::Unknown { reason } => json!({ "regime": "Unknown", "reason": reason }),
        }
    }
}

impl fmt::Display for RegimeDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegimeDetection::Classified(c) => write!(
                f,
                "{} (VIX {:.2}, {:+.2}% vs SMA200)",
                c.regime, c.vix_level, c.sma200_distance_pct
            ),
            RegimeDetection::Unknown { reason } => write!(f, "Unknown ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatility_boundaries_are_strict() {
        assert_eq!(classify_volatility(25.0), VolatilityLevel::Normal);
        assert_eq!(classify_volatility(12.0), VolatilityLevel::Normal);
        assert_eq!(classify_volatility(25.01), VolatilityLevel::HighVol);
        assert_eq!(classify_volatility(11.99), VolatilityLevel::LowVol);
    }

    #[test]
    fn test_trend_classification() {
        assert_eq!(classify_trend(110.0, 100.0, 90.0), Trend::Bull);
        assert_eq!(classify_trend(80.0, 100.0, 90.0), Trend::Bear);
        assert_eq!(classify_trend(95.0, 100.0, 90.0), Trend::Sideways);
        // Touching an average is not "above" it
        assert_eq!(classify_trend(100.0, 100.0, 90.0), Trend::Sideways);
    }

    #[test]
    fn test_bull_low_vol_tag() {
        let c = RegimeClassification::new(120.0, 110.0, 100.0, 10.0);
        assert_eq!(c.regime, "Bull_Low_Vol");
        assert!((c.sma200_distance_pct - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_json_shape() {
        let detection = RegimeDetection::unknown("only 40 daily bars");
        let value = detection.to_json();
        assert_eq!(value["regime"], "Unknown");
        assert_eq!(value["reason"], "only 40 daily bars");
        assert_eq!(detection.tag(), "Unknown");
    }
}
