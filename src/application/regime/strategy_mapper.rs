use crate::application::knowledge_base::KnowledgeBase;
use crate::domain::market::RegimeDetection;
use crate::domain::optimization::Individual;
use tracing::{info, warn};

/// Market condition used when a regime has no dedicated historical analogue.
pub const BASELINE_CONDITIONS: &[&str] = &["Full_History"];

/// Regime tag → historical market conditions that resemble it, most similar first.
const REGIME_CONDITIONS: &[(&str, &[&str])] = &[
    ("Bull_Low_Vol", &["2017_Low_Vol_Bull", "2021_Bull"]),
    ("Bull_Normal", &["2021_Bull", "2019_Steady_Bull"]),
    ("Bull_High_Vol", &["2020_Recovery", "2009_Rebound"]),
    ("Bear_High_Vol", &["2022_Bear", "COVID_Crash"]),
    ("Bear_Normal", &["2022_Bear", "2018_Q4_Selloff"]),
    ("Bear_Low_Vol", &["2018_Q4_Selloff", "2015_Chop"]),
];

/// Best historical strategy for a regime.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalWinner {
    pub strategy: String,
    pub params: Individual,
    pub historical_return: f64,
    pub source_condition: String,
}

/// Historical conditions for a regime tag; unmapped tags get the baseline.
pub fn conditions_for(regime_tag: &str) -> &'static [&'static str] {
    REGIME_CONDITIONS
        .iter()
        .find(|(tag, _)| *tag == regime_tag)
        .map(|(_, conditions)| *conditions)
        .unwrap_or(BASELINE_CONDITIONS)
}

pub struct RegimeStrategyMapper {
    knowledge_base: KnowledgeBase,
}

impl RegimeStrategyMapper {
    pub fn new(knowledge_base: KnowledgeBase) -> Self {
        Self { knowledge_base }
    }

    /// Highest-return profitable historical run for the regime in `universe`, if any.
    pub async fn find_winner(
        &self,
        regime: &RegimeDetection,
        universe: &str,
    ) -> Option<HistoricalWinner> {
        let conditions = conditions_for(regime.tag());
        match self
            .knowledge_base
            .best_for_conditions(conditions, universe)
            .await
        {
            Ok(Some(result)) => {
                info!(
                    "RegimeMapper: {} -> {} from {} ({:.2}%)",
                    regime.tag(),
                    result.strategy_name,
                    result.market_condition,
                    result.total_return
                );
                Some(HistoricalWinner {
                    strategy: result.strategy_name,
                    params: result.best_params,
                    historical_return: result.total_return,
                    source_condition: result.market_condition,
                })
            }
            Ok(None) => {
                info!(
                    "RegimeMapper: no profitable history for {} in {} ({:?})",
                    regime.tag(),
                    universe,
                    conditions
                );
                None
            }
            Err(e) => {
                warn!("RegimeMapper: knowledge base query failed: {:#}", e);
                None
            }
        }
    }
}
