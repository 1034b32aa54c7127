use serde::{Deserialize, Serialize};

/// Options of the reachability generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReachabilityConfig {
    /// Let the engine refine its precision and re-run after each round.
    /// When off, the generator refuses every adjustment.
    pub adjust_conditions: bool,
}
