use invgen_core::{GenerationError, GenerationResult};
use invgen_kinduction::KInductionConfig;
use invgen_reach::ReachabilityConfig;
use serde::{Deserialize, Serialize};

/// Top-level options of invariant generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvariantGenerationConfig {
    /// Keep adjusting reachability on a background thread instead of on
    /// request.
    #[serde(rename = "async")]
    pub run_async: bool,
    /// Allow reachability to refine its precision between rounds.
    pub adjust_conditions: bool,
    pub k_induction: KInductionConfig,
}

impl InvariantGenerationConfig {
    /// Parse and validate a JSON configuration. Missing fields take their
    /// defaults.
    pub fn from_json_str(input: &str) -> GenerationResult<Self> {
        let config: InvariantGenerationConfig = serde_json::from_str(input)
            .map_err(|e| GenerationError::InvalidConfiguration(e.to_string()))?;
        config.k_induction.validate()?;
        Ok(config)
    }

    pub fn reachability(&self) -> ReachabilityConfig {
        ReachabilityConfig {
            adjust_conditions: self.adjust_conditions,
        }
    }
}
