use invgen_core::{GenerationError, GenerationResult};
use serde::{Deserialize, Serialize};

/// Options of the k-induction generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KInductionConfig {
    /// Seed candidates from negated branch conditions leading to error locations.
    pub guess_candidates_from_cfa: bool,
    /// Witness validation: shut down once a witness group is refuted
    /// everywhere, and stop proposing candidates once the safety property
    /// is confirmed.
    pub terminate_on_counterexample: bool,
    /// Run the rounds on a background thread.
    #[serde(rename = "async")]
    pub run_async: bool,
    pub max_rounds: usize,
}

impl Default for KInductionConfig {
    fn default() -> Self {
        KInductionConfig {
            guess_candidates_from_cfa: true,
            terminate_on_counterexample: false,
            run_async: true,
            max_rounds: 64,
        }
    }
}

impl KInductionConfig {
    pub fn validate(&self) -> GenerationResult<()> {
        if self.max_rounds == 0 {
            return Err(GenerationError::InvalidConfiguration(
                "k-induction needs at least one round (max_rounds = 0)".into(),
            ));
        }
        Ok(())
    }
}
