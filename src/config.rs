use crate::BalancerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Multipliers applied to each cost function. A weight of 0 disables it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    pub heterogeneous_region_count: f64,
    pub region_count_skew: f64,
    pub primary_region_count_skew: f64,
    pub table_skew: f64,
    pub move_cost: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            heterogeneous_region_count: 500.0,
            region_count_skew: 500.0,
            primary_region_count_skew: 500.0,
            table_skew: 35.0,
            move_cost: 7.0,
        }
    }
}

/// Settings that control how a balancing run searches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Cost function multipliers
    pub weights: CostWeights,

    /// File holding `<regex> <capacity>` rules
    pub rules_file: Option<PathBuf>,

    /// Capacity given to servers that match no rule. Unset leaves them unbounded.
    pub default_capacity: Option<u32>,

    /// Hard ceiling on search iterations
    pub max_steps: u64,

    /// Iterations granted per region per server, before the ceiling applies
    pub steps_per_region: u64,

    /// Wall clock budget of one run, in milliseconds
    pub max_running_time_ms: u64,

    /// Normalized cost at or below which the cluster is left alone
    pub min_cost_need_balance: f64,

    /// Stop after this many iterations without a new best cost
    pub max_idle_steps: u64,

    /// Starting temperature for accepting worse states. 0 means hill climbing.
    pub initial_temperature: f64,

    /// Fraction of regions a single plan may move
    pub max_move_percent: f64,

    /// Lower bound on the move allowance
    pub min_max_moves: usize,

    /// Seed of the search randomness. Unset draws from the OS.
    pub seed: Option<u64>,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            weights: CostWeights::default(),
            rules_file: None,
            default_capacity: None,
            max_steps: 1_000_000,
            steps_per_region: 800,
            max_running_time_ms: 30_000,
            min_cost_need_balance: 0.025,
            max_idle_steps: 100_000,
            initial_temperature: 0.0,
            max_move_percent: 0.25,
            min_max_moves: 600,
            seed: None,
        }
    }
}

impl BalancerConfig {
    /// Only the heterogeneous capacity cost is active
    pub fn heterogeneous_only() -> Self {
        Self {
            weights: CostWeights {
                heterogeneous_region_count: 500.0,
                region_count_skew: 0.0,
                primary_region_count_skew: 0.0,
                table_skew: 0.0,
                move_cost: 0.0,
            },
            ..Default::default()
        }
    }

    /// Accept worse intermediate states early in the run
    pub fn annealing(initial_temperature: f64) -> Self {
        Self {
            initial_temperature,
            ..Default::default()
        }
    }

    pub fn with_rules_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules_file = Some(path.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parse a JSON document; missing keys keep their defaults
    pub fn from_json(text: &str) -> Result<Self, BalancerError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| BalancerError::Config(format!("invalid balancer config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BalancerError> {
        let w = &self.weights;
        let weights = [
            w.heterogeneous_region_count,
            w.region_count_skew,
            w.primary_region_count_skew,
            w.table_skew,
            w.move_cost,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(BalancerError::Config(
                "cost weights must be finite and non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_move_percent) {
            return Err(BalancerError::Config(format!(
                "max_move_percent {} outside [0, 1]",
                self.max_move_percent
            )));
        }
        if !self.initial_temperature.is_finite() || self.initial_temperature < 0.0 {
            return Err(BalancerError::Config(
                "initial_temperature must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_running_time(&self) -> Duration {
        Duration::from_millis(self.max_running_time_ms)
    }

    /// Iteration budget for a cluster of the given shape
    pub fn compute_max_steps(&self, num_regions: usize, num_servers: usize) -> u64 {
        let scaled = (num_regions as u64)
            .saturating_mul(self.steps_per_region)
            .saturating_mul(num_servers as u64);
        scaled.min(self.max_steps)
    }
}
