use crate::config::BalancerConfig;
use crate::models::{ClusterState, ServerIndex};
use crate::rules::RuleTable;
use serde::{Deserialize, Serialize};

/// Core trait for cost functions. A cost of 0.0 is ideal, larger is worse.
///
/// Implementations cache their value: `init` computes it from scratch and
/// `update` refreshes it after the given servers changed. The default
/// `update` falls back to a full recompute.
pub trait CostFunction: Send + Sync {
    /// Name of this cost function
    fn name(&self) -> &str;

    fn weight(&self) -> f64;

    fn set_weight(&mut self, weight: f64);

    /// Compute the cost of the whole cluster
    fn init(&mut self, cluster: &ClusterState);

    /// Refresh the cost after the load of `touched` servers changed
    fn update(&mut self, cluster: &ClusterState, touched: &[ServerIndex]) {
        let _ = touched;
        self.init(cluster);
    }

    /// Cached cost, always >= 0.0
    fn cost(&self) -> f64;

    /// Disabled functions are neither evaluated nor part of the aggregate
    fn is_needed(&self) -> bool {
        self.weight() > 0.0
    }
}

/// Value of one cost function at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    pub name: String,
    pub weight: f64,
    pub cost: f64,
}

impl CostReport {
    pub fn weighted(&self) -> f64 {
        self.weight * self.cost
    }

    pub fn summary(&self) -> String {
        format!(
            "{} (weight {}): cost {:.4}, weighted {:.4}",
            self.name,
            self.weight,
            self.cost,
            self.weighted()
        )
    }
}

/// Weighted sum of a set of cost functions
pub struct CostFunctions {
    functions: Vec<Box<dyn CostFunction>>,
}

impl CostFunctions {
    pub fn new(functions: Vec<Box<dyn CostFunction>>) -> Self {
        Self { functions }
    }

    /// The standard set of cost functions with weights taken from the config
    pub fn from_config(config: &BalancerConfig, rules: &RuleTable) -> Self {
        let w = &config.weights;
        Self::new(vec![
            Box::new(HeterogeneousRegionCountCost::new(
                rules.clone(),
                config.default_capacity,
                w.heterogeneous_region_count,
            )),
            Box::new(RegionCountSkewCost::new(w.region_count_skew)),
            Box::new(PrimaryRegionCountSkewCost::new(w.primary_region_count_skew)),
            Box::new(TableSkewCost::new(w.table_skew)),
            Box::new(MoveCost::new(
                config.max_move_percent,
                config.min_max_moves,
                w.move_cost,
            )),
        ])
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Box<dyn CostFunction>> {
        self.functions.iter_mut().find(|f| f.name() == name)
    }

    fn active(&self) -> impl Iterator<Item = &Box<dyn CostFunction>> {
        self.functions.iter().filter(|f| f.is_needed())
    }

    pub fn init(&mut self, cluster: &ClusterState) {
        for function in self.functions.iter_mut().filter(|f| f.is_needed()) {
            function.init(cluster);
        }
    }

    pub fn update(&mut self, cluster: &ClusterState, touched: &[ServerIndex]) {
        for function in self.functions.iter_mut().filter(|f| f.is_needed()) {
            function.update(cluster, touched);
        }
    }

    /// Weighted sum of all active costs
    pub fn total(&self) -> f64 {
        self.active().map(|f| f.weight() * f.cost()).sum()
    }

    pub fn sum_of_weights(&self) -> f64 {
        self.active().map(|f| f.weight()).sum()
    }

    /// Total divided by the sum of active weights, in the band of a single cost
    pub fn normalized(&self) -> f64 {
        let weights = self.sum_of_weights();
        if weights <= 0.0 {
            0.0
        } else {
            self.total() / weights
        }
    }

    pub fn report(&self) -> Vec<CostReport> {
        self.active()
            .map(|f| CostReport {
                name: f.name().to_string(),
                weight: f.weight(),
                cost: f.cost(),
            })
            .collect()
    }
}

// Module declarations
mod heterogeneous;
mod region_count;
mod table_skew;
mod move_cost;

// Re-exports
pub use heterogeneous::HeterogeneousRegionCountCost;
pub use region_count::{PrimaryRegionCountSkewCost, RegionCountSkewCost};
pub use table_skew::TableSkewCost;
pub use move_cost::{MoveCost, MOVE_LIMIT_EXCEEDED_COST};
