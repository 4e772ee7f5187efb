use crate::models::{ClusterState, ServerIndex};
use super::CostFunction;

/// Sum of absolute deviations from the mean, scaled by the worst case where
/// one server holds everything. Deviations are kept as `|n * count - total|`
/// so the running sum stays exact across incremental updates.
#[derive(Debug, Default)]
struct SkewTracker {
    deviations: Vec<u64>,
    total: u64,
    cost: f64,
}

impl SkewTracker {
    fn init(&mut self, counts: impl Iterator<Item = usize>) {
        let counts: Vec<u64> = counts.map(|c| c as u64).collect();
        self.total = counts.iter().sum();
        let n = counts.len() as u64;
        self.deviations = counts.iter().map(|&c| (n * c).abs_diff(self.total)).collect();
        self.recompute();
    }

    fn update(&mut self, server: ServerIndex, count: usize) {
        let n = self.deviations.len() as u64;
        self.deviations[server] = (n * count as u64).abs_diff(self.total);
    }

    fn recompute(&mut self) {
        let n = self.deviations.len() as u64;
        if n < 2 || self.total == 0 {
            self.cost = 0.0;
            return;
        }
        let worst = 2 * self.total * (n - 1);
        let sum: u64 = self.deviations.iter().sum();
        self.cost = sum as f64 / worst as f64;
    }
}

/// Spreads regions evenly across servers regardless of capacity
pub struct RegionCountSkewCost {
    weight: f64,
    skew: SkewTracker,
}

impl RegionCountSkewCost {
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            skew: SkewTracker::default(),
        }
    }
}

impl CostFunction for RegionCountSkewCost {
    fn name(&self) -> &str {
        "RegionCountSkewCost"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    fn init(&mut self, cluster: &ClusterState) {
        self.skew
            .init((0..cluster.num_servers()).map(|s| cluster.region_count(s)));
    }

    fn update(&mut self, cluster: &ClusterState, touched: &[ServerIndex]) {
        for &server in touched {
            self.skew.update(server, cluster.region_count(server));
        }
        self.skew.recompute();
    }

    fn cost(&self) -> f64 {
        self.skew.cost
    }
}

/// Spreads primary replicas evenly across servers
pub struct PrimaryRegionCountSkewCost {
    weight: f64,
    skew: SkewTracker,
}

impl PrimaryRegionCountSkewCost {
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            skew: SkewTracker::default(),
        }
    }
}

impl CostFunction for PrimaryRegionCountSkewCost {
    fn name(&self) -> &str {
        "PrimaryRegionCountSkewCost"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    fn init(&mut self, cluster: &ClusterState) {
        self.skew
            .init((0..cluster.num_servers()).map(|s| cluster.primary_count(s)));
    }

    fn update(&mut self, cluster: &ClusterState, touched: &[ServerIndex]) {
        for &server in touched {
            self.skew.update(server, cluster.primary_count(server));
        }
        self.skew.recompute();
    }

    fn cost(&self) -> f64 {
        self.skew.cost
    }
}
