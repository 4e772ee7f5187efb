use crate::models::{ClusterState, ServerIndex};
use crate::rules::{Capacity, RuleTable};
use super::CostFunction;

/// Penalizes servers holding more than their share of their declared capacity.
///
/// The share is the cluster-wide utilization (all regions over the summed
/// capacity of rule-bound servers) applied to each server's own limit, so
/// servers fill up proportionally to what they can hold. Servers no rule
/// matches are exempt unless a default capacity is configured, and while any
/// such server exists no share is allowed above its server's capacity.
pub struct HeterogeneousRegionCountCost {
    rules: RuleTable,
    default_capacity: Option<u32>,
    weight: f64,
    capacities: Vec<Capacity>,
    thresholds: Vec<usize>,
    server_costs: Vec<f64>,
    cost: f64,
}

impl HeterogeneousRegionCountCost {
    pub fn new(rules: RuleTable, default_capacity: Option<u32>, weight: f64) -> Self {
        Self {
            rules,
            default_capacity,
            weight,
            capacities: Vec::new(),
            thresholds: Vec::new(),
            server_costs: Vec::new(),
            cost: 0.0,
        }
    }

    pub fn capacity_of(&self, server: ServerIndex) -> Capacity {
        self.capacities.get(server).copied().unwrap_or(Capacity::Unbounded)
    }

    /// Load above which the server starts costing
    pub fn threshold_of(&self, server: ServerIndex) -> Option<usize> {
        match self.capacity_of(server) {
            Capacity::Limited(_) => self.thresholds.get(server).copied(),
            Capacity::Unbounded => None,
        }
    }

    fn server_cost(&self, cluster: &ClusterState, server: ServerIndex) -> f64 {
        let limit = match self.capacities[server] {
            Capacity::Limited(limit) => limit,
            Capacity::Unbounded => return 0.0,
        };
        let load = cluster.region_count(server);
        let threshold = self.thresholds[server];
        if load <= threshold {
            return 0.0;
        }
        let excess = (load - threshold) as f64 / f64::from(limit.max(1));
        excess * excess
    }

    fn sum(&mut self, num_servers: usize) {
        self.cost = if num_servers == 0 {
            0.0
        } else {
            self.server_costs.iter().sum::<f64>() / num_servers as f64
        };
    }
}

impl CostFunction for HeterogeneousRegionCountCost {
    fn name(&self) -> &str {
        "HeterogeneousRegionCountCost"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    fn init(&mut self, cluster: &ClusterState) {
        let num_servers = cluster.num_servers();
        self.capacities = cluster
            .servers()
            .iter()
            .map(|server| match self.rules.capacity_for(server.short_name()) {
                Capacity::Unbounded => self
                    .default_capacity
                    .map(Capacity::Limited)
                    .unwrap_or(Capacity::Unbounded),
                limited => limited,
            })
            .collect();

        let total_capacity: u64 = self
            .capacities
            .iter()
            .filter_map(|c| c.limit())
            .map(u64::from)
            .sum();
        let target_usage = if total_capacity == 0 {
            0.0
        } else {
            cluster.num_regions() as f64 / total_capacity as f64
        };

        // Shares may exceed capacity only when nowhere else can take the regions.
        let oversubscribed = self.capacities.iter().all(Capacity::is_matched)
            && total_capacity < cluster.num_regions() as u64;
        self.thresholds = self
            .capacities
            .iter()
            .map(|c| match c {
                Capacity::Limited(limit) => {
                    let share = (f64::from(*limit) * target_usage).round() as usize;
                    if oversubscribed {
                        share
                    } else {
                        share.min(*limit as usize)
                    }
                }
                Capacity::Unbounded => usize::MAX,
            })
            .collect();

        self.server_costs = (0..num_servers)
            .map(|server| self.server_cost(cluster, server))
            .collect();
        self.sum(num_servers);
    }

    fn update(&mut self, cluster: &ClusterState, touched: &[ServerIndex]) {
        for &server in touched {
            self.server_costs[server] = self.server_cost(cluster, server);
        }
        self.sum(cluster.num_servers());
    }

    fn cost(&self) -> f64 {
        self.cost
    }
}
