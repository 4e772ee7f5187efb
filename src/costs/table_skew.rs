use crate::models::ClusterState;
use super::CostFunction;

/// Penalizes tables whose regions pile up on a single server
pub struct TableSkewCost {
    weight: f64,
    cost: f64,
}

impl TableSkewCost {
    pub fn new(weight: f64) -> Self {
        Self { weight, cost: 0.0 }
    }

    fn table_cost(cluster: &ClusterState, table: usize) -> f64 {
        let num_servers = cluster.num_servers();
        let total = cluster.table_region_total(table);
        if num_servers == 0 || total == 0 {
            return 0.0;
        }
        let ideal = total.div_ceil(num_servers);
        let max = (0..num_servers)
            .map(|s| cluster.table_region_count(s, table))
            .max()
            .unwrap_or(0);
        let spread = total - ideal;
        if spread == 0 {
            return 0.0;
        }
        max.saturating_sub(ideal) as f64 / spread as f64
    }
}

impl CostFunction for TableSkewCost {
    fn name(&self) -> &str {
        "TableSkewCost"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    fn init(&mut self, cluster: &ClusterState) {
        let num_tables = cluster.num_tables();
        self.cost = if num_tables == 0 {
            0.0
        } else {
            (0..num_tables)
                .map(|t| Self::table_cost(cluster, t))
                .sum::<f64>()
                / num_tables as f64
        };
    }

    fn cost(&self) -> f64 {
        self.cost
    }
}
