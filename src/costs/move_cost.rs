use crate::models::ClusterState;
use super::CostFunction;

/// Cost reported once a plan would move more regions than allowed
pub const MOVE_LIMIT_EXCEEDED_COST: f64 = 1_000_000.0;

/// Charges for every region away from its starting server, keeping plans short
pub struct MoveCost {
    max_move_percent: f64,
    min_max_moves: usize,
    weight: f64,
    max_moves: usize,
    cost: f64,
}

impl MoveCost {
    pub fn new(max_move_percent: f64, min_max_moves: usize, weight: f64) -> Self {
        Self {
            max_move_percent,
            min_max_moves,
            weight,
            max_moves: 0,
            cost: 0.0,
        }
    }

    /// Moves allowed for the cluster last passed to `init`
    pub fn max_moves(&self) -> usize {
        self.max_moves
    }
}

impl CostFunction for MoveCost {
    fn name(&self) -> &str {
        "MoveCost"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    fn init(&mut self, cluster: &ClusterState) {
        let num_regions = cluster.num_regions();
        let by_percent = (num_regions as f64 * self.max_move_percent) as usize;
        self.max_moves = by_percent.max(self.min_max_moves).min(num_regions);

        let moved = cluster.moved_region_count();
        self.cost = if moved > self.max_moves {
            MOVE_LIMIT_EXCEEDED_COST
        } else if self.max_moves == 0 {
            0.0
        } else {
            moved as f64 / self.max_moves as f64
        };
    }

    fn cost(&self) -> f64 {
        self.cost
    }
}
