use crate::config::BalancerConfig;
use crate::costs::{CostFunctions, CostReport};
use crate::generators::CandidateGenerator;
use crate::models::{ClusterState, ServerIndex};
use crate::BalancerError;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Where a search run is, and how it ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Init,
    Iterating,
    /// Cost reached zero or stopped improving
    Converged,
    /// Step or time budget ran out
    BudgetExhausted,
    /// Nothing worth doing, or nothing that helped
    NoImprovement,
}

/// Plain-value summary of a run, for logs and metrics sinks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub state: SearchState,
    pub initial_cost: f64,
    pub final_cost: f64,
    pub initial_costs: Vec<CostReport>,
    pub final_costs: Vec<CostReport>,
    pub max_steps: u64,
    pub steps: u64,
    pub accepted: u64,
    pub elapsed_ms: u64,
}

impl OptimizationReport {
    pub fn improved(&self) -> bool {
        self.final_cost < self.initial_cost
    }

    pub fn summary(&self) -> String {
        format!(
            "{:?}: cost {:.4} -> {:.4} after {}/{} steps ({} accepted, {} ms)",
            self.state,
            self.initial_cost,
            self.final_cost,
            self.steps,
            self.max_steps,
            self.accepted,
            self.elapsed_ms
        )
    }
}

/// Stochastic local search over region placements.
///
/// Each step asks a randomly chosen generator for an action, applies it to the
/// working state, and keeps it if the weighted cost went down. With a non-zero
/// temperature, worse states are sometimes kept too, and the best assignment
/// seen is restored at the end.
pub struct Optimizer {
    costs: CostFunctions,
    generators: Vec<Box<dyn CandidateGenerator>>,
    config: BalancerConfig,
}

impl Optimizer {
    pub fn new(
        costs: CostFunctions,
        generators: Vec<Box<dyn CandidateGenerator>>,
        config: BalancerConfig,
    ) -> Self {
        Self {
            costs,
            generators,
            config,
        }
    }

    pub fn builder() -> OptimizerBuilder {
        OptimizerBuilder::new()
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    pub fn set_cost_functions(&mut self, costs: CostFunctions) {
        self.costs = costs;
    }

    pub fn set_generators(&mut self, generators: Vec<Box<dyn CandidateGenerator>>) {
        self.generators = generators;
    }

    /// Per-function costs of a state, without searching
    pub fn cost_report(&mut self, cluster: &ClusterState) -> Vec<CostReport> {
        self.costs.init(cluster);
        self.costs.report()
    }

    /// Improve `cluster` in place. The cost of the final state never exceeds
    /// the cost of the state passed in.
    pub fn optimize(
        &mut self,
        cluster: &mut ClusterState,
        rng: &mut dyn RngCore,
    ) -> Result<OptimizationReport, BalancerError> {
        let started = Instant::now();
        let deadline = started + self.config.max_running_time();

        self.costs.init(cluster);
        let initial_costs = self.costs.report();
        let initial_cost = self.costs.total();
        let mut report = OptimizationReport {
            state: SearchState::Init,
            initial_cost,
            final_cost: initial_cost,
            initial_costs: initial_costs.clone(),
            final_costs: initial_costs,
            max_steps: 0,
            steps: 0,
            accepted: 0,
            elapsed_ms: 0,
        };

        if cluster.num_servers() < 2 || cluster.num_regions() == 0 || self.generators.is_empty() {
            debug!(
                servers = cluster.num_servers(),
                regions = cluster.num_regions(),
                "nothing to balance"
            );
            report.state = SearchState::NoImprovement;
            return Ok(report);
        }

        let normalized = self.costs.normalized();
        if normalized <= self.config.min_cost_need_balance {
            debug!(
                cost = normalized,
                threshold = self.config.min_cost_need_balance,
                "cluster already balanced, skipping search"
            );
            report.state = SearchState::NoImprovement;
            return Ok(report);
        }

        let max_steps = self
            .config
            .compute_max_steps(cluster.num_regions(), cluster.num_servers());
        report.max_steps = max_steps;
        report.state = SearchState::Iterating;
        debug!(max_steps, initial_cost, "starting search");

        let annealing = self.config.initial_temperature > 0.0;
        let mut current = initial_cost;
        let mut best = initial_cost;
        let mut best_assignment: Option<Vec<ServerIndex>> =
            annealing.then(|| cluster.assignment().to_vec());
        let mut idle: u64 = 0;

        let exit = loop {
            if report.steps >= max_steps {
                break SearchState::BudgetExhausted;
            }
            if Instant::now() >= deadline {
                warn!(
                    steps = report.steps,
                    max_steps,
                    "balancer ran out of time before finishing its steps"
                );
                break SearchState::BudgetExhausted;
            }
            report.steps += 1;

            let pick = rng.gen_range(0..self.generators.len());
            let action = self.generators[pick].generate(cluster, rng);
            if action.is_null() {
                idle += 1;
            } else if let Err(e) = cluster.apply(&action) {
                trace!(error = %e, "rejected proposal");
                idle += 1;
            } else {
                let touched = action.touched_servers();
                self.costs.update(cluster, &touched);
                let candidate = self.costs.total();

                let accept = candidate < current
                    || (annealing && self.accept_worse(candidate - current, report.steps, max_steps, rng));
                if accept {
                    current = candidate;
                    report.accepted += 1;
                    if current < best {
                        best = current;
                        idle = 0;
                        if let Some(snapshot) = best_assignment.as_mut() {
                            snapshot.clear();
                            snapshot.extend_from_slice(cluster.assignment());
                        }
                    } else {
                        idle += 1;
                    }
                } else if let Err(e) = cluster.apply(&action.undo()) {
                    warn!(error = %e, "cannot undo rejected proposal, stopping at the last saved assignment");
                    let fallback = match best_assignment.take() {
                        Some(snapshot) => snapshot,
                        None => (0..cluster.num_regions())
                            .map(|r| cluster.initial_server_of(r))
                            .collect(),
                    };
                    cluster.restore(&fallback)?;
                    self.costs.init(cluster);
                    current = self.costs.total();
                    break SearchState::BudgetExhausted;
                } else {
                    self.costs.update(cluster, &touched);
                    idle += 1;
                }
            }

            if best <= 0.0 {
                break SearchState::Converged;
            }
            if self.config.max_idle_steps > 0 && idle >= self.config.max_idle_steps {
                break SearchState::Converged;
            }
        };

        if current > best {
            if let Some(snapshot) = best_assignment {
                cluster.restore(&snapshot)?;
                self.costs.init(cluster);
                current = self.costs.total();
            }
        }

        report.state = if current < initial_cost {
            exit
        } else {
            SearchState::NoImprovement
        };
        report.final_cost = current;
        report.final_costs = self.costs.report();
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            state = ?report.state,
            initial_cost = report.initial_cost,
            final_cost = report.final_cost,
            steps = report.steps,
            accepted = report.accepted,
            moved = cluster.moved_region_count(),
            elapsed_ms = report.elapsed_ms,
            "balancer search finished"
        );
        for cost in &report.final_costs {
            debug!(name = %cost.name, weight = cost.weight, cost = cost.cost, "final cost");
        }

        Ok(report)
    }

    /// Metropolis acceptance with a temperature decaying linearly to zero
    fn accept_worse(&self, delta: f64, step: u64, max_steps: u64, rng: &mut dyn RngCore) -> bool {
        let remaining = 1.0 - step as f64 / max_steps.max(1) as f64;
        let temperature = self.config.initial_temperature * remaining;
        if temperature <= 0.0 || !delta.is_finite() {
            return false;
        }
        rng.gen::<f64>() < (-delta / temperature).exp()
    }
}

/// Builder for creating an Optimizer with a fluent API
pub struct OptimizerBuilder {
    costs: Option<CostFunctions>,
    generators: Vec<Box<dyn CandidateGenerator>>,
    config: BalancerConfig,
}

impl OptimizerBuilder {
    pub fn new() -> Self {
        Self {
            costs: None,
            generators: Vec::new(),
            config: BalancerConfig::default(),
        }
    }

    pub fn cost_functions(mut self, costs: CostFunctions) -> Self {
        self.costs = Some(costs);
        self
    }

    pub fn add_generator(mut self, generator: Box<dyn CandidateGenerator>) -> Self {
        self.generators.push(generator);
        self
    }

    pub fn with_config(mut self, config: BalancerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Optimizer {
        Optimizer {
            costs: self.costs.unwrap_or_else(|| CostFunctions::new(Vec::new())),
            generators: self.generators,
            config: self.config,
        }
    }
}

impl Default for OptimizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::{CostFunctions, RegionCountSkewCost};
    use crate::generators::{LoadCandidateGenerator, RandomCandidateGenerator};
    use crate::models::{RegionInfo, ServerName};
    use crate::rules::RuleTable;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    fn cluster(loads: &[usize]) -> ClusterState {
        let mut map = BTreeMap::new();
        let mut next = 0;
        for (i, &load) in loads.iter().enumerate() {
            let regions = (0..load)
                .map(|_| {
                    next += 1;
                    RegionInfo::new("t1", format!("r{}", next))
                })
                .collect();
            map.insert(ServerName::new(format!("rs{}", i), 16020, 1), regions);
        }
        ClusterState::new(&map).unwrap()
    }

    fn skew_optimizer(config: BalancerConfig) -> Optimizer {
        Optimizer::builder()
            .cost_functions(CostFunctions::new(vec![Box::new(RegionCountSkewCost::new(1.0))]))
            .add_generator(Box::new(RandomCandidateGenerator::new()))
            .add_generator(Box::new(LoadCandidateGenerator::new()))
            .with_config(config)
            .build()
    }

    #[test]
    fn test_optimizer_builder() {
        let optimizer = Optimizer::builder()
            .add_generator(Box::new(RandomCandidateGenerator::fair()))
            .build();
        assert_eq!(optimizer.generators.len(), 1);
        assert!(optimizer.costs.is_empty());
    }

    #[test]
    fn test_empty_cluster_is_no_improvement() {
        let mut state = cluster(&[]);
        let mut optimizer = skew_optimizer(BalancerConfig::default());
        let report = optimizer
            .optimize(&mut state, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(report.state, SearchState::NoImprovement);
        assert_eq!(report.steps, 0);
    }

    #[test]
    fn test_balanced_cluster_skips_search() {
        let mut state = cluster(&[10, 10, 10]);
        let mut optimizer = skew_optimizer(BalancerConfig::default());
        let report = optimizer
            .optimize(&mut state, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(report.state, SearchState::NoImprovement);
        assert_eq!(report.steps, 0);
        assert_eq!(state.moved_region_count(), 0);
    }

    #[test]
    fn test_hill_climbing_converges() {
        let mut state = cluster(&[0, 30, 0]);
        let mut optimizer = skew_optimizer(BalancerConfig::default());
        let report = optimizer
            .optimize(&mut state, &mut StdRng::seed_from_u64(7))
            .unwrap();
        assert_eq!(report.state, SearchState::Converged);
        assert_eq!(report.final_cost, 0.0);
        assert!(report.improved());
        assert_eq!(state.region_count(0), 10);
        assert_eq!(state.region_count(1), 10);
        assert_eq!(state.region_count(2), 10);
    }

    #[test]
    fn test_step_budget_is_respected() {
        let mut state = cluster(&[0, 300]);
        let config = BalancerConfig {
            max_steps: 5,
            ..Default::default()
        };
        let mut optimizer = skew_optimizer(config);
        let report = optimizer
            .optimize(&mut state, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(report.steps, 5);
        assert!(report.final_cost <= report.initial_cost);
        assert_eq!(state.num_regions(), 300);
    }

    #[test]
    fn test_zero_time_budget_leaves_cluster_untouched() {
        let mut state = cluster(&[0, 300]);
        let config = BalancerConfig {
            max_running_time_ms: 0,
            ..Default::default()
        };
        let mut optimizer = skew_optimizer(config);
        let report = optimizer
            .optimize(&mut state, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(report.steps, 0);
        assert_eq!(report.state, SearchState::NoImprovement);
        assert_eq!(report.final_cost, report.initial_cost);
        assert_eq!(state.moved_region_count(), 0);
    }

    #[test]
    fn test_idle_limit_stops_before_step_budget() {
        // 31 regions over 3 servers never split evenly, so the cost stays above 0
        let mut state = cluster(&[0, 0, 31]);
        let config = BalancerConfig {
            max_idle_steps: 200,
            ..Default::default()
        };
        let mut optimizer = skew_optimizer(config);
        let report = optimizer
            .optimize(&mut state, &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert_eq!(report.state, SearchState::Converged);
        assert!(report.steps < report.max_steps);
        assert!(report.final_cost > 0.0);
        assert!(report.improved());
    }

    #[test]
    fn test_idle_limit_without_any_gain() {
        // moving the only region just mirrors the skew
        let mut state = cluster(&[0, 1]);
        let config = BalancerConfig {
            max_idle_steps: 50,
            ..Default::default()
        };
        let mut optimizer = skew_optimizer(config);
        let report = optimizer
            .optimize(&mut state, &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert_eq!(report.steps, 50);
        assert_eq!(report.accepted, 0);
        assert_eq!(report.state, SearchState::NoImprovement);
        assert_eq!(state.moved_region_count(), 0);
    }

    #[test]
    fn test_rejected_steps_keep_costs_in_sync() {
        let rules = RuleTable::parse("rs[0-1] 40\nrs[2-3] 10\n");
        let config = BalancerConfig {
            max_steps: 2_000,
            ..BalancerConfig::heterogeneous_only()
        };
        let mut optimizer = Optimizer::builder()
            .cost_functions(CostFunctions::from_config(&config, &rules))
            .add_generator(Box::new(RandomCandidateGenerator::fair()))
            .with_config(config.clone())
            .build();
        let mut state = cluster(&[5, 5, 20, 20]);
        let report = optimizer
            .optimize(&mut state, &mut StdRng::seed_from_u64(13))
            .unwrap();
        assert!(report.steps > report.accepted);
        let mut check = CostFunctions::from_config(&config, &rules);
        check.init(&state);
        assert_eq!(check.total(), report.final_cost);
    }

    #[test]
    fn test_annealing_never_ends_worse_than_it_started() {
        let rules = RuleTable::parse("rs[0-1] 40\nrs[2-3] 10\n");
        let config = BalancerConfig {
            initial_temperature: 50.0,
            max_steps: 20_000,
            ..BalancerConfig::heterogeneous_only()
        };
        let mut optimizer = Optimizer::builder()
            .cost_functions(CostFunctions::from_config(&config, &rules))
            .add_generator(Box::new(RandomCandidateGenerator::fair()))
            .with_config(config)
            .build();
        let mut state = cluster(&[10, 10, 10, 10]);
        let report = optimizer
            .optimize(&mut state, &mut StdRng::seed_from_u64(11))
            .unwrap();
        assert!(report.final_cost <= report.initial_cost);
        let mut check = CostFunctions::from_config(&BalancerConfig::heterogeneous_only(), &rules);
        check.init(&state);
        assert!((check.total() - report.final_cost).abs() < 1e-9);
    }
}
