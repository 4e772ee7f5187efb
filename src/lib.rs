// Region Balancer Library
// Places regions on servers with heterogeneous, rule-declared capacities

pub mod actions;
pub mod config;
pub mod costs;
pub mod generators;
pub mod models;
pub mod optimizer;
pub mod plan;
pub mod rules;

pub use actions::BalanceAction;
pub use config::{BalancerConfig, CostWeights};
pub use costs::{CostFunction, CostFunctions, CostReport};
pub use generators::{CandidateGenerator, RandomCandidateGenerator, RegionPicker};
pub use models::{ClusterState, RegionInfo, ServerName, TableName};
pub use optimizer::{OptimizationReport, Optimizer, SearchState};
pub use plan::{BalancePlan, RegionPlan};
pub use rules::{Capacity, RuleTable, RulesFile};

use generators::LoadCandidateGenerator;
use plan::ClusterStats;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Result of one balancing run
#[derive(Debug, Clone)]
pub struct BalanceOutcome {
    /// Absent when no relocation is worth performing
    pub plan: Option<BalancePlan>,
    pub report: OptimizationReport,
}

/// Main entry point for computing balance plans
pub struct Balancer {
    config: BalancerConfig,
    rules_file: Option<RulesFile>,
    rules: RuleTable,
    optimizer: Optimizer,
}

impl Balancer {
    pub fn new(config: BalancerConfig) -> Result<Self, BalancerError> {
        config.validate()?;
        let mut rules_file = config.rules_file.clone().map(RulesFile::new);
        let rules = match rules_file.as_mut() {
            Some(file) => {
                file.refresh();
                file.table().clone()
            }
            None => RuleTable::default(),
        };
        let optimizer = Optimizer::builder()
            .cost_functions(CostFunctions::from_config(&config, &rules))
            .add_generator(Box::new(RandomCandidateGenerator::new()))
            .add_generator(Box::new(LoadCandidateGenerator::new()))
            .with_config(config.clone())
            .build();
        Ok(Self {
            config,
            rules_file,
            rules,
            optimizer,
        })
    }

    /// Use an in-memory rule table. Ignored once a rules file is configured.
    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        if self.rules_file.is_none() {
            self.rules = rules;
            self.optimizer
                .set_cost_functions(CostFunctions::from_config(&self.config, &self.rules));
        }
        self
    }

    /// Replace the default candidate generators
    pub fn with_generators(mut self, generators: Vec<Box<dyn CandidateGenerator>>) -> Self {
        self.optimizer.set_generators(generators);
        self
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Compute the moves that rebalance the given assignment.
    ///
    /// Returns `None` both when the cluster needs nothing and when the search
    /// found nothing that helps. Invalid input is logged and yields `None`.
    pub fn balance_table(
        &mut self,
        table: &str,
        assignment: &BTreeMap<ServerName, Vec<RegionInfo>>,
    ) -> Option<Vec<RegionPlan>> {
        match self.run(table, assignment) {
            Ok(outcome) => outcome.plan.map(|plan| plan.moves),
            Err(e) => {
                warn!(table, error = %e, "cannot balance table");
                None
            }
        }
    }

    /// Like [`Balancer::balance_table`], also returning the search report
    pub fn run(
        &mut self,
        table: &str,
        assignment: &BTreeMap<ServerName, Vec<RegionInfo>>,
    ) -> Result<BalanceOutcome, BalancerError> {
        self.refresh_rules();

        let mut cluster = ClusterState::new(assignment)?;
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(
            table,
            servers = cluster.num_servers(),
            regions = cluster.num_regions(),
            rules = self.rules.len(),
            "balancing table"
        );

        let report = self.optimizer.optimize(&mut cluster, &mut rng)?;
        let plan = match report.state {
            SearchState::NoImprovement => None,
            _ => plan::build_plan(&cluster).map(|moves| {
                let mut plan = BalancePlan::new(table, moves);
                plan.metadata.cluster_stats = Some(ClusterStats::of(&cluster));
                plan.metadata.report = Some(report.clone());
                plan
            }),
        };
        if let Some(plan) = &plan {
            info!(table, summary = %plan.summary(), "balance plan computed");
        }
        Ok(BalanceOutcome { plan, report })
    }

    fn refresh_rules(&mut self) {
        let Some(file) = self.rules_file.as_mut() else {
            return;
        };
        if file.refresh() {
            self.rules = file.table().clone();
            self.optimizer
                .set_cost_functions(CostFunctions::from_config(&self.config, &self.rules));
            info!(path = %file.path().display(), rules = self.rules.len(), "capacity rules reloaded");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BalancerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid cluster state: {0}")]
    InvalidClusterState(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
