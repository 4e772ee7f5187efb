use crate::models::{ClusterState, RegionInfo, ServerName, TableName};
use crate::optimizer::OptimizationReport;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Net relocation of one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionPlan {
    pub region: RegionInfo,
    pub source: ServerName,
    pub destination: ServerName,
}

impl RegionPlan {
    pub fn description(&self) -> String {
        format!(
            "Move region {} from {} to {}",
            self.region, self.source, self.destination
        )
    }
}

/// One entry per region whose final server differs from its initial server,
/// in region order. `None` when nothing moved on net.
pub fn build_plan(cluster: &ClusterState) -> Option<Vec<RegionPlan>> {
    let moves: Vec<RegionPlan> = (0..cluster.num_regions())
        .filter(|&r| cluster.server_of(r) != cluster.initial_server_of(r))
        .map(|r| RegionPlan {
            region: cluster.region(r).clone(),
            source: cluster.server(cluster.initial_server_of(r)).clone(),
            destination: cluster.server(cluster.server_of(r)).clone(),
        })
        .collect();

    if moves.is_empty() {
        None
    } else {
        Some(moves)
    }
}

/// A complete balancing plan for one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancePlan {
    pub table: TableName,
    pub moves: Vec<RegionPlan>,
    pub metadata: PlanMetadata,
}

impl BalancePlan {
    pub fn new(table: impl Into<TableName>, moves: Vec<RegionPlan>) -> Self {
        Self {
            table: table.into(),
            moves,
            metadata: PlanMetadata::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// The assignment that results from executing every move
    pub fn apply_to(
        &self,
        assignment: &BTreeMap<ServerName, Vec<RegionInfo>>,
    ) -> BTreeMap<ServerName, Vec<RegionInfo>> {
        let mut result = assignment.clone();
        for plan in &self.moves {
            if let Some(hosted) = result.get_mut(&plan.source) {
                hosted.retain(|r| r != &plan.region);
            }
            result
                .entry(plan.destination.clone())
                .or_default()
                .push(plan.region.clone());
        }
        result
    }

    /// Get summary statistics
    pub fn summary(&self) -> PlanSummary {
        let sources: BTreeSet<&ServerName> = self.moves.iter().map(|m| &m.source).collect();
        let destinations: BTreeSet<&ServerName> =
            self.moves.iter().map(|m| &m.destination).collect();
        PlanSummary {
            total_moves: self.moves.len(),
            primary_moves: self.moves.iter().filter(|m| m.region.is_primary()).count(),
            source_servers: sources.len(),
            destination_servers: destinations.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanMetadata {
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub cluster_stats: Option<ClusterStats>,
    pub report: Option<OptimizationReport>,
}

impl Default for PlanMetadata {
    fn default() -> Self {
        Self {
            created_at: chrono::Utc::now(),
            cluster_stats: None,
            report: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStats {
    pub server_count: usize,
    pub table_count: usize,
    pub region_count: usize,
}

impl ClusterStats {
    pub fn of(cluster: &ClusterState) -> Self {
        Self {
            server_count: cluster.num_servers(),
            table_count: cluster.num_tables(),
            region_count: cluster.num_regions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_moves: usize,
    pub primary_moves: usize,
    pub source_servers: usize,
    pub destination_servers: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Total Moves: {}, Primaries: {}, Replicas: {}, From {} servers to {} servers",
            self.total_moves,
            self.primary_moves,
            self.total_moves - self.primary_moves,
            self.source_servers,
            self.destination_servers
        )
    }
}
