use std::collections::{BTreeMap, HashMap, HashSet};
use super::{RegionIndex, RegionInfo, ServerIndex, ServerName, TableName};
use crate::actions::BalanceAction;
use crate::BalancerError;

/// Indexed, mutable view of which server hosts which region.
///
/// Servers are kept in `ServerName` order and regions in server order then
/// input order, so two states built from the same snapshot index everything
/// identically. Every mutation goes through [`ClusterState::apply`], which
/// validates the action first and leaves the state untouched on error.
#[derive(Debug, Clone)]
pub struct ClusterState {
    servers: Vec<ServerName>,
    regions: Vec<RegionInfo>,
    tables: Vec<TableName>,

    region_table: Vec<usize>,
    region_partition: Vec<usize>,
    initial_region_server: Vec<ServerIndex>,
    region_server: Vec<ServerIndex>,

    regions_per_server: Vec<Vec<RegionIndex>>,
    regions_per_server_per_table: Vec<Vec<usize>>,
    regions_per_table: Vec<usize>,
    primaries_per_server: Vec<usize>,
    partitions_per_server: Vec<HashSet<usize>>,
    moved_regions: usize,
}

impl ClusterState {
    /// Index a snapshot of server → hosted regions
    pub fn new(snapshot: &BTreeMap<ServerName, Vec<RegionInfo>>) -> Result<Self, BalancerError> {
        let servers: Vec<ServerName> = snapshot.keys().cloned().collect();

        let mut regions = Vec::new();
        let mut region_server = Vec::new();
        let mut seen: HashSet<&RegionInfo> = HashSet::new();
        for (server_idx, hosted) in snapshot.values().enumerate() {
            for region in hosted {
                if !seen.insert(region) {
                    return Err(BalancerError::InvalidClusterState(format!(
                        "region {} is assigned more than once",
                        region
                    )));
                }
                regions.push(region.clone());
                region_server.push(server_idx);
            }
        }

        let mut table_ids: HashMap<&str, usize> = HashMap::new();
        let mut tables = Vec::new();
        let mut partition_ids: HashMap<(&str, &str), usize> = HashMap::new();
        let mut region_table = Vec::with_capacity(regions.len());
        let mut region_partition = Vec::with_capacity(regions.len());
        for region in &regions {
            let next_table = table_ids.len();
            let table = *table_ids.entry(region.table.as_str()).or_insert_with(|| {
                tables.push(region.table.clone());
                next_table
            });
            region_table.push(table);

            let next_partition = partition_ids.len();
            let partition = *partition_ids
                .entry((region.table.as_str(), region.encoded_name.as_str()))
                .or_insert(next_partition);
            region_partition.push(partition);
        }

        let mut cluster = Self {
            servers,
            regions,
            tables,
            region_table,
            region_partition,
            initial_region_server: region_server.clone(),
            region_server,
            regions_per_server: Vec::new(),
            regions_per_server_per_table: Vec::new(),
            regions_per_table: Vec::new(),
            primaries_per_server: Vec::new(),
            partitions_per_server: Vec::new(),
            moved_regions: 0,
        };
        cluster.rebuild_indices()?;
        Ok(cluster)
    }

    fn rebuild_indices(&mut self) -> Result<(), BalancerError> {
        let num_servers = self.servers.len();
        let num_tables = self.tables.len();

        self.regions_per_server = vec![Vec::new(); num_servers];
        self.regions_per_server_per_table = vec![vec![0; num_tables]; num_servers];
        self.regions_per_table = vec![0; num_tables];
        self.primaries_per_server = vec![0; num_servers];
        self.partitions_per_server = vec![HashSet::new(); num_servers];
        self.moved_regions = 0;

        for region in 0..self.regions.len() {
            let server = self.region_server[region];
            if !self.partitions_per_server[server].insert(self.region_partition[region]) {
                return Err(BalancerError::InvariantViolation(format!(
                    "server {} hosts more than one copy of region {}",
                    self.servers[server], self.regions[region]
                )));
            }
            self.regions_per_server[server].push(region);
            self.regions_per_server_per_table[server][self.region_table[region]] += 1;
            self.regions_per_table[self.region_table[region]] += 1;
            if self.regions[region].is_primary() {
                self.primaries_per_server[server] += 1;
            }
            if server != self.initial_region_server[region] {
                self.moved_regions += 1;
            }
        }
        Ok(())
    }

    pub fn num_servers(&self) -> usize {
        self.servers.len()
    }

    pub fn num_regions(&self) -> usize {
        self.regions.len()
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn servers(&self) -> &[ServerName] {
        &self.servers
    }

    pub fn server(&self, idx: ServerIndex) -> &ServerName {
        &self.servers[idx]
    }

    pub fn region(&self, idx: RegionIndex) -> &RegionInfo {
        &self.regions[idx]
    }

    pub fn table(&self, idx: usize) -> &TableName {
        &self.tables[idx]
    }

    /// Number of regions (replicas included) hosted on a server
    pub fn region_count(&self, server: ServerIndex) -> usize {
        self.regions_per_server[server].len()
    }

    pub fn regions_on(&self, server: ServerIndex) -> &[RegionIndex] {
        &self.regions_per_server[server]
    }

    pub fn server_of(&self, region: RegionIndex) -> ServerIndex {
        self.region_server[region]
    }

    pub fn initial_server_of(&self, region: RegionIndex) -> ServerIndex {
        self.initial_region_server[region]
    }

    pub fn table_of(&self, region: RegionIndex) -> usize {
        self.region_table[region]
    }

    pub fn table_region_count(&self, server: ServerIndex, table: usize) -> usize {
        self.regions_per_server_per_table[server][table]
    }

    pub fn table_region_total(&self, table: usize) -> usize {
        self.regions_per_table[table]
    }

    pub fn primary_count(&self, server: ServerIndex) -> usize {
        self.primaries_per_server[server]
    }

    /// Regions currently away from the server they started on
    pub fn moved_region_count(&self) -> usize {
        self.moved_regions
    }

    /// Current server of every region, by region index
    pub fn assignment(&self) -> &[ServerIndex] {
        &self.region_server
    }

    /// True if the server already hosts a copy of the region's partition
    pub fn hosts_partition_of(&self, server: ServerIndex, region: RegionIndex) -> bool {
        self.partitions_per_server[server].contains(&self.region_partition[region])
    }

    /// Check an action against the current state without applying it
    pub fn validate(&self, action: &BalanceAction) -> Result<(), BalancerError> {
        match *action {
            BalanceAction::Null => Ok(()),
            BalanceAction::MoveRegion {
                region,
                from_server,
                to_server,
            } => {
                self.check_placement(region, from_server)?;
                self.check_server(to_server)?;
                if from_server == to_server {
                    return Err(BalancerError::InvariantViolation(format!(
                        "move of {} has identical source and destination",
                        self.regions[region]
                    )));
                }
                if self.hosts_partition_of(to_server, region) {
                    return Err(self.colocation_error(region, to_server));
                }
                Ok(())
            }
            BalanceAction::SwapRegions {
                from_server,
                from_region,
                to_server,
                to_region,
            } => {
                self.check_placement(from_region, from_server)?;
                self.check_placement(to_region, to_server)?;
                if from_server == to_server {
                    return Err(BalancerError::InvariantViolation(format!(
                        "swap of {} and {} within one server",
                        self.regions[from_region], self.regions[to_region]
                    )));
                }
                let same_partition =
                    self.region_partition[from_region] == self.region_partition[to_region];
                if !same_partition && self.hosts_partition_of(to_server, from_region) {
                    return Err(self.colocation_error(from_region, to_server));
                }
                if !same_partition && self.hosts_partition_of(from_server, to_region) {
                    return Err(self.colocation_error(to_region, from_server));
                }
                Ok(())
            }
        }
    }

    /// Apply an action. On error nothing is changed.
    pub fn apply(&mut self, action: &BalanceAction) -> Result<(), BalancerError> {
        self.validate(action)?;
        match *action {
            BalanceAction::Null => {}
            BalanceAction::MoveRegion {
                region,
                from_server,
                to_server,
            } => {
                self.remove_region(from_server, region);
                self.add_region(to_server, region);
            }
            BalanceAction::SwapRegions {
                from_server,
                from_region,
                to_server,
                to_region,
            } => {
                self.remove_region(from_server, from_region);
                self.remove_region(to_server, to_region);
                self.add_region(to_server, from_region);
                self.add_region(from_server, to_region);
            }
        }
        Ok(())
    }

    /// Reset every region to the given server assignment
    pub fn restore(&mut self, assignment: &[ServerIndex]) -> Result<(), BalancerError> {
        if assignment.len() != self.regions.len()
            || assignment.iter().any(|&s| s >= self.servers.len())
        {
            return Err(BalancerError::InvalidClusterState(
                "assignment does not match the cluster layout".to_string(),
            ));
        }
        let previous = std::mem::replace(&mut self.region_server, assignment.to_vec());
        if let Err(e) = self.rebuild_indices() {
            self.region_server = previous;
            self.rebuild_indices()?;
            return Err(e);
        }
        Ok(())
    }

    /// Materialize the current assignment as server → regions
    pub fn to_server_map(&self) -> BTreeMap<ServerName, Vec<RegionInfo>> {
        self.servers
            .iter()
            .enumerate()
            .map(|(idx, server)| {
                let hosted = self.regions_per_server[idx]
                    .iter()
                    .map(|&r| self.regions[r].clone())
                    .collect();
                (server.clone(), hosted)
            })
            .collect()
    }

    fn check_server(&self, server: ServerIndex) -> Result<(), BalancerError> {
        if server >= self.servers.len() {
            return Err(BalancerError::InvariantViolation(format!(
                "server index {} out of range",
                server
            )));
        }
        Ok(())
    }

    fn check_placement(&self, region: RegionIndex, server: ServerIndex) -> Result<(), BalancerError> {
        self.check_server(server)?;
        if region >= self.regions.len() || self.region_server[region] != server {
            return Err(BalancerError::InvariantViolation(format!(
                "region index {} is not hosted on {}",
                region, self.servers[server]
            )));
        }
        Ok(())
    }

    fn colocation_error(&self, region: RegionIndex, server: ServerIndex) -> BalancerError {
        BalancerError::InvariantViolation(format!(
            "{} already hosts a copy of region {}",
            self.servers[server], self.regions[region]
        ))
    }

    fn remove_region(&mut self, server: ServerIndex, region: RegionIndex) {
        let hosted = &mut self.regions_per_server[server];
        if let Some(pos) = hosted.iter().position(|&r| r == region) {
            hosted.swap_remove(pos);
        }
        self.regions_per_server_per_table[server][self.region_table[region]] -= 1;
        if self.regions[region].is_primary() {
            self.primaries_per_server[server] -= 1;
        }
        self.partitions_per_server[server].remove(&self.region_partition[region]);
        if server == self.initial_region_server[region] {
            self.moved_regions += 1;
        }
    }

    fn add_region(&mut self, server: ServerIndex, region: RegionIndex) {
        self.regions_per_server[server].push(region);
        self.regions_per_server_per_table[server][self.region_table[region]] += 1;
        if self.regions[region].is_primary() {
            self.primaries_per_server[server] += 1;
        }
        self.partitions_per_server[server].insert(self.region_partition[region]);
        if server == self.initial_region_server[region] {
            self.moved_regions -= 1;
        }
        self.region_server[region] = server;
    }
}
