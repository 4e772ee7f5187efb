//! Shared helpers for integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use region_balancer::{RegionInfo, ServerName};
use std::collections::{BTreeMap, HashSet};

/// Seed of the synthetic cluster generator, independent of the search seed.
pub const DATA_SEED: u64 = 0x5eed;

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A cluster of `num_nodes` servers named rs0.., each holding
/// `regions_per_server` regions except the last one, which holds the rest.
pub fn create_server_map(
    num_nodes: usize,
    num_regions: usize,
    regions_per_server: usize,
) -> BTreeMap<ServerName, Vec<RegionInfo>> {
    let mut loads = vec![regions_per_server; num_nodes];
    loads[num_nodes - 1] = num_regions - (num_nodes - 1) * regions_per_server;
    mock_cluster(&loads, 1)
}

/// One server per entry of `loads`, holding that many regions spread over
/// `num_tables` tables.
pub fn mock_cluster(loads: &[usize], num_tables: usize) -> BTreeMap<ServerName, Vec<RegionInfo>> {
    let mut rng = StdRng::seed_from_u64(DATA_SEED);
    let mut servers = BTreeMap::new();
    let mut next = 0usize;
    for (i, &load) in loads.iter().enumerate() {
        let server = ServerName::new(format!("rs{}", i), rng.gen_range(1024..60000), rng.gen());
        let regions = (0..load)
            .map(|_| {
                next += 1;
                let table = format!("table{}", rng.gen_range(0..num_tables.max(1)));
                RegionInfo::new(table, format!("{:08x}", next))
            })
            .collect();
        servers.insert(server, regions);
    }
    servers
}

/// Region counts in server order
pub fn loads(assignment: &BTreeMap<ServerName, Vec<RegionInfo>>) -> Vec<usize> {
    assignment.values().map(|regions| regions.len()).collect()
}

pub fn rules_file(dir: &tempfile::TempDir, rules: &[&str]) -> std::path::PathBuf {
    let path = dir.path().join("hbase-balancer.rules");
    std::fs::write(&path, rules.join("\n")).expect("write rules file");
    path
}

/// Every region appears exactly once, and no server hosts two copies of a partition
pub fn assert_conserved(
    before: &BTreeMap<ServerName, Vec<RegionInfo>>,
    after: &BTreeMap<ServerName, Vec<RegionInfo>>,
) {
    let mut expected: Vec<&RegionInfo> = before.values().flatten().collect();
    let mut actual: Vec<&RegionInfo> = after.values().flatten().collect();
    expected.sort();
    actual.sort();
    assert_eq!(expected, actual, "regions were created or lost");

    for (server, regions) in after {
        let partitions: HashSet<(&str, &str)> = regions
            .iter()
            .map(|r| (r.table.as_str(), r.encoded_name.as_str()))
            .collect();
        assert_eq!(
            partitions.len(),
            regions.len(),
            "{} hosts two copies of one partition",
            server
        );
    }
}
