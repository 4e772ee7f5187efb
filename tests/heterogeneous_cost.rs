mod common;

use common::*;
use region_balancer::plan::BalancePlan;
use region_balancer::{Balancer, BalancerConfig, RegionInfo, RuleTable, SearchState, ServerName};
use std::collections::BTreeMap;

const SEARCH_SEED: u64 = 42;

fn heterogeneous_balancer(rules: &[&str]) -> Balancer {
    init_tracing();
    Balancer::new(BalancerConfig::heterogeneous_only().with_seed(SEARCH_SEED))
        .expect("valid config")
        .with_rules(RuleTable::parse(&rules.join("\n")))
}

fn balanced(
    balancer: &mut Balancer,
    initial: &BTreeMap<ServerName, Vec<RegionInfo>>,
) -> BTreeMap<ServerName, Vec<RegionInfo>> {
    let moves = balancer
        .balance_table("ensemble", initial)
        .expect("cluster should need moves");
    let after = BalancePlan::new("ensemble", moves).apply_to(initial);
    assert_conserved(initial, &after);
    after
}

#[test]
fn test_default_rules_fall_back_to_region_count() {
    // { rs0:50 , rs1:250 } with no rules; region count skew does the balancing
    init_tracing();
    let mut config = BalancerConfig::heterogeneous_only().with_seed(SEARCH_SEED);
    config.weights.region_count_skew = 500.0;
    let mut balancer = Balancer::new(config).unwrap();

    let initial = create_server_map(2, 300, 50);
    assert_eq!(loads(&initial), vec![50, 250]);
    let after = balanced(&mut balancer, &initial);
    for load in loads(&after) {
        assert!((149..=151).contains(&load), "load {} not near 150", load);
    }
}

#[test]
fn test_empty_rules_alone_do_nothing() {
    let mut balancer = heterogeneous_balancer(&[]);
    let initial = create_server_map(2, 300, 50);
    assert!(balancer.balance_table("ensemble", &initial).is_none());
}

#[test]
fn test_one_group() {
    // { rs0:30 , rs1:30 , rs2:30 , rs3:210 }, 300 of 400 slots used
    let mut balancer = heterogeneous_balancer(&["rs.* 100"]);
    let initial = create_server_map(4, 300, 30);
    let after = balanced(&mut balancer, &initial);
    assert_eq!(loads(&after), vec![75, 75, 75, 75]);
}

#[test]
fn test_two_groups() {
    // ten servers at 50, 500 of 1250 slots used
    let mut balancer = heterogeneous_balancer(&["rs[0-4] 200", "rs[5-9] 50"]);
    let initial = create_server_map(10, 500, 50);
    let after = balanced(&mut balancer, &initial);
    assert_eq!(loads(&after), vec![80, 80, 80, 80, 80, 20, 20, 20, 20, 20]);
}

#[test]
fn test_four_groups() {
    // rs0 matches no rule and is exempt from the capacity cost
    let mut balancer = heterogeneous_balancer(&["rs[1-3] 200", "rs[4-7] 250", "rs[8-9] 100"]);
    let initial = create_server_map(10, 800, 80);
    let after = balanced(&mut balancer, &initial);
    let after_loads = loads(&after);
    // 800 regions over 1800 declared slots
    for (server, &load) in after_loads.iter().enumerate() {
        let limit: usize = match server {
            1..=3 => 200,
            4..=7 => 250,
            8 | 9 => 100,
            _ => continue,
        };
        let threshold = (limit as f64 * 800.0 / 1800.0).round() as usize;
        assert!(load <= threshold, "rs{} holds {} > {}", server, load, threshold);
        assert!(load <= limit, "rs{} holds {} over its capacity {}", server, load, limit);
    }
}

#[test]
fn test_unmatched_server_absorbs_overflow() {
    // rs1 matches no rule; rs0 alone declares 100 slots for 150 regions
    let mut balancer = heterogeneous_balancer(&["rs0 100"]);
    let initial = mock_cluster(&[150, 0], 1);
    let after = balanced(&mut balancer, &initial);
    let after_loads = loads(&after);
    assert!(after_loads[0] <= 100, "rs0 holds {} over its capacity 100", after_loads[0]);
    assert_eq!(after_loads.iter().sum::<usize>(), 150);
}

#[test]
fn test_empty_unmatched_server_keeps_bounded_servers_within_capacity() {
    // 300 regions over 150 declared slots, rs0 matches nothing and starts empty
    let mut balancer = heterogeneous_balancer(&["rs[1-3] 50"]);
    let initial = mock_cluster(&[0, 100, 100, 100], 2);
    let after = balanced(&mut balancer, &initial);
    let after_loads = loads(&after);
    for (server, &load) in after_loads.iter().enumerate().skip(1) {
        assert!(load <= 50, "rs{} holds {} over its capacity 50", server, load);
    }
    assert!(after_loads[0] >= 150);
}

#[test]
fn test_overloaded_cluster_without_slack() {
    // { rs0:60 , rs1:60 }: nothing to gain from the capacity cost alone
    let mut balancer = heterogeneous_balancer(&[]);
    let initial = create_server_map(2, 120, 60);
    assert!(balancer.balance_table("ensemble", &initial).is_none());

    let mut exact = heterogeneous_balancer(&["rs.* 60"]);
    assert!(exact.balance_table("ensemble", &initial).is_none());
}

#[test]
fn test_capacity_respected_when_feasible() {
    let mut balancer = heterogeneous_balancer(&["rs[0-2] 10", "rs[3-5] 30"]);
    let initial = mock_cluster(&[40, 5, 5, 10, 20, 10], 3);
    let after = balanced(&mut balancer, &initial);
    for (i, load) in loads(&after).into_iter().enumerate() {
        let limit = if i < 3 { 10 } else { 30 };
        assert!(load <= limit, "rs{} holds {} over its capacity {}", i, load, limit);
    }
}

#[test]
fn test_oversubscribed_cluster_shares_the_overage() {
    // 160 regions, 100 slots: both servers end 30 over
    let mut balancer = heterogeneous_balancer(&["rs.* 50"]);
    let initial = mock_cluster(&[150, 10], 1);
    let after = balanced(&mut balancer, &initial);
    assert_eq!(loads(&after), vec![80, 80]);
}

#[test]
fn test_first_matching_rule_decides() {
    let initial = mock_cluster(&[20, 20, 20, 20], 1);

    // the catch-all comes first, so everyone gets 100 and the cluster is even
    let mut broad_first = heterogeneous_balancer(&["rs.* 100", "rs[0-1] 10"]);
    assert!(broad_first.balance_table("ensemble", &initial).is_none());

    // rs0 and rs1 are capped at 10, so their share shrinks
    let mut narrow_first = heterogeneous_balancer(&["rs[0-1] 10", "rs.* 100"]);
    let after = balanced(&mut narrow_first, &initial);
    assert_eq!(loads(&after), vec![4, 4, 36, 36]);
}

#[test]
fn test_balanced_output_is_stable() {
    let mut balancer = heterogeneous_balancer(&["rs[0-4] 200", "rs[5-9] 50"]);
    let initial = create_server_map(10, 500, 50);
    let after = balanced(&mut balancer, &initial);
    assert!(balancer.balance_table("ensemble", &after).is_none());
}

#[test]
fn test_same_seed_same_plan() {
    let initial = create_server_map(10, 500, 50);
    let first = heterogeneous_balancer(&["rs[0-4] 200", "rs[5-9] 50"])
        .balance_table("ensemble", &initial);
    let second = heterogeneous_balancer(&["rs[0-4] 200", "rs[5-9] 50"])
        .balance_table("ensemble", &initial);
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn test_replicas_never_share_a_server() {
    let mut initial = mock_cluster(&[30, 30, 0, 0], 2);
    // give every region on rs0 a replica on rs1 and vice versa
    let servers: Vec<ServerName> = initial.keys().cloned().collect();
    let rs0: Vec<RegionInfo> = initial[&servers[0]].clone();
    let rs1: Vec<RegionInfo> = initial[&servers[1]].clone();
    initial
        .get_mut(&servers[1])
        .unwrap()
        .extend(rs0.iter().map(|r| r.replica(1)));
    initial
        .get_mut(&servers[0])
        .unwrap()
        .extend(rs1.iter().map(|r| r.replica(1)));

    let mut balancer = heterogeneous_balancer(&["rs.* 100"]);
    let after = balanced(&mut balancer, &initial);
    assert_eq!(loads(&after).iter().sum::<usize>(), 120);
    assert!(loads(&after).iter().all(|&load| load <= 30));
}

#[test]
fn test_single_server_has_no_plan() {
    let mut balancer = heterogeneous_balancer(&["rs.* 1"]);
    let initial = mock_cluster(&[50], 1);
    let outcome = balancer.run("ensemble", &initial).unwrap();
    assert!(outcome.plan.is_none());
    assert_eq!(outcome.report.state, SearchState::NoImprovement);
    assert_eq!(outcome.report.steps, 0);
}

#[test]
fn test_invalid_assignment_has_no_plan() {
    let mut balancer = heterogeneous_balancer(&["rs.* 1"]);
    let mut initial = mock_cluster(&[2, 0], 1);
    let duplicate = initial.values().next().unwrap()[0].clone();
    let last = initial.keys().last().unwrap().clone();
    initial.get_mut(&last).unwrap().push(duplicate);
    assert!(balancer.balance_table("ensemble", &initial).is_none());
    assert!(balancer.run("ensemble", &initial).is_err());
}
