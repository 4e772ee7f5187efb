use region_balancer::models::{RegionInfo, ServerName};
use region_balancer::*;
use std::collections::BTreeMap;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("Heterogeneous Region Balancer - Example Usage\n");

    let cluster = create_sample_cluster();

    // Two hardware generations: big boxes take 200 regions, small ones 50
    let rules = RuleTable::parse("rs[0-4] 200\nrs[5-9] 50\n");
    println!("=== Capacity Rules ===");
    for server in cluster.keys() {
        match rules.capacity_for(server.short_name()) {
            Capacity::Limited(n) => println!("  {}: {} regions", server.short_name(), n),
            Capacity::Unbounded => println!("  {}: unbounded", server.short_name()),
        }
    }

    let config = BalancerConfig::default().with_seed(7);
    let mut balancer = match Balancer::new(config) {
        Ok(balancer) => balancer.with_rules(rules),
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };

    println!("\n=== Generating Balance Plan ===");
    match balancer.run("usertable", &cluster) {
        Ok(outcome) => {
            println!("{}\n", outcome.report.summary());
            for cost in &outcome.report.final_costs {
                println!("  {}", cost.summary());
            }

            let Some(plan) = outcome.plan else {
                println!("No rebalancing needed - cluster is already balanced!");
                return;
            };
            println!("\n{}", plan.summary());

            println!("\n=== Proposed Moves (showing first 20) ===");
            for (i, region_plan) in plan.moves.iter().take(20).enumerate() {
                println!("{}. {}", i + 1, region_plan.description());
            }
            if plan.len() > 20 {
                println!("... and {} more moves", plan.len() - 20);
            }

            println!("\n=== Simulated Final State (after applying plan) ===");
            print_distribution(&plan.apply_to(&cluster));
        }
        Err(e) => {
            eprintln!("Failed to generate plan: {}", e);
        }
    }
}

fn create_sample_cluster() -> BTreeMap<ServerName, Vec<RegionInfo>> {
    // Every server starts with 50 regions, ignoring how much it can hold
    let mut cluster = BTreeMap::new();
    let mut next = 0;
    for i in 0..10u64 {
        let server = ServerName::new(format!("rs{}.example.com", i), 16020, 1_700_000_000 + i);
        let regions = (0..50)
            .map(|_| {
                next += 1;
                let table = if next % 3 == 0 { "usertable" } else { "events" };
                RegionInfo::new(table, format!("{:032x}", next))
            })
            .collect();
        cluster.insert(server, regions);
    }

    println!("=== Initial Cluster State ===");
    print_distribution(&cluster);
    cluster
}

fn print_distribution(cluster: &BTreeMap<ServerName, Vec<RegionInfo>>) {
    let total: usize = cluster.values().map(Vec::len).sum();
    let avg = total as f64 / cluster.len() as f64;
    println!("\nRegion distribution:");
    for (server, regions) in cluster {
        println!(
            "  {}: {} regions ({:+.1} from average of {:.1})",
            server.short_name(),
            regions.len(),
            regions.len() as f64 - avg,
            avg
        );
    }
    println!();
}
