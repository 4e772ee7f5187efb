//! Candidate generators propose one `BalanceAction` per optimizer step.
//!
//! Server selection lives in the generator, the choice of region on each
//! selected server is delegated to a [`RegionPicker`], so a new pick policy
//! plugs in without touching the server-selection logic.

use crate::actions::BalanceAction;
use crate::models::{ClusterState, RegionIndex, ServerIndex};
use rand::{Rng, RngCore};

/// Chooses which region, if any, to take from a server
pub trait RegionPicker: Send + Sync {
    /// `None` means nothing is taken from this server and the action becomes
    /// a one-sided move onto it.
    fn pick_region(
        &self,
        cluster: &ClusterState,
        server: ServerIndex,
        rng: &mut dyn RngCore,
    ) -> Option<RegionIndex>;
}

/// Uniform choice among all hosted regions
#[derive(Debug, Clone, Copy)]
pub struct UniformRegionPicker {
    pub no_swap_chance: f64,
}

impl UniformRegionPicker {
    pub fn new(no_swap_chance: f64) -> Self {
        Self { no_swap_chance }
    }
}

impl RegionPicker for UniformRegionPicker {
    fn pick_region(
        &self,
        cluster: &ClusterState,
        server: ServerIndex,
        rng: &mut dyn RngCore,
    ) -> Option<RegionIndex> {
        if rng.gen::<f64>() < self.no_swap_chance {
            return None;
        }
        let hosted = cluster.regions_on(server);
        if hosted.is_empty() {
            return None;
        }
        Some(hosted[rng.gen_range(0..hosted.len())])
    }
}

/// Leans towards moving read replicas rather than primaries
#[derive(Debug, Clone, Copy)]
pub struct FairRegionPicker {
    pub no_swap_chance: f64,
    /// Probability of restricting the choice to non-primary replicas when
    /// the server hosts any
    pub replica_bias: f64,
}

impl Default for FairRegionPicker {
    fn default() -> Self {
        Self {
            no_swap_chance: 0.5,
            replica_bias: 0.5,
        }
    }
}

impl RegionPicker for FairRegionPicker {
    fn pick_region(
        &self,
        cluster: &ClusterState,
        server: ServerIndex,
        rng: &mut dyn RngCore,
    ) -> Option<RegionIndex> {
        if rng.gen::<f64>() < self.no_swap_chance {
            return None;
        }
        let hosted = cluster.regions_on(server);
        if hosted.is_empty() {
            return None;
        }
        let replicas: Vec<RegionIndex> = hosted
            .iter()
            .copied()
            .filter(|&r| !cluster.region(r).is_primary())
            .collect();
        if !replicas.is_empty() && rng.gen::<f64>() < self.replica_bias {
            return Some(replicas[rng.gen_range(0..replicas.len())]);
        }
        Some(hosted[rng.gen_range(0..hosted.len())])
    }
}

/// Core trait for move proposal strategies
pub trait CandidateGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Propose an action valid for the current state, or `Null`
    fn generate(&self, cluster: &ClusterState, rng: &mut dyn RngCore) -> BalanceAction;
}

/// Build the action for two servers and drop it if it would co-locate replicas
fn pick_action(
    cluster: &ClusterState,
    this_server: ServerIndex,
    this_picker: &dyn RegionPicker,
    other_server: ServerIndex,
    other_picker: &dyn RegionPicker,
    rng: &mut dyn RngCore,
) -> BalanceAction {
    let this_region = this_picker.pick_region(cluster, this_server, rng);
    let other_region = other_picker.pick_region(cluster, other_server, rng);
    let action = BalanceAction::from_picks(this_server, this_region, other_server, other_region);
    if cluster.validate(&action).is_err() {
        return BalanceAction::Null;
    }
    action
}

/// Two distinct servers chosen uniformly at random
pub struct RandomCandidateGenerator<P: RegionPicker = UniformRegionPicker> {
    this_side: P,
    other_side: P,
}

impl RandomCandidateGenerator<UniformRegionPicker> {
    /// Always takes a region from the first server, swaps half of the time
    pub fn new() -> Self {
        Self::with_pickers(UniformRegionPicker::new(0.0), UniformRegionPicker::new(0.5))
    }
}

impl Default for RandomCandidateGenerator<UniformRegionPicker> {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomCandidateGenerator<FairRegionPicker> {
    /// Either side may be left empty, and replicas are preferred over primaries
    pub fn fair() -> Self {
        Self::with_pickers(FairRegionPicker::default(), FairRegionPicker::default())
    }
}

impl<P: RegionPicker> RandomCandidateGenerator<P> {
    pub fn with_pickers(this_side: P, other_side: P) -> Self {
        Self {
            this_side,
            other_side,
        }
    }
}

impl<P: RegionPicker> CandidateGenerator for RandomCandidateGenerator<P> {
    fn name(&self) -> &str {
        "RandomCandidateGenerator"
    }

    fn generate(&self, cluster: &ClusterState, rng: &mut dyn RngCore) -> BalanceAction {
        let num_servers = cluster.num_servers();
        if num_servers < 2 {
            return BalanceAction::Null;
        }
        let this_server = rng.gen_range(0..num_servers);
        let mut other_server = rng.gen_range(0..num_servers - 1);
        if other_server >= this_server {
            other_server += 1;
        }
        pick_action(
            cluster,
            this_server,
            &self.this_side,
            other_server,
            &self.other_side,
            rng,
        )
    }
}

/// Moves work from the most loaded server to the least loaded one
pub struct LoadCandidateGenerator<P: RegionPicker = UniformRegionPicker> {
    most_loaded_side: P,
    least_loaded_side: P,
}

impl LoadCandidateGenerator<UniformRegionPicker> {
    pub fn new() -> Self {
        Self::with_pickers(UniformRegionPicker::new(0.0), UniformRegionPicker::new(0.5))
    }
}

impl Default for LoadCandidateGenerator<UniformRegionPicker> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: RegionPicker> LoadCandidateGenerator<P> {
    pub fn with_pickers(most_loaded_side: P, least_loaded_side: P) -> Self {
        Self {
            most_loaded_side,
            least_loaded_side,
        }
    }

    /// Most and least loaded servers, ties going to the lowest index
    fn extremes(cluster: &ClusterState) -> Option<(ServerIndex, ServerIndex)> {
        let mut most: Option<(ServerIndex, usize)> = None;
        let mut least: Option<(ServerIndex, usize)> = None;
        for server in 0..cluster.num_servers() {
            let load = cluster.region_count(server);
            if most.map_or(true, |(_, m)| load > m) {
                most = Some((server, load));
            }
            if least.map_or(true, |(_, l)| load < l) {
                least = Some((server, load));
            }
        }
        match (most, least) {
            (Some((m, _)), Some((l, _))) if m != l => Some((m, l)),
            _ => None,
        }
    }
}

impl<P: RegionPicker> CandidateGenerator for LoadCandidateGenerator<P> {
    fn name(&self) -> &str {
        "LoadCandidateGenerator"
    }

    fn generate(&self, cluster: &ClusterState, rng: &mut dyn RngCore) -> BalanceAction {
        let Some((most, least)) = Self::extremes(cluster) else {
            return BalanceAction::Null;
        };
        pick_action(
            cluster,
            most,
            &self.most_loaded_side,
            least,
            &self.least_loaded_side,
            rng,
        )
    }
}
