use crate::models::{ClusterState, RegionIndex, ServerIndex};

/// A single perturbation proposed by a candidate generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceAction {
    /// Nothing to try this step
    Null,

    /// Move one region from a server to another
    MoveRegion {
        region: RegionIndex,
        from_server: ServerIndex,
        to_server: ServerIndex,
    },

    /// Exchange two regions hosted on different servers
    SwapRegions {
        from_server: ServerIndex,
        from_region: RegionIndex,
        to_server: ServerIndex,
        to_region: RegionIndex,
    },
}

impl BalanceAction {
    /// Build the action for a pair of picks. A missing pick on one side turns
    /// the swap into a one-sided move towards that side.
    pub fn from_picks(
        this_server: ServerIndex,
        this_region: Option<RegionIndex>,
        other_server: ServerIndex,
        other_region: Option<RegionIndex>,
    ) -> Self {
        match (this_region, other_region) {
            (None, None) => BalanceAction::Null,
            (None, Some(region)) => BalanceAction::MoveRegion {
                region,
                from_server: other_server,
                to_server: this_server,
            },
            (Some(region), None) => BalanceAction::MoveRegion {
                region,
                from_server: this_server,
                to_server: other_server,
            },
            (Some(from_region), Some(to_region)) => BalanceAction::SwapRegions {
                from_server: this_server,
                from_region,
                to_server: other_server,
                to_region,
            },
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, BalanceAction::Null)
    }

    /// The action that restores the state this action was applied to
    pub fn undo(&self) -> Self {
        match *self {
            BalanceAction::Null => BalanceAction::Null,
            BalanceAction::MoveRegion {
                region,
                from_server,
                to_server,
            } => BalanceAction::MoveRegion {
                region,
                from_server: to_server,
                to_server: from_server,
            },
            BalanceAction::SwapRegions {
                from_server,
                from_region,
                to_server,
                to_region,
            } => BalanceAction::SwapRegions {
                from_server,
                from_region: to_region,
                to_server,
                to_region: from_region,
            },
        }
    }

    /// Servers whose load changes when this action is applied
    pub fn touched_servers(&self) -> Vec<ServerIndex> {
        match *self {
            BalanceAction::Null => Vec::new(),
            BalanceAction::MoveRegion {
                from_server,
                to_server,
                ..
            }
            | BalanceAction::SwapRegions {
                from_server,
                to_server,
                ..
            } => vec![from_server, to_server],
        }
    }

    /// Get a human-readable description
    pub fn description(&self, cluster: &ClusterState) -> String {
        match *self {
            BalanceAction::Null => "no-op".to_string(),
            BalanceAction::MoveRegion {
                region,
                from_server,
                to_server,
            } => format!(
                "Move region {} from {} to {}",
                cluster.region(region),
                cluster.server(from_server),
                cluster.server(to_server)
            ),
            BalanceAction::SwapRegions {
                from_server,
                from_region,
                to_server,
                to_region,
            } => format!(
                "Swap region {} on {} with region {} on {}",
                cluster.region(from_region),
                cluster.server(from_server),
                cluster.region(to_region),
                cluster.server(to_server)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_picks() {
        assert_eq!(BalanceAction::from_picks(0, None, 1, None), BalanceAction::Null);
        assert_eq!(
            BalanceAction::from_picks(0, None, 1, Some(7)),
            BalanceAction::MoveRegion {
                region: 7,
                from_server: 1,
                to_server: 0
            }
        );
        assert_eq!(
            BalanceAction::from_picks(0, Some(3), 1, None),
            BalanceAction::MoveRegion {
                region: 3,
                from_server: 0,
                to_server: 1
            }
        );
        assert!(matches!(
            BalanceAction::from_picks(0, Some(3), 1, Some(7)),
            BalanceAction::SwapRegions { .. }
        ));
    }

    #[test]
    fn test_undo_of_undo_is_identity() {
        let swap = BalanceAction::SwapRegions {
            from_server: 0,
            from_region: 4,
            to_server: 2,
            to_region: 9,
        };
        assert_eq!(swap.undo().undo(), swap);
        assert_ne!(swap.undo(), swap);
        assert_eq!(swap.undo().touched_servers(), vec![0, 2]);
    }
}
