use serde::{Deserialize, Serialize};
use super::TableName;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionInfo {
    pub table: TableName,
    pub encoded_name: String,
    /// 0 for the primary, >0 for read replicas
    pub replica_id: u32,
}

impl RegionInfo {
    pub fn new(table: impl Into<TableName>, encoded_name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            encoded_name: encoded_name.into(),
            replica_id: 0,
        }
    }

    /// Copy of this region with the given replica id
    pub fn replica(&self, replica_id: u32) -> Self {
        Self {
            replica_id,
            ..self.clone()
        }
    }

    pub fn is_primary(&self) -> bool {
        self.replica_id == 0
    }

    /// True when both regions are copies of the same partition
    pub fn same_partition(&self, other: &RegionInfo) -> bool {
        self.table == other.table && self.encoded_name == other.encoded_name
    }
}

impl std::fmt::Display for RegionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.replica_id == 0 {
            write!(f, "{}/{}", self.table, self.encoded_name)
        } else {
            write!(f, "{}/{}_{}", self.table, self.encoded_name, self.replica_id)
        }
    }
}
