// Type aliases used across models
pub type TableName = String;
pub type ServerIndex = usize;
pub type RegionIndex = usize;

// Module declarations
mod server;
mod region;
mod cluster;

// Re-exports
pub use server::ServerName;
pub use region::RegionInfo;
pub use cluster::ClusterState;
