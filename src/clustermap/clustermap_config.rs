use std::time::Duration;
use crate::clustermap::topology_validator::OwnerValidation;

#[derive(Debug, Clone)]
pub struct ClusterMapConfig {
    /// number of consecutive timeouts after which a data node is considered unavailable
    pub datanode_error_threshold: u32,
    /// time after the most recent timeout during which a tripped data node stays unavailable
    ///  before it is optimistically reported as available again
    pub datanode_retry_backoff: Duration,

    pub disk_error_threshold: u32,
    pub disk_retry_backoff: Duration,

    /// `Skip` is for bootstrapping and tests where data nodes exist outside of any datacenter
    pub owner_validation: OwnerValidation,

    pub health_event_capacity: usize,
}

impl ClusterMapConfig {
    pub fn new() -> ClusterMapConfig {
        ClusterMapConfig {
            datanode_error_threshold: 3,
            datanode_retry_backoff: Duration::from_secs(5 * 60),
            disk_error_threshold: 1,
            disk_retry_backoff: Duration::from_secs(5 * 60),
            owner_validation: OwnerValidation::Required,
            health_event_capacity: 128,
        }
    }
}

impl Default for ClusterMapConfig {
    fn default() -> Self {
        ClusterMapConfig::new()
    }
}
