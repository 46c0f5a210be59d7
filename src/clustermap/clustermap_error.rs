use thiserror::Error;

/// Topology that was rejected while constructing a [crate::clustermap::data_node::DataNode]
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("data node has no owning datacenter")]
    MissingDatacenter,

    #[error("hostname is empty")]
    EmptyHostname,

    /// RFC 6761 reserves the `invalid` top level domain for names that never resolve
    #[error("hostname {hostname} is under a reserved top level domain")]
    ReservedHostname { hostname: String },

    #[error("hostname {hostname} does not resolve to a network address: {reason}")]
    UnresolvableHostname { hostname: String, reason: String },

    #[error("{which} {port} is out of range [1, 65535]")]
    PortOutOfRange { which: &'static str, port: i64 },

    #[error("mount path {mount_path:?} is not an absolute path")]
    InvalidMountPath { mount_path: String },

    #[error("mount path {mount_path} occurs more than once")]
    DuplicateMountPath { mount_path: String },

    #[error("total capacity of all disks exceeds {} bytes", u64::MAX)]
    CapacityOverflow,
}

#[derive(Debug, Error)]
pub enum ClusterMapError {
    #[error("invalid topology: {0}")]
    Validation(#[from] ValidationError),

    #[error("malformed topology document: {0}")]
    Serialization(#[from] serde_json::Error),
}
