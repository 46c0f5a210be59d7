use crate::clustermap::canonical_form::{DataNodeDocument, DiskDocument};
use crate::clustermap::hardware_state::HardwareState;

pub const TEST_HOSTNAME: &str = "localhost";

/// convenience method for test code: `count` disks with identical capacity and state, mounted
///  at `mount_path_prefix` followed by the disk's index
pub fn test_disk_documents(count: usize, mount_path_prefix: &str, hardware_state: HardwareState, capacity_in_bytes: u64) -> Vec<DiskDocument> {
    (0..count)
        .map(|i| DiskDocument {
            mount_path: format!("{}{}", mount_path_prefix, i),
            capacity_in_bytes,
            hardware_state,
        })
        .collect()
}

pub fn test_data_node_document(hostname: &str, port: i64, ssl_port: i64, hardware_state: HardwareState, disks: Vec<DiskDocument>) -> DataNodeDocument {
    DataNodeDocument {
        hostname: hostname.to_string(),
        port,
        ssl_port,
        hardware_state,
        disks,
    }
}
