use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use tracing::info;

use crate::clustermap::canonical_form::DiskDocument;
use crate::clustermap::clustermap_config::ClusterMapConfig;
use crate::clustermap::data_node::DataNode;
use crate::clustermap::hardware_state::HardwareState;
use crate::clustermap::health_events::{HealthEvent, HealthEventNotifier, HealthResource, StateChangedData};
use crate::clustermap::soft_state::{SoftStateDetector, StateChange};

/// A single storage device of a data node. Mount path and capacity are fixed for the disk's
///  lifetime, only its soft state changes.
///
/// A disk's own state ignores the data node it belongs to; use [DiskRef::state] for the state
///  that takes the data node into account.
pub struct Disk {
    mount_path: String,
    raw_capacity_in_bytes: u64,
    detector: SoftStateDetector,
    resource: HealthResource,
    notifier: HealthEventNotifier,
}

impl Debug for Disk {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Disk{{{}:{}B:{}}}", self.mount_path, self.raw_capacity_in_bytes, self.own_state())
    }
}

impl Disk {
    /// `document` must have passed topology validation together with its data node
    pub(crate) fn new(hostname: &str, port: u16, document: &DiskDocument, config: &ClusterMapConfig, notifier: HealthEventNotifier) -> Disk {
        Disk {
            mount_path: document.mount_path.clone(),
            raw_capacity_in_bytes: document.capacity_in_bytes,
            detector: SoftStateDetector::new(document.hardware_state, config.disk_error_threshold, config.disk_retry_backoff),
            resource: HealthResource::Disk {
                hostname: hostname.to_string(),
                port,
                mount_path: document.mount_path.clone(),
            },
            notifier,
        }
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    pub fn raw_capacity_in_bytes(&self) -> u64 {
        self.raw_capacity_in_bytes
    }

    pub fn own_state(&self) -> HardwareState {
        self.detector.effective_state()
    }

    pub fn on_disk_error(&self) {
        let change = self.detector.on_timeout();
        self.notify(change);
    }

    pub fn on_disk_ok(&self) {
        let change = self.detector.on_response();
        self.notify(change);
    }

    pub fn to_canonical_form(&self) -> DiskDocument {
        DiskDocument {
            mount_path: self.mount_path.clone(),
            capacity_in_bytes: self.raw_capacity_in_bytes,
            hardware_state: self.own_state(),
        }
    }

    fn notify(&self, change: Option<StateChange>) {
        if let Some(change) = change {
            info!("disk {:?} changed from {} to {}", self.resource, change.old_state, change.new_state);
            self.notifier.send_event(HealthEvent::StateChanged(StateChangedData {
                resource: self.resource.clone(),
                old_state: change.old_state,
                new_state: change.new_state,
            }));
        }
    }
}


/// A disk as seen through the data node it belongs to. The reference to the data node is
///  only used to read the data node's state.
#[derive(Clone, Copy)]
pub struct DiskRef<'a> {
    disk: &'a Disk,
    data_node: &'a DataNode,
}
impl <'a> DiskRef<'a> {
    pub(crate) fn new(disk: &'a Disk, data_node: &'a DataNode) -> DiskRef<'a> {
        DiskRef {
            disk,
            data_node,
        }
    }

    pub fn data_node(&self) -> &'a DataNode {
        self.data_node
    }

    /// An unavailable data node makes all of its disks unavailable, regardless of their own state
    pub fn state(&self) -> HardwareState {
        self.data_node.state().and(self.disk.own_state())
    }
}

impl Deref for DiskRef<'_> {
    type Target = Disk;

    fn deref(&self) -> &Disk {
        self.disk
    }
}

impl Debug for DiskRef<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}@{}:{}", self.disk, self.data_node.hostname(), self.data_node.port())
    }
}
