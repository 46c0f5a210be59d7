use std::fmt::{Debug, Formatter};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::clustermap::canonical_form::DataNodeDocument;
use crate::clustermap::clustermap_config::ClusterMapConfig;
use crate::clustermap::clustermap_error::ClusterMapError;
use crate::clustermap::datacenter::DatacenterId;
use crate::clustermap::disk::{Disk, DiskRef};
use crate::clustermap::hardware_state::HardwareState;
use crate::clustermap::health_events::{HealthEvent, HealthEventNotifier, HealthResource, StateChangedData};
use crate::clustermap::soft_state::{SoftStateDetector, StateChange};
use crate::clustermap::topology_validator::TopologyValidator;

/// A server in the cluster map, together with the disks it hosts.
///
/// Identity and disks are fixed once the data node is constructed. Health probes report their
///  outcomes through [DataNode::on_node_timeout] and [DataNode::on_node_response], and the
///  data node's state is derived from them by a [SoftStateDetector]. All methods take `&self`,
///  so a data node can be shared between threads.
pub struct DataNode {
    datacenter: Option<DatacenterId>,
    hostname: String,
    port: u16,
    ssl_port: u16,
    disks: Vec<Disk>,
    detector: SoftStateDetector,
    resource: HealthResource,
    notifier: HealthEventNotifier,
}

impl DataNode {
    /// Validates `document` with the system's hostname resolution, requiring an owning datacenter
    ///  unless `config` says otherwise
    pub fn new(datacenter: Option<DatacenterId>, document: &DataNodeDocument, config: &ClusterMapConfig) -> Result<DataNode, ClusterMapError> {
        let validator = TopologyValidator::new(config.owner_validation);
        DataNode::new_with_validator(datacenter, document, config, &validator)
    }

    pub fn new_with_validator(datacenter: Option<DatacenterId>, document: &DataNodeDocument, config: &ClusterMapConfig, validator: &TopologyValidator) -> Result<DataNode, ClusterMapError> {
        let (port, ssl_port) = validator.validate(datacenter.as_ref(), document)?;

        let notifier = HealthEventNotifier::new(config.health_event_capacity);
        let disks = document.disks.iter()
            .map(|d| Disk::new(&document.hostname, port, d, config, notifier.clone()))
            .collect::<Vec<_>>();

        let data_node = DataNode {
            datacenter,
            hostname: document.hostname.clone(),
            port,
            ssl_port,
            disks,
            detector: SoftStateDetector::new(document.hardware_state, config.datanode_error_threshold, config.datanode_retry_backoff),
            resource: HealthResource::DataNode {
                hostname: document.hostname.clone(),
                port,
            },
            notifier,
        };
        debug!("constructed data node {:?}", data_node);
        Ok(data_node)
    }

    pub fn from_json_str(datacenter: Option<DatacenterId>, json: &str, config: &ClusterMapConfig) -> Result<DataNode, ClusterMapError> {
        let document = DataNodeDocument::from_json_str(json)?;
        DataNode::new(datacenter, &document, config)
    }

    pub fn datacenter(&self) -> Option<&DatacenterId> {
        self.datacenter.as_ref()
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn ssl_port(&self) -> u16 {
        self.ssl_port
    }

    pub fn state(&self) -> HardwareState {
        self.detector.effective_state()
    }

    pub fn on_node_timeout(&self) {
        let change = self.detector.on_timeout();
        self.notify(change);
    }

    pub fn on_node_response(&self) {
        let change = self.detector.on_response();
        self.notify(change);
    }

    /// returns `false` if there is no disk with the given mount path
    pub fn on_disk_error(&self, mount_path: &str) -> bool {
        match self.disk(mount_path) {
            Some(disk) => {
                disk.on_disk_error();
                true
            }
            None => false,
        }
    }

    /// returns `false` if there is no disk with the given mount path
    pub fn on_disk_ok(&self, mount_path: &str) -> bool {
        match self.disk(mount_path) {
            Some(disk) => {
                disk.on_disk_ok();
                true
            }
            None => false,
        }
    }

    /// disks in the order of the topology document
    pub fn disks(&self) -> impl ExactSizeIterator<Item=DiskRef<'_>> {
        self.disks.iter()
            .map(move |d| DiskRef::new(d, self))
    }

    pub fn disk(&self, mount_path: &str) -> Option<DiskRef<'_>> {
        self.disks.iter()
            .find(|d| d.mount_path() == mount_path)
            .map(|d| DiskRef::new(d, self))
    }

    /// validation guarantees that the sum fits
    pub fn raw_capacity_in_bytes(&self) -> u64 {
        self.disks.iter()
            .map(|d| d.raw_capacity_in_bytes())
            .sum()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.notifier.subscribe()
    }

    pub fn to_canonical_form(&self) -> DataNodeDocument {
        DataNodeDocument {
            hostname: self.hostname.clone(),
            port: self.port.into(),
            ssl_port: self.ssl_port.into(),
            hardware_state: self.state(),
            disks: self.disks.iter()
                .map(|d| d.to_canonical_form())
                .collect(),
        }
    }

    pub fn to_json_string(&self) -> String {
        self.to_canonical_form().to_json_string()
    }

    fn notify(&self, change: Option<StateChange>) {
        if let Some(change) = change {
            info!("data node {}:{} changed from {} to {}", self.hostname, self.port, change.old_state, change.new_state);
            self.notifier.send_event(HealthEvent::StateChanged(StateChangedData {
                resource: self.resource.clone(),
                old_state: change.old_state,
                new_state: change.new_state,
            }));
        }
    }
}

/// Data nodes are equal if they have the same address, state and capacity. Individual disks
///  are not compared.
impl PartialEq for DataNode {
    fn eq(&self, other: &Self) -> bool {
        self.hostname == other.hostname
            && self.port == other.port
            && self.ssl_port == other.ssl_port
            && self.state() == other.state()
            && self.raw_capacity_in_bytes() == other.raw_capacity_in_bytes()
    }
}

impl Debug for DataNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DataNode{{{}:{}/{} {:?} {} disks:{:?}}}", self.hostname, self.port, self.ssl_port, self.datacenter, self.state(), self.disks)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::advance;
    use crate::clustermap::clustermap_error::ValidationError;
    use crate::clustermap::topology_validator::{MockHostnameResolver, OwnerValidation};
    use crate::test_util::{test_data_node_document, test_disk_documents, TEST_HOSTNAME};
    use HardwareState::*;
    use super::*;

    const DISK_COUNT: usize = 10;
    const DISK_CAPACITY_IN_BYTES: u64 = 1000 * 1024 * 1024 * 1024;

    fn validator(owner_validation: OwnerValidation) -> TopologyValidator {
        let mut resolver = MockHostnameResolver::new();
        resolver.expect_resolve()
            .returning(|_| Ok(vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]));
        TopologyValidator::new(owner_validation)
            .with_resolver(Arc::new(resolver))
    }

    fn test_document() -> DataNodeDocument {
        test_data_node_document(TEST_HOSTNAME, 6666, 7666, Available, test_disk_documents(DISK_COUNT, "/mnt", Available, DISK_CAPACITY_IN_BYTES))
    }

    /// constructs a data node without an owning datacenter
    fn test_data_node(document: &DataNodeDocument, config: &ClusterMapConfig) -> Result<DataNode, ClusterMapError> {
        DataNode::new_with_validator(None, document, config, &validator(OwnerValidation::Skip))
    }

    fn ensure(data_node: &DataNode, state: HardwareState) {
        assert_eq!(data_node.state(), state);
        for disk in data_node.disks() {
            assert_eq!(disk.state(), state);
        }
    }

    #[test]
    fn test_basics() {
        let document = test_document();
        let config = ClusterMapConfig::new();
        let data_node = test_data_node(&document, &config).unwrap();

        assert_eq!(data_node.hostname(), TEST_HOSTNAME);
        assert_eq!(data_node.port(), 6666);
        assert_eq!(data_node.ssl_port(), 7666);
        assert_eq!(data_node.state(), Available);
        assert_eq!(data_node.datacenter(), None);

        assert_eq!(data_node.disks().len(), DISK_COUNT);
        assert_eq!(data_node.raw_capacity_in_bytes(), DISK_COUNT as u64 * DISK_CAPACITY_IN_BYTES);

        assert_eq!(data_node.to_json_string(), document.to_json_string());
        assert_eq!(data_node, test_data_node(&data_node.to_canonical_form(), &config).unwrap());
    }

    #[test]
    fn test_with_datacenter() {
        let dc = DatacenterId::new("dc1");
        let data_node = DataNode::new_with_validator(Some(dc.clone()), &test_document(), &ClusterMapConfig::new(), &validator(OwnerValidation::Required))
            .unwrap();
        assert_eq!(data_node.datacenter(), Some(&dc));
    }

    #[test]
    fn test_missing_datacenter() {
        let result = DataNode::new_with_validator(None, &test_document(), &ClusterMapConfig::new(), &validator(OwnerValidation::Required));
        assert!(matches!(result, Err(ClusterMapError::Validation(ValidationError::MissingDatacenter))));

        // default config requires a datacenter
        let result = DataNode::new(None, &test_document(), &ClusterMapConfig::new());
        assert!(matches!(result, Err(ClusterMapError::Validation(ValidationError::MissingDatacenter))));
    }

    #[test]
    fn test_validation_failures() {
        let config = ClusterMapConfig::new();
        let disks = || test_disk_documents(DISK_COUNT, "/mnt", Available, DISK_CAPACITY_IN_BYTES);

        for document in [
            test_data_node_document("", 6666, 7666, Available, disks()),
            test_data_node_document("hostname.invalid", 6666, 7666, Available, disks()),
            test_data_node_document(TEST_HOSTNAME, -1, 7666, Available, disks()),
            test_data_node_document(TEST_HOSTNAME, 6666, -1, Available, disks()),
            test_data_node_document(TEST_HOSTNAME, 100 * 1000, 7666, Available, disks()),
            test_data_node_document(TEST_HOSTNAME, 6666, 100 * 1000, Available, disks()),
        ] {
            let result = test_data_node(&document, &config);
            assert!(matches!(result, Err(ClusterMapError::Validation(_))), "{:?} should have failed validation", document);
        }
    }

    #[test]
    fn test_from_json_str() {
        let mut config = ClusterMapConfig::new();
        config.owner_validation = OwnerValidation::Skip;
        let json = test_data_node_document("127.0.0.1", 6666, 7666, Available, test_disk_documents(2, "/data", Available, 500))
            .to_json_string();

        let data_node = DataNode::from_json_str(None, &json, &config).unwrap();
        assert_eq!(data_node.raw_capacity_in_bytes(), 1000);
        assert_eq!(data_node.to_json_string(), json);

        let result = DataNode::from_json_str(None, "{}", &config);
        assert!(matches!(result, Err(ClusterMapError::Serialization(_))));
    }

    #[test]
    fn test_no_disks() {
        let document = test_data_node_document(TEST_HOSTNAME, 6666, 7666, Available, vec![]);
        let data_node = test_data_node(&document, &ClusterMapConfig::new()).unwrap();

        assert_eq!(data_node.disks().len(), 0);
        assert_eq!(data_node.raw_capacity_in_bytes(), 0);
        assert_eq!(data_node.to_canonical_form(), document);
    }

    #[test]
    fn test_capacity_is_sum_of_disks() {
        let mut document = test_data_node_document(TEST_HOSTNAME, 6666, 7666, Available, test_disk_documents(3, "/mnt", Available, 0));
        for (i, disk) in document.disks.iter_mut().enumerate() {
            disk.capacity_in_bytes = 7 * (i as u64 + 1);
        }
        let data_node = test_data_node(&document, &ClusterMapConfig::new()).unwrap();

        assert_eq!(data_node.raw_capacity_in_bytes(), 7 + 14 + 21);
    }

    #[test]
    fn test_capacity_overflow_is_rejected() {
        let mut document = test_data_node_document(TEST_HOSTNAME, 6666, 7666, Available, test_disk_documents(2, "/mnt", Available, u64::MAX / 2 + 1));
        let result = test_data_node(&document, &ClusterMapConfig::new());
        assert!(matches!(result, Err(ClusterMapError::Validation(ValidationError::CapacityOverflow))));

        document.disks[1].capacity_in_bytes = u64::MAX / 2;
        let data_node = test_data_node(&document, &ClusterMapConfig::new()).unwrap();
        assert_eq!(data_node.raw_capacity_in_bytes(), u64::MAX);
    }

    #[test]
    fn test_disk_order_is_preserved() {
        let mut document = test_document();
        document.disks.reverse();
        let data_node = test_data_node(&document, &ClusterMapConfig::new()).unwrap();

        let mount_paths = data_node.disks()
            .map(|d| d.mount_path().to_string())
            .collect::<Vec<_>>();
        let expected = (0..DISK_COUNT).rev()
            .map(|i| format!("/mnt{}", i))
            .collect::<Vec<_>>();
        assert_eq!(mount_paths, expected);
        assert_eq!(data_node.to_canonical_form(), document);
    }

    #[tokio::test(start_paused = true)]
    async fn test_soft_state() {
        let mut config = ClusterMapConfig::new();
        config.datanode_retry_backoff = Duration::from_millis(2000);
        let threshold = config.datanode_error_threshold;
        let retry_backoff = config.datanode_retry_backoff;

        let data_node = test_data_node(&test_document(), &config).unwrap();
        for _ in 0..threshold {
            ensure(&data_node, Available);
            data_node.on_node_timeout();
        }
        // after threshold number of consecutive errors, the data node is unavailable
        ensure(&data_node, Unavailable);

        advance(retry_backoff + Duration::from_millis(1)).await;
        ensure(&data_node, Available);

        // a single timeout is enough now
        data_node.on_node_timeout();
        ensure(&data_node, Unavailable);

        data_node.on_node_response();
        ensure(&data_node, Available);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_node_masks_available_disks() {
        let mut config = ClusterMapConfig::new();
        config.datanode_error_threshold = 1;
        let data_node = test_data_node(&test_document(), &config).unwrap();

        data_node.on_node_timeout();
        for disk in data_node.disks() {
            assert_eq!(disk.own_state(), Available);
            assert_eq!(disk.state(), Unavailable);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disk_soft_state() {
        let mut config = ClusterMapConfig::new();
        config.disk_error_threshold = 2;
        config.disk_retry_backoff = Duration::from_millis(500);
        let data_node = test_data_node(&test_document(), &config).unwrap();

        assert!(data_node.on_disk_error("/mnt3"));
        assert!(data_node.on_disk_error("/mnt3"));
        assert!(!data_node.on_disk_error("/no-such-disk"));

        assert_eq!(data_node.state(), Available);
        for disk in data_node.disks() {
            let expected = if disk.mount_path() == "/mnt3" { Unavailable } else { Available };
            assert_eq!(disk.state(), expected);
        }
        // disk failures do not affect capacity or the data node
        assert_eq!(data_node.raw_capacity_in_bytes(), DISK_COUNT as u64 * DISK_CAPACITY_IN_BYTES);

        advance(Duration::from_millis(500)).await;
        assert_eq!(data_node.disk("/mnt3").unwrap().state(), Available);

        data_node.on_disk_error("/mnt3");
        assert_eq!(data_node.disk("/mnt3").unwrap().state(), Unavailable);

        assert!(data_node.on_disk_ok("/mnt3"));
        assert_eq!(data_node.disk("/mnt3").unwrap().state(), Available);
        assert!(!data_node.on_disk_ok("/no-such-disk"));
    }

    #[test]
    fn test_declared_unavailable_disk() {
        let mut document = test_document();
        document.disks[0].hardware_state = Unavailable;
        let data_node = test_data_node(&document, &ClusterMapConfig::new()).unwrap();

        assert_eq!(data_node.state(), Available);
        assert_eq!(data_node.disk("/mnt0").unwrap().state(), Unavailable);
        assert_eq!(data_node.disk("/mnt1").unwrap().state(), Available);
        assert_eq!(data_node.to_canonical_form(), document);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_of_unavailable_node() {
        let mut config = ClusterMapConfig::new();
        config.datanode_error_threshold = 1;
        let data_node = test_data_node(&test_document(), &config).unwrap();
        data_node.on_node_timeout();

        let reloaded = test_data_node(&data_node.to_canonical_form(), &config).unwrap();
        assert_eq!(reloaded.state(), Unavailable);
        assert_eq!(reloaded, data_node);
    }

    #[test]
    fn test_equality() {
        let config = ClusterMapConfig::new();
        let data_node = test_data_node(&test_document(), &config).unwrap();

        let mut different_disks = test_document();
        different_disks.disks = test_disk_documents(1, "/other", Available, DISK_COUNT as u64 * DISK_CAPACITY_IN_BYTES);
        assert_eq!(data_node, test_data_node(&different_disks, &config).unwrap());

        let mut different_port = test_document();
        different_port.port = 6667;
        assert_ne!(data_node, test_data_node(&different_port, &config).unwrap());

        let mut different_ssl_port = test_document();
        different_ssl_port.ssl_port = 7667;
        assert_ne!(data_node, test_data_node(&different_ssl_port, &config).unwrap());

        let mut different_capacity = test_document();
        different_capacity.disks.pop();
        assert_ne!(data_node, test_data_node(&different_capacity, &config).unwrap());

        let mut different_state = test_document();
        different_state.hardware_state = Unavailable;
        assert_ne!(data_node, test_data_node(&different_state, &config).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_events() {
        let mut config = ClusterMapConfig::new();
        config.datanode_error_threshold = 2;
        let data_node = test_data_node(&test_document(), &config).unwrap();
        let mut events = data_node.subscribe();

        let node_evt = |old_state, new_state| HealthEvent::StateChanged(StateChangedData {
            resource: HealthResource::DataNode { hostname: TEST_HOSTNAME.to_string(), port: 6666 },
            old_state,
            new_state,
        });

        data_node.on_node_timeout();
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

        data_node.on_node_timeout();
        assert_eq!(events.try_recv(), Ok(node_evt(Available, Unavailable)));

        data_node.on_node_timeout();
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

        data_node.on_disk_error("/mnt1");
        assert_eq!(events.try_recv(), Ok(HealthEvent::StateChanged(StateChangedData {
            resource: HealthResource::Disk { hostname: TEST_HOSTNAME.to_string(), port: 6666, mount_path: "/mnt1".to_string() },
            old_state: Available,
            new_state: Unavailable,
        })));

        data_node.on_node_response();
        assert_eq!(events.try_recv(), Ok(node_evt(Unavailable, Available)));
        data_node.on_node_response();
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_concurrent_reporting() {
        let mut config = ClusterMapConfig::new();
        config.datanode_error_threshold = 1000;
        let data_node = Arc::new(test_data_node(&test_document(), &config).unwrap());

        let handles = (0..4)
            .map(|_| {
                let data_node = data_node.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        data_node.on_node_timeout();
                        let _ = data_node.state();
                    }
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(data_node.state(), Unavailable);
        data_node.on_node_response();
        assert_eq!(data_node.state(), Available);
    }
}
