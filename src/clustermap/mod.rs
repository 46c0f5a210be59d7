pub mod canonical_form;
pub mod clustermap_config;
pub mod clustermap_error;
pub mod data_node;
pub mod datacenter;
pub mod disk;
pub mod hardware_state;
pub mod health_events;
pub mod soft_state;
pub mod topology_validator;
