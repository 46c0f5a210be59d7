//! The canonical form is the JSON representation in which cluster topology is distributed.
//!  Field order is fixed and disk order is preserved, so a document produced here re-serializes
//!  to identical text after it was loaded.
//!
//! Ports are kept as plain integers here: range checks are part of topology validation, not of
//!  parsing.

use serde::{Deserialize, Serialize};

use crate::clustermap::clustermap_error::ClusterMapError;
use crate::clustermap::hardware_state::HardwareState;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct DataNodeDocument {
    pub hostname: String,
    pub port: i64,
    #[serde(rename = "sslport")]
    pub ssl_port: i64,
    #[serde(rename = "hardwareState")]
    pub hardware_state: HardwareState,
    pub disks: Vec<DiskDocument>,
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskDocument {
    pub mount_path: String,
    pub capacity_in_bytes: u64,
    pub hardware_state: HardwareState,
}

impl DataNodeDocument {
    pub fn from_json_str(json: &str) -> Result<DataNodeDocument, ClusterMapError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_value(json: serde_json::Value) -> Result<DataNodeDocument, ClusterMapError> {
        Ok(serde_json::from_value(json)?)
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self)
            .expect("plain struct with string keys always serializes")
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .expect("plain struct with string keys always serializes")
    }
}
