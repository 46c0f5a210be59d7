use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// Availability of a data node or disk, both as declared in the topology and as observed by
///  the soft-state failure detector.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HardwareState {
    Available,
    Unavailable,
}
impl HardwareState {
    pub fn is_available(&self) -> bool {
        *self == HardwareState::Available
    }

    /// combines two independent observations: either one being unavailable makes the result
    ///  unavailable
    pub fn and(self, other: HardwareState) -> HardwareState {
        match (self, other) {
            (HardwareState::Available, HardwareState::Available) => HardwareState::Available,
            _ => HardwareState::Unavailable,
        }
    }
}

impl Display for HardwareState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            HardwareState::Available => write!(f, "AVAILABLE"),
            HardwareState::Unavailable => write!(f, "UNAVAILABLE"),
        }
    }
}
