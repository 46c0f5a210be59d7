use tokio::sync::broadcast;
use tracing::trace;

use crate::clustermap::hardware_state::HardwareState;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HealthEvent {
    /// Sent when a reported timeout or response changes an entity's effective state. Recovery
    ///  caused by the retry backoff expiring is not sent: it is only visible when polling.
    StateChanged(StateChangedData),
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum HealthResource {
    DataNode { hostname: String, port: u16 },
    Disk { hostname: String, port: u16, mount_path: String },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StateChangedData {
    pub resource: HealthResource,
    pub old_state: HardwareState,
    pub new_state: HardwareState,
}


/// Every data node has its own notifier, shared with its disks
#[derive(Clone, Debug)]
pub struct HealthEventNotifier {
    sender: broadcast::Sender<HealthEvent>,
}
impl HealthEventNotifier {
    pub fn new(capacity: usize) -> HealthEventNotifier {
        let (sender, _) = broadcast::channel(capacity.max(1));

        HealthEventNotifier {
            sender
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.sender.subscribe()
    }

    pub fn send_event(&self, event: HealthEvent) {
        trace!("event: {:?}", event);
        // no subscribers is the normal case
        let _ = self.sender.send(event);
    }
}
