use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Opaque identity of the datacenter that owns a data node. The data node only checks that it
///  is present, everything else is the concern of the cluster-wide registry.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct DatacenterId(Arc<str>);
impl DatacenterId {
    pub fn new(name: &str) -> DatacenterId {
        DatacenterId(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Debug for DatacenterId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[dc:{}]", self.0)
    }
}
