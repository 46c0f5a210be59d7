use std::fmt::Debug;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::Arc;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::clustermap::canonical_form::DataNodeDocument;
use crate::clustermap::clustermap_error::ValidationError;
use crate::clustermap::datacenter::DatacenterId;

/// Whether a data node must belong to a datacenter. Data nodes that are loaded as part of
///  cluster topology always do, `Skip` is for bootstrapping and for tests.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OwnerValidation {
    Required,
    Skip,
}

/// RFC 6761: names under this top level domain are guaranteed to never resolve
const RESERVED_INVALID_TLD: &str = "invalid";

/// Resolves a hostname to the network addresses it stands for
#[cfg_attr(test, mockall::automock)]
pub trait HostnameResolver: Debug + Send + Sync {
    fn resolve(&self, hostname: &str) -> io::Result<Vec<IpAddr>>;
}

/// resolves through the operating system, i.e. DNS, hosts file etc.
#[derive(Debug)]
pub struct SystemResolver {}
impl HostnameResolver for SystemResolver {
    fn resolve(&self, hostname: &str) -> io::Result<Vec<IpAddr>> {
        Ok((hostname, 0).to_socket_addrs()?
            .map(|sa| sa.ip())
            .collect())
    }
}

/// Checks a data node's topology before the data node is constructed. Checks run in a fixed
///  order and the first failure is reported.
#[derive(Debug, Clone)]
pub struct TopologyValidator {
    owner_validation: OwnerValidation,
    resolver: Arc<dyn HostnameResolver>,
}
impl TopologyValidator {
    pub fn new(owner_validation: OwnerValidation) -> TopologyValidator {
        TopologyValidator {
            owner_validation,
            resolver: Arc::new(SystemResolver {}),
        }
    }

    pub fn with_resolver(self, resolver: Arc<dyn HostnameResolver>) -> TopologyValidator {
        TopologyValidator {
            resolver,
            ..self
        }
    }

    pub fn owner_validation(&self) -> OwnerValidation {
        self.owner_validation
    }

    /// returns the validated (plain, TLS) ports
    pub fn validate(&self, datacenter: Option<&DatacenterId>, document: &DataNodeDocument) -> Result<(u16, u16), ValidationError> {
        let result = self.do_validate(datacenter, document);
        if let Err(e) = &result {
            warn!("rejecting data node {}:{} - {}", document.hostname, document.port, e);
        }
        result
    }

    fn do_validate(&self, datacenter: Option<&DatacenterId>, document: &DataNodeDocument) -> Result<(u16, u16), ValidationError> {
        self.validate_datacenter(datacenter)?;
        self.validate_hostname(&document.hostname)?;
        let port = validate_port("port", document.port)?;
        let ssl_port = validate_port("ssl port", document.ssl_port)?;
        validate_mount_paths(document.disks.iter().map(|d| d.mount_path.as_str()))?;
        validate_capacity(document.disks.iter().map(|d| d.capacity_in_bytes))?;
        Ok((port, ssl_port))
    }

    fn validate_datacenter(&self, datacenter: Option<&DatacenterId>) -> Result<(), ValidationError> {
        match (self.owner_validation, datacenter) {
            (OwnerValidation::Required, None) => Err(ValidationError::MissingDatacenter),
            _ => Ok(()),
        }
    }

    fn validate_hostname(&self, hostname: &str) -> Result<(), ValidationError> {
        if hostname.is_empty() {
            return Err(ValidationError::EmptyHostname);
        }

        let tld = hostname.trim_end_matches('.')
            .rsplit('.')
            .next()
            .unwrap_or_default();
        if tld.eq_ignore_ascii_case(RESERVED_INVALID_TLD) {
            return Err(ValidationError::ReservedHostname { hostname: hostname.to_string() });
        }

        match self.resolver.resolve(hostname) {
            Ok(addrs) if !addrs.is_empty() => {
                debug!("hostname {} resolves to {:?}", hostname, addrs);
                Ok(())
            }
            Ok(_) => Err(ValidationError::UnresolvableHostname {
                hostname: hostname.to_string(),
                reason: "no addresses".to_string(),
            }),
            Err(e) => Err(ValidationError::UnresolvableHostname {
                hostname: hostname.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

fn validate_port(which: &'static str, port: i64) -> Result<u16, ValidationError> {
    match u16::try_from(port) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(ValidationError::PortOutOfRange { which, port }),
    }
}

fn validate_mount_paths<'a>(mount_paths: impl Iterator<Item=&'a str>) -> Result<(), ValidationError> {
    let mut seen = FxHashSet::default();
    for mount_path in mount_paths {
        if !mount_path.starts_with('/') {
            return Err(ValidationError::InvalidMountPath { mount_path: mount_path.to_string() });
        }
        if !seen.insert(mount_path) {
            return Err(ValidationError::DuplicateMountPath { mount_path: mount_path.to_string() });
        }
    }
    Ok(())
}

/// the data node's raw capacity is the sum of its disks' capacities, and it must fit
fn validate_capacity(capacities: impl Iterator<Item=u64>) -> Result<(), ValidationError> {
    let mut total: u64 = 0;
    for capacity in capacities {
        total = total.checked_add(capacity)
            .ok_or(ValidationError::CapacityOverflow)?;
    }
    Ok(())
}
