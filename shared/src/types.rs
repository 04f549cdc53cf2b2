use std::collections::{BTreeMap, HashMap};
use serde::Serialize;
use crate::protocol::{ATTR_NAME, TXT_DSN, TXT_INSTANCE, TXT_SERVICE, TXT_UUID};

/// A resolved Machinekit service announcement.
/// This is the canonical data model shared by the relay's registry and API.
///
/// Serializes to a flat object using the TXT record keys, so a client sees the
/// same key set the service announced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    /// Full DNS-SD record name, e.g. "Status service on bbb._machinekit._tcp.local."
    pub name: String,

    /// Logical role within the instance, e.g. "status" or "command"
    #[serde(rename = "service")]
    pub service_id: String,

    /// Machine instance owning the service
    #[serde(rename = "instance")]
    pub instance_id: String,

    /// Global identity of the owning Machinekit instance
    #[serde(rename = "uuid")]
    pub owner_uuid: String,

    /// Endpoint clients connect to, e.g. "tcp://10.0.0.2:6501"
    #[serde(rename = "dsn")]
    pub connection_uri: String,

    /// Remaining TXT record key-value pairs
    #[serde(flatten)]
    pub attributes: BTreeMap<String, String>,
}

impl ServiceDescriptor {
    /// Build a descriptor from a resolved attribute map.
    /// Returns None when any of `name`, `service`, `instance`, `uuid` or `dsn` is absent.
    pub fn from_attributes(mut attributes: HashMap<String, String>) -> Option<Self> {
        let name = attributes.remove(ATTR_NAME)?;
        let service_id = attributes.remove(TXT_SERVICE)?;
        let instance_id = attributes.remove(TXT_INSTANCE)?;
        let owner_uuid = attributes.remove(TXT_UUID)?;
        let connection_uri = attributes.remove(TXT_DSN)?;

        Some(Self {
            name,
            service_id,
            instance_id,
            owner_uuid,
            connection_uri,
            attributes: attributes.into_iter().collect(),
        })
    }

    /// True if `key` names either the owning instance or its uuid
    pub fn is_owned_by(&self, key: &str) -> bool {
        self.instance_id == key || self.owner_uuid == key
    }
}
