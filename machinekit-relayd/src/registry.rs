use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use shared::types::ServiceDescriptor;

/// Result of offering a resolved announcement to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    Inserted,
    /// A required attribute was absent
    MissingField,
    /// Announced by another Machinekit instance
    ForeignOwner,
    /// The service id is already registered; the first announcement is kept
    Duplicate,
}

/// Live services of the local instance, keyed by service id.
///
/// Cloning yields another handle onto the same map. Every operation takes the
/// lock for a single map access only.
#[derive(Clone)]
pub struct Registry {
    self_uuid: Arc<str>,
    services: Arc<Mutex<HashMap<String, ServiceDescriptor>>>,
}

impl Registry {
    pub fn new(self_uuid: impl Into<String>) -> Self {
        let self_uuid: String = self_uuid.into();
        Self {
            self_uuid: Arc::from(self_uuid),
            services: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn self_uuid(&self) -> &str {
        &self.self_uuid
    }

    /// Register a resolved announcement unless it is incomplete, foreign or
    /// its service id is already known.
    pub async fn accept(&self, attributes: HashMap<String, String>) -> AcceptOutcome {
        let Some(descriptor) = ServiceDescriptor::from_attributes(attributes) else {
            return AcceptOutcome::MissingField;
        };
        if descriptor.owner_uuid != *self.self_uuid {
            return AcceptOutcome::ForeignOwner;
        }

        let mut services = self.services.lock().await;
        if services.contains_key(&descriptor.service_id) {
            return AcceptOutcome::Duplicate;
        }
        services.insert(descriptor.service_id.clone(), descriptor);
        AcceptOutcome::Inserted
    }

    /// Remove the entry announced under `name`, if any
    pub async fn remove(&self, name: &str) -> Option<ServiceDescriptor> {
        let mut services = self.services.lock().await;
        let service_id = services
            .iter()
            .find(|(_, desc)| desc.name == name)
            .map(|(id, _)| id.clone())?;
        services.remove(&service_id)
    }

    pub async fn lookup_all(&self) -> BTreeMap<String, ServiceDescriptor> {
        let services = self.services.lock().await;
        services
            .iter()
            .map(|(id, desc)| (id.clone(), desc.clone()))
            .collect()
    }

    pub async fn lookup_by_service_id(&self, service_id: &str) -> Option<ServiceDescriptor> {
        self.services.lock().await.get(service_id).cloned()
    }

    /// Entries whose instance id or owner uuid equals `key`
    pub async fn lookup_by_owner_key(&self, key: &str) -> BTreeMap<String, ServiceDescriptor> {
        let services = self.services.lock().await;
        services
            .iter()
            .filter(|(_, desc)| desc.is_owned_by(key))
            .map(|(id, desc)| (id.clone(), desc.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.services.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.services.lock().await.is_empty()
    }
}
