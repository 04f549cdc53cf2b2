use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::Future;
use anyhow::Result;
use shared::protocol::ATTR_NAME;

/// Normalized announcement lifecycle, as consumed by the registry manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A candidate announcement was seen; mdns-sd resolves it on its own
    Appeared {
        name: String,
        service_type: String,
        domain: String,
    },
    /// TXT attributes of a resolved announcement, `name` included
    Resolved {
        name: String,
        attributes: HashMap<String, String>,
    },
    Disappeared {
        name: String,
    },
}

/// Service type patterns already browsed
#[derive(Debug, Default)]
pub struct Subscriptions {
    browsed: HashSet<String>,
}

impl Subscriptions {
    /// Returns the normalized pattern if it has not been browsed yet
    pub fn claim(&mut self, pattern: &str) -> Option<String> {
        let service_type = normalize_service_type(pattern);
        if self.browsed.insert(service_type.clone()) {
            Some(service_type)
        } else {
            None
        }
    }
}

type RecvResult = (usize, flume::Receiver<ServiceEvent>, std::result::Result<ServiceEvent, flume::RecvError>);
type RecvFuture = Pin<Box<dyn Future<Output = RecvResult> + Send>>;

/// Each future owns a clone of the receiver so the set can be polled without
/// borrowing from a receivers vec.
fn make_recv_future(idx: usize, rx: flume::Receiver<ServiceEvent>) -> RecvFuture {
    Box::pin(async move {
        let result = rx.recv_async().await;
        (idx, rx, result)
    })
}

pub async fn run_browser(
    daemon: ServiceDaemon,
    service_types: Vec<String>,
    tx: mpsc::Sender<DiscoveryEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    tracing::info!("Starting mDNS browser");

    let mut subscriptions = Subscriptions::default();
    let mut type_futures: FuturesUnordered<RecvFuture> = FuturesUnordered::new();

    for (idx, pattern) in service_types.iter().enumerate() {
        let Some(service_type) = subscriptions.claim(pattern) else {
            tracing::debug!("Already browsing {}", pattern);
            continue;
        };

        match daemon.browse(&service_type) {
            Ok(receiver) => {
                tracing::info!("Browsing {}", service_type);
                type_futures.push(make_recv_future(idx, receiver));
            }
            Err(e) => {
                tracing::error!("Failed to browse {}: {}", service_type, e);
            }
        }
    }

    if type_futures.is_empty() {
        tracing::warn!("No service type could be browsed; waiting for shutdown");
    }

    loop {
        tokio::select! {
            Some((idx, rx, result)) = type_futures.next() => {
                match result {
                    Ok(event) => {
                        if let Some(event) = normalize_event(event) {
                            if let Err(e) = tx.send(event).await {
                                tracing::error!("Failed to send discovery event: {}", e);
                            }
                        }
                        type_futures.push(make_recv_future(idx, rx));
                    }
                    Err(e) => {
                        tracing::warn!("Receiver {} disconnected: {}", idx, e);
                    }
                }
            }

            _ = cancel.cancelled() => {
                tracing::info!("mDNS browser shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Map an mdns-sd event onto the relay's event stream
pub fn normalize_event(event: ServiceEvent) -> Option<DiscoveryEvent> {
    match event {
        ServiceEvent::ServiceFound(service_type, fullname) => {
            tracing::debug!("Service appeared: {}", fullname);
            let domain = domain_of(&service_type).to_string();
            Some(DiscoveryEvent::Appeared {
                name: fullname,
                service_type,
                domain,
            })
        }
        ServiceEvent::ServiceResolved(info) => {
            tracing::debug!("Resolved service: {}", info.get_fullname());
            Some(DiscoveryEvent::Resolved {
                name: info.get_fullname().to_string(),
                attributes: attributes_from_info(&info),
            })
        }
        ServiceEvent::ServiceRemoved(_typ, fullname) => {
            tracing::debug!("Service removed: {}", fullname);
            Some(DiscoveryEvent::Disappeared { name: fullname })
        }
        other => {
            tracing::trace!("Ignoring mDNS event: {:?}", other);
            None
        }
    }
}

/// TXT properties of a resolved service, with the full record name re-attached
fn attributes_from_info(info: &ServiceInfo) -> HashMap<String, String> {
    let mut attributes: HashMap<String, String> = info
        .get_properties()
        .iter()
        .map(|prop| (prop.key().to_string(), prop.val_str().to_string()))
        .collect();

    attributes.insert(ATTR_NAME.to_string(), info.get_fullname().to_string());
    attributes
}

/// mdns-sd only browses fully qualified `.local.` types
pub fn normalize_service_type(pattern: &str) -> String {
    let trimmed = pattern.trim().trim_end_matches('.');
    if trimmed.ends_with(".local") {
        format!("{}.", trimmed)
    } else {
        format!("{}.local.", trimmed)
    }
}

/// Domain part of a service type, e.g. "local." for "_machinekit._tcp.local."
fn domain_of(service_type: &str) -> &str {
    ["._tcp.", "._udp."]
        .iter()
        .find_map(|proto| service_type.find(proto).map(|idx| &service_type[idx + proto.len()..]))
        .unwrap_or("local.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::{MACHINEKIT_SERVICE_TYPE, TXT_DSN, TXT_SERVICE, TXT_UUID};

    fn status_info() -> ServiceInfo {
        let txt = HashMap::from([
            (TXT_SERVICE.to_string(), "status".to_string()),
            (TXT_UUID.to_string(), "U".to_string()),
            (TXT_DSN.to_string(), "tcp://10.0.0.2:6502".to_string()),
        ]);
        ServiceInfo::new(
            MACHINEKIT_SERVICE_TYPE,
            "Status service on bbb",
            "bbb.local.",
            "10.0.0.2",
            6502,
            txt,
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_service_type() {
        assert_eq!(normalize_service_type("_machinekit._tcp"), "_machinekit._tcp.local.");
        assert_eq!(normalize_service_type("_machinekit._tcp."), "_machinekit._tcp.local.");
        assert_eq!(normalize_service_type("_machinekit._tcp.local"), "_machinekit._tcp.local.");
        assert_eq!(normalize_service_type("_machinekit._tcp.local."), "_machinekit._tcp.local.");
    }

    #[test]
    fn test_subscriptions_are_deduplicated() {
        let mut subscriptions = Subscriptions::default();
        assert_eq!(
            subscriptions.claim("_machinekit._tcp.local."),
            Some("_machinekit._tcp.local.".to_string())
        );
        assert_eq!(subscriptions.claim("_machinekit._tcp"), None);
        assert!(subscriptions.claim("_http._tcp").is_some());
        assert_eq!(subscriptions.claim("_http._tcp.local."), None);
    }

    #[test]
    fn test_resolved_carries_txt_and_name() {
        let info = status_info();
        let fullname = info.get_fullname().to_string();

        let event = normalize_event(ServiceEvent::ServiceResolved(info)).unwrap();
        let DiscoveryEvent::Resolved { name, attributes } = event else {
            panic!("Expected a resolved event");
        };
        assert_eq!(name, fullname);
        assert_eq!(attributes[ATTR_NAME], fullname);
        assert_eq!(attributes[TXT_SERVICE], "status");
        assert_eq!(attributes[TXT_DSN], "tcp://10.0.0.2:6502");
    }

    #[test]
    fn test_found_and_removed() {
        let name = "Status service on bbb._machinekit._tcp.local.".to_string();

        let found = normalize_event(ServiceEvent::ServiceFound(
            MACHINEKIT_SERVICE_TYPE.to_string(),
            name.clone(),
        ));
        assert_eq!(
            found,
            Some(DiscoveryEvent::Appeared {
                name: name.clone(),
                service_type: MACHINEKIT_SERVICE_TYPE.to_string(),
                domain: "local.".to_string(),
            })
        );

        let removed = normalize_event(ServiceEvent::ServiceRemoved(
            MACHINEKIT_SERVICE_TYPE.to_string(),
            name.clone(),
        ));
        assert_eq!(removed, Some(DiscoveryEvent::Disappeared { name }));
    }

    #[test]
    fn test_search_state_is_dropped() {
        let started = ServiceEvent::SearchStarted(MACHINEKIT_SERVICE_TYPE.to_string());
        assert!(normalize_event(started).is_none());
    }
}
