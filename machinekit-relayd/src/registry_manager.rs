use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use crate::mdns::browser::DiscoveryEvent;
use crate::registry::{AcceptOutcome, Registry};

/// Registry manager event loop - applies discovery events to the registry
pub async fn run(
    registry: Registry,
    mut rx: mpsc::Receiver<DiscoveryEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(event) => apply(&registry, event).await,
                    None => {
                        tracing::info!("Discovery channel closed");
                        break;
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Registry manager shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn apply(registry: &Registry, event: DiscoveryEvent) {
    match event {
        DiscoveryEvent::Appeared { name, service_type, domain } => {
            tracing::debug!("Awaiting resolution of {} ({} in {})", name, service_type, domain);
        }
        DiscoveryEvent::Resolved { name, attributes } => {
            match registry.accept(attributes).await {
                AcceptOutcome::Inserted => {
                    tracing::info!("Registered {} ({} services known)", name, registry.len().await);
                }
                outcome => {
                    tracing::debug!("Ignored {}: {:?}", name, outcome);
                }
            }
        }
        DiscoveryEvent::Disappeared { name } => {
            if let Some(desc) = registry.remove(&name).await {
                tracing::info!("Unregistered {} service {}", desc.service_id, name);
                if registry.is_empty().await {
                    tracing::info!("No local services left");
                }
            }
        }
    }
}
