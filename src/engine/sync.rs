use crate::adaptors::InterfaceDiscovery;
use crate::container::{ContainerEvent, ContainerState};
use crate::docker::Transport;
use crate::registry;
use crate::sample::SampleSink;

use super::Engine;
use super::models::{Event, ListedContainer};

impl<T, S, D> Engine<T, S, D>
where
    T: Transport,
    S: SampleSink,
    D: InterfaceDiscovery,
{
    pub(super) fn on_event_document(&mut self, document: String, now: u64) {
        if !self.synced {
            log::trace!("buffering event until synchronized");
            self.event_buffer.push(document);
            return;
        }
        self.handle_event(&document, now);
    }

    pub(super) fn handle_event(&mut self, document: &str, now: u64) {
        let event: Event = match serde_json::from_str(document) {
            Ok(event) => event,
            Err(err) => {
                log::debug!("dropping undecodable event: {}", err);
                return;
            }
        };
        let Some(status) = event.status() else {
            log::debug!("ignoring event with no status");
            return;
        };
        let Some(id) = event.id() else {
            log::debug!("ignoring event with no id");
            return;
        };
        if let Some(kind) = event.kind.as_deref() {
            if kind != "container" {
                log::debug!("ignoring event for type {}", kind);
                return;
            }
        }
        let name = event.name().unwrap_or(id);
        let Some(code) = ContainerEvent::parse(status) else {
            log::debug!("unrecognized event status: {}", status);
            return;
        };

        let target = code.target_state();
        let create = target == Some(ContainerState::Running);
        let container = match self.registry.lookup_or_create(id, create, false) {
            Ok(Some(container)) => container,
            Ok(None) => return,
            Err(err) => {
                log_registry_error(&err);
                return;
            }
        };

        if let Some(state) = target {
            if state != container.state {
                log::debug!("container {} state {} -> {}", id, container.state, state);
                container.state = state;
            }
        }
        container.last_event = Some(code);

        let id = container.id().clone();
        if container.state.is_running() {
            let inspect = !container.inspect_sent;
            // a rename of a running container lands here too
            self.registry.set_name(id.as_ref(), name);
            if inspect {
                self.inspect(&id, now);
            }
        } else {
            // one more sample before the container goes away
            self.stats(&id, now);
        }
    }

    pub(super) fn handle_listing(&mut self, body: &str, now: u64) {
        let listing: Vec<ListedContainer> = match serde_json::from_str(body) {
            Ok(listing) => listing,
            Err(err) => {
                log::debug!("dropping undecodable container listing: {}", err);
                return;
            }
        };

        for entry in &listing {
            let (Some(id), Some(name), Some(state)) = (
                entry.id.as_deref(),
                entry.names.as_ref().and_then(|names| names.first()),
                entry.state.as_deref(),
            ) else {
                log::debug!("skipping incomplete listing entry {:?}", entry);
                continue;
            };

            let state = ContainerState::parse(state);
            let container =
                match self
                    .registry
                    .lookup_or_create(id, state.is_running(), self.synced)
                {
                    Ok(Some(container)) => container,
                    Ok(None) => continue,
                    Err(err) => {
                        log_registry_error(&err);
                        continue;
                    }
                };
            container.state = state;
            let inspect = !container.inspect_sent;
            let id = container.id().clone();
            self.registry.set_name(id.as_ref(), name);
            if inspect {
                self.inspect(&id, now);
            }
        }

        if !self.synced {
            log::info!(
                "synchronized: {} containers, replaying {} buffered events",
                self.registry.len(),
                self.event_buffer.len()
            );
        }
        self.synced = true;
        for document in std::mem::take(&mut self.event_buffer) {
            self.handle_event(&document, now);
        }
    }
}

fn log_registry_error(err: &registry::Error) {
    match err {
        registry::Error::UuidCollision { .. } => log::warn!("{}", err),
        registry::Error::Uuid(_) => log::error!("{}", err),
    }
}
