//! Index of tracked containers and their display-name bookkeeping.

mod container;
mod error;
mod names;

use std::collections::HashMap;

pub use container::{Container, MAX_HOSTNAME_LEN, NameSource};
pub use error::{Error, Result};
pub use names::NameCounts;

use crate::container::{ContainerID, ContainerUuid};

/// All live containers, keyed by engine id and by derived uuid.
#[derive(Debug, Default)]
pub struct Registry {
    containers: HashMap<ContainerID, Container>,
    by_uuid: HashMap<ContainerUuid, ContainerID>,
    names: NameCounts,
    hostnames: NameCounts,
    dup_names: usize,
    dup_hostnames: usize,
}

impl Registry {
    /// Looks up the container with engine id `id`.
    ///
    /// If there is none and `create` is set, a new container is registered; with
    /// `warn_if_missing` its creation is reported as a missed event.
    ///
    /// # Errors
    ///
    /// Creation fails if no uuid can be derived from `id` or if the derived uuid is
    /// already taken by another live container. Nothing is registered in that case.
    pub fn lookup_or_create(
        &mut self,
        id: &str,
        create: bool,
        warn_if_missing: bool,
    ) -> Result<Option<&mut Container>> {
        if self.containers.contains_key(id) {
            return Ok(self.containers.get_mut(id));
        }
        if !create {
            return Ok(None);
        }

        let id = ContainerID::new(id)?;
        let uuid = ContainerUuid::derive(&id)?;
        if let Some(existing) = self.by_uuid.get(&uuid) {
            return Err(Error::UuidCollision {
                uuid,
                id: id.to_string(),
                existing: existing.to_string(),
            });
        }
        if warn_if_missing {
            log::warn!("found running container not announced by an event: {}", id);
        }
        log::debug!("tracking container {} uuid={}", id, uuid);

        self.by_uuid.insert(uuid, id.clone());
        Ok(Some(
            self.containers
                .entry(id.clone())
                .or_insert_with(|| Container::new(id, uuid)),
        ))
    }

    pub fn get(&self, id: &str) -> Option<&Container> {
        self.containers.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Container> {
        self.containers.get_mut(id)
    }

    pub fn by_uuid(&self, uuid: &ContainerUuid) -> Option<&Container> {
        self.by_uuid
            .get(uuid)
            .and_then(|id| self.containers.get(id.as_ref()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Container> {
        self.containers.values_mut()
    }

    /// Deregisters a container and gives back its names.
    pub fn remove(&mut self, id: &str) -> Option<Container> {
        let container = self.containers.remove(id)?;
        self.by_uuid.remove(&container.uuid());
        if let Some(name) = container.name() {
            self.names.release(name);
        }
        if let Some(hostname) = container.hostname() {
            self.hostnames.release(hostname);
        }
        if container.is_duplicate_name() {
            self.dup_names -= 1;
        }
        if container.is_duplicate_hostname() {
            self.dup_hostnames -= 1;
        }
        log::debug!(
            "removed container {}={} (lastEvent={:?}, state={})",
            container.name().unwrap_or("-"),
            container.id(),
            container.last_event,
            container.state
        );
        Some(container)
    }

    /// Sets the display name; a leading `/` as used by the engine is dropped.
    pub fn set_name(&mut self, id: &str, name: &str) {
        let name = name.strip_prefix('/').unwrap_or(name);
        self.set_label(id, NameSource::Name, name);
    }

    pub fn set_hostname(&mut self, id: &str, hostname: &str) {
        self.set_label(id, NameSource::Hostname, hostname);
    }

    fn set_label(&mut self, id: &str, source: NameSource, value: &str) {
        let Some(container) = self.containers.get_mut(id) else {
            return;
        };
        let (label, _) = container.label_mut(source);
        if label.as_deref() == Some(value) {
            return;
        }
        let previous = label.replace(value.to_owned());

        let (counts, dups) = match source {
            NameSource::Name => (&mut self.names, &mut self.dup_names),
            NameSource::Hostname => (&mut self.hostnames, &mut self.dup_hostnames),
        };
        if let Some(previous) = previous {
            counts.release(&previous);
        }
        if counts.acquire(value) > 1 {
            // flags stick until the container is removed
            for other in self.containers.values_mut() {
                let (label, dup) = other.label_mut(source);
                if label.as_deref() == Some(value) && !*dup {
                    *dup = true;
                    *dups += 1;
                }
            }
        }
    }

    /// Number of live containers using `name`.
    pub fn name_count(&self, name: &str) -> usize {
        self.names.count(name)
    }

    pub fn hostname_count(&self, hostname: &str) -> usize {
        self.hostnames.count(hostname)
    }

    pub fn distinct_names(&self) -> usize {
        self.names.len()
    }

    pub fn distinct_hostnames(&self) -> usize {
        self.hostnames.len()
    }

    /// Containers currently flagged as duplicate by name.
    pub fn duplicate_names(&self) -> usize {
        self.dup_names
    }

    pub fn duplicate_hostnames(&self) -> usize {
        self.dup_hostnames
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Forgets every container, returning the removed records.
    pub fn clear(&mut self) -> Vec<Container> {
        self.by_uuid.clear();
        self.names.clear();
        self.hostnames.clear();
        self.dup_names = 0;
        self.dup_hostnames = 0;
        self.containers.drain().map(|(_, c)| c).collect()
    }
}
