use std::sync::Arc;

use dashmap::DashMap;

use crate::container::ContainerUuid;

use super::{CounterSample, Telemetry};

/// Latest counter sample of every live container, shared with the read API.
#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    samples: Arc<DashMap<ContainerUuid, CounterSample>>,
}

impl SampleStore {
    pub fn apply(&self, telemetry: Telemetry) {
        match telemetry {
            Telemetry::Sample(sample) => {
                self.samples.insert(sample.uuid, sample);
            }
            Telemetry::Retired(uuid) => {
                self.samples.remove(&uuid);
            }
        }
    }

    pub fn get(&self, uuid: &ContainerUuid) -> Option<CounterSample> {
        self.samples.get(uuid).map(|entry| entry.value().clone())
    }

    /// All samples, ordered by reported host name.
    pub fn all(&self) -> Vec<CounterSample> {
        let mut out: Vec<CounterSample> = self
            .samples
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        out.sort_by(|a, b| a.hostname.cmp(&b.hostname));
        out
    }

    pub fn size(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerID;
    use crate::registry::Container;

    fn sample(id: &str, name: &str, ts: u64) -> CounterSample {
        let id = ContainerID::new(id).unwrap();
        let uuid = ContainerUuid::derive(&id).unwrap();
        CounterSample::new(&Container::new(id, uuid), name.to_owned(), "", ts)
    }

    #[test]
    fn test_latest_sample_wins_and_retire_removes() {
        let store = SampleStore::default();
        let a = sample(&"a".repeat(64), "alpha", 1);
        let b = sample(&"b".repeat(64), "beta", 1);
        store.apply(Telemetry::Sample(b.clone()));
        store.apply(Telemetry::Sample(a.clone()));
        store.apply(Telemetry::Sample(sample(&"a".repeat(64), "alpha", 2)));

        assert_eq!(store.size(), 2);
        assert_eq!(store.get(&a.uuid).unwrap().timestamp, 2);
        let names: Vec<String> = store.all().into_iter().map(|s| s.hostname).collect();
        assert_eq!(names, vec!["alpha".to_owned(), "beta".to_owned()]);

        store.apply(Telemetry::Retired(a.uuid));
        assert!(store.get(&a.uuid).is_none());
        assert_eq!(store.size(), 1);
    }
}
