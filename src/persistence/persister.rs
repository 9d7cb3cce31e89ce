use crate::sample::CounterSample;

use super::Result;

pub trait SamplePersister {
    fn persist_sample(
        &self,
        sample: &CounterSample,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
