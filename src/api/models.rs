use crate::sample::CounterSample;

#[derive(Debug, serde::Serialize)]
pub struct SampleList {
    pub count: usize,
    pub samples: Vec<CounterSample>,
}

impl From<Vec<CounterSample>> for SampleList {
    fn from(samples: Vec<CounterSample>) -> Self {
        Self {
            count: samples.len(),
            samples,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ErrorBody {
    pub error: String,
}
