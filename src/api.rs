use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::ToSocketAddrs;

use crate::container::ContainerUuid;
use crate::sample::SampleStore;

mod models;

async fn list_samples(store: State<SampleStore>) -> Response {
    let body = models::SampleList::from(store.all());
    (StatusCode::OK, Json(body)).into_response()
}

async fn get_sample(store: State<SampleStore>, Path(uuid): Path<String>) -> Response {
    let uuid = match ContainerUuid::from_str(&uuid) {
        Ok(uuid) => uuid,
        Err(err) => {
            log::debug!("rejecting sample lookup: {}", err);
            return error(StatusCode::BAD_REQUEST, err.to_string());
        }
    };
    match store.get(&uuid) {
        Some(sample) => (StatusCode::OK, Json(sample)).into_response(),
        None => error(StatusCode::NOT_FOUND, format!("no sample for {uuid}")),
    }
}

fn error(status: StatusCode, message: String) -> Response {
    (status, Json(models::ErrorBody { error: message })).into_response()
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new(store: SampleStore) -> Self {
        let router = axum::Router::new()
            .route("/samples", get(list_samples))
            .route("/samples/{uuid}", get(get_sample))
            .with_state(store);
        Self { router }
    }

    /// Serves the read API until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns an error if `addr` cannot be bound or serving fails.
    pub async fn listen(self, addr: impl ToSocketAddrs) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router.into_make_service()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ContainerID;
    use crate::registry::Container;
    use crate::sample::{CounterSample, Telemetry};

    const ID: &str = "2e781c0358b9940f7bc8399903b5af0d1f6a";

    fn store_with_sample() -> (SampleStore, ContainerUuid) {
        let id = ContainerID::new(ID).unwrap();
        let uuid = ContainerUuid::derive(&id).unwrap();
        let sample = CounterSample::new(&Container::new(id, uuid), "web".to_owned(), "", 1);
        let store = SampleStore::default();
        store.apply(Telemetry::Sample(sample));
        (store, uuid)
    }

    #[tokio::test]
    async fn test_get_sample_by_uuid() {
        let (store, uuid) = store_with_sample();
        let response = get_sample(State(store), Path(uuid.to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_unknown_sample() {
        let (store, _) = store_with_sample();
        let other = ContainerUuid::new([0xff; 16]);
        let response = get_sample(State(store), Path(other.to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_sample_with_malformed_uuid() {
        let (store, _) = store_with_sample();
        let response = get_sample(State(store), Path("not-a-uuid".to_owned())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_samples() {
        let (store, _) = store_with_sample();
        let response = list_samples(State(store)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
