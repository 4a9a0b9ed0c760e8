use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{info, instrument, instrument::WithSubscriber, Dispatch};

use crate::error::ReceiverError;
use crate::ids::{IdGenerator, UuidV4Generator};
use crate::store::{record_key, StorageSink};
use crate::time::{iso8601, Clock, SystemClock};
use crate::types::{Endpoints, Health, IngestAck, ServiceInfo, WebhookRecord};

/// Source tag stamped on every record; also the storage namespace.
pub const SOURCE: &str = "freshdesk";
pub const SERVICE_NAME: &str = "Freshdesk Webhook Endpoint";
pub const HEALTH_PATH: &str = "/health";
pub const WEBHOOK_PATH: &str = "/webhooks/freshdesk";
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Request handling state. Immutable once built and cheap to clone;
/// every collaborator is injected.
#[derive(Clone)]
pub struct Receiver {
    sink: Arc<dyn StorageSink>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    dispatch: Dispatch,
    max_body_bytes: usize,
}

impl Receiver {
    /// Receiver with the wall clock, random v4 ids and logging switched off.
    pub fn new(sink: Arc<dyn StorageSink>) -> Self {
        Self {
            sink,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidV4Generator),
            dispatch: Dispatch::none(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Every request served by [`Receiver::router`] logs through `dispatch`.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn router(self) -> Router {
        let dispatch = self.dispatch.clone();
        let limit = self.max_body_bytes;

        Router::new()
            .route("/", get(service_info))
            .route(HEALTH_PATH, get(health))
            .route(WEBHOOK_PATH, post(ingest_webhook))
            .layer(DefaultBodyLimit::max(limit))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TraceLayer::new_for_http())
            .layer(middleware::from_fn_with_state(dispatch, within_dispatch))
            .with_state(self)
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }

    /// Parse, tag and persist one webhook body.
    ///
    /// Nothing is written when the body is not JSON. When the sink fails the
    /// error is returned as is and no acknowledgement is produced.
    pub async fn ingest(&self, body: &[u8]) -> Result<IngestAck, ReceiverError> {
        let payload: serde_json::Value = serde_json::from_slice(body)?;

        let request_id = self.ids.next_id().to_string();
        let timestamp = iso8601(self.clock.now());

        let record = WebhookRecord {
            request_id: request_id.clone(),
            timestamp: timestamp.clone(),
            source: SOURCE.to_string(),
            payload,
        };
        let bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| ReceiverError::Unexpected(format!("failed to serialize record: {e}")))?;

        let key = record_key(SOURCE, &request_id);
        self.sink.put(&key, bytes).await?;

        info!(request_id = %request_id, key = %key, "Received webhook");

        Ok(IngestAck {
            status: "success".to_string(),
            request_id,
            timestamp,
        })
    }
}

async fn within_dispatch(State(dispatch): State<Dispatch>, req: Request, next: Next) -> Response {
    next.run(req).with_subscriber(dispatch).await
}

/// A panic anywhere below the router becomes a generic 500.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ReceiverError::Unexpected(format!("panic while handling request: {message}")).into_response()
}

async fn health(State(rx): State<Receiver>) -> Json<Health> {
    Json(Health {
        status: "healthy".to_string(),
        timestamp: iso8601(rx.clock.now()),
    })
}

async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: Endpoints {
            health: HEALTH_PATH.to_string(),
            webhook: WEBHOOK_PATH.to_string(),
        },
    })
}

#[instrument(name = "ingest_webhook", skip_all, fields(content_length = body.len()))]
async fn ingest_webhook(
    State(rx): State<Receiver>,
    body: Bytes,
) -> Result<Json<IngestAck>, ReceiverError> {
    rx.ingest(&body).await.map(Json)
}
