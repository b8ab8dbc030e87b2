//! HTTP boundary: `GET /weather` over warp.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use ipweather_core::ServiceError;
use ipweather_store::{StoreClient, StoreConnector};
use serde::Serialize;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

use crate::client_ip::extract_client_ip;
use crate::orchestrator::{RequestOrchestrator, Resolution};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// Everything a request handler needs, shared across connections.
pub struct AppState<C> {
    orchestrator: RequestOrchestrator,
    connector: Arc<C>,
}

impl<C: StoreConnector> AppState<C> {
    pub fn new(orchestrator: RequestOrchestrator, connector: Arc<C>) -> Self {
        Self {
            orchestrator,
            connector,
        }
    }

    /// Open this request's store connection and run the pipeline on it.
    ///
    /// The connection is dropped when this returns, whatever the outcome.
    pub async fn process(&self, ip: &str) -> Result<Resolution, ServiceError> {
        let store = StoreClient::connect(Arc::clone(&self.connector)).await?;
        self.orchestrator.handle(&store, ip, Utc::now()).await
    }
}

/// The `GET /weather` route.
pub fn routes<C: StoreConnector>(
    state: Arc<AppState<C>>,
) -> impl Filter<Extract = (WithStatus<Json>,), Error = warp::Rejection> + Clone {
    let state = warp::any().map(move || Arc::clone(&state));

    warp::get()
        .and(warp::path("weather"))
        .and(warp::path::end())
        .and(warp::header::optional::<String>("x-forwarded-for"))
        .and(warp::header::optional::<String>("x-real-ip"))
        .and(warp::addr::remote())
        .and(state)
        .and_then(weather_handler::<C>)
}

async fn weather_handler<C: StoreConnector>(
    forwarded_for: Option<String>,
    real_ip: Option<String>,
    peer: Option<SocketAddr>,
    state: Arc<AppState<C>>,
) -> Result<WithStatus<Json>, Infallible> {
    let Some(ip) = extract_client_ip(forwarded_for.as_deref(), real_ip.as_deref(), peer) else {
        tracing::warn!("Rejecting request with no usable client address");
        return Ok(error_reply(&ServiceError::InvalidClient));
    };

    tracing::info!("Received request from {}", ip);

    let reply = match state.process(&ip).await {
        Ok(resolution) => warp::reply::with_status(warp::reply::json(&resolution.result), StatusCode::OK),
        Err(e) => {
            if let ServiceError::Database(ref db) = e {
                tracing::error!("Store failure while serving {}: {}", ip, db);
            }
            error_reply(&e)
        }
    };
    Ok(reply)
}

fn error_reply(err: &ServiceError) -> WithStatus<Json> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    warp::reply::with_status(
        warp::reply::json(&ErrorBody {
            error: err.user_message(),
        }),
        status,
    )
}

/// Serve until `shutdown` resolves.
pub async fn serve<C, F>(state: AppState<C>, addr: SocketAddr, shutdown: F) -> Result<(), warp::Error>
where
    C: StoreConnector,
    F: Future<Output = ()> + Send + 'static,
{
    let (bound, server) =
        warp::serve(routes(Arc::new(state))).try_bind_with_graceful_shutdown(addr, shutdown)?;
    tracing::info!("Listening on http://{}", bound);
    server.await;
    tracing::info!("Server stopped");
    Ok(())
}
