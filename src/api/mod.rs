//! HTTP API over the simulation manager.
//!
//! Handlers only translate between HTTP and [`SimulationManager`] calls; the
//! lifecycle rules live in the manager. Error kinds map to status codes:
//!
//! | kind                 | status |
//! |----------------------|--------|
//! | `NotFound`           | 404    |
//! | `Conflict`           | 409    |
//! | `UnsupportedRequest` | 400    |
//! | internal             | 500    |

mod types;

use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::error::{ErrorKind, SimulationError};
use crate::simulation::{SimulationManager, SimulationParameters};

pub use types::{
    CreateResponse, DeleteResponse, ErrorResponse, ListResponse, ResultsQuery, SimulationModel,
    StateResponse, UpdateRequest,
};

type ApiResult<T> = Result<Json<T>, SimulationError>;

/// The simulation HTTP API.
pub struct SimulationApi;

impl SimulationApi {
    /// Build the axum router.
    pub fn router(manager: Arc<SimulationManager>) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route(
                "/transformations",
                get(list_simulations).post(create_simulation),
            )
            .route(
                "/transformations/{id}",
                get(get_simulation)
                    .patch(update_simulation)
                    .delete(delete_simulation),
            )
            .route("/transformations/{id}/state", get(get_simulation_state))
            .route("/results", get(get_results))
            .layer(TraceLayer::new_for_http())
            .with_state(manager)
    }

    /// Bind `addr` and serve until `shutdown` resolves.
    pub async fn serve<F>(
        manager: Arc<SimulationManager>,
        addr: &str,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = Self::router(manager);
        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("Simulation API listening on {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

impl IntoResponse for SimulationError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::UnsupportedRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => {
                tracing::error!("Internal error while handling request: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}

/// Malformed ids cannot name a simulation, so they are reported as missing.
fn parse_id(raw: &str) -> Result<Uuid, SimulationError> {
    Uuid::parse_str(raw).map_err(|_| SimulationError::not_found(raw))
}

// -- Handlers --

async fn health_check() -> &'static str {
    "simforge is up and running"
}

async fn create_simulation(
    State(manager): State<Arc<SimulationManager>>,
    Json(parameters): Json<SimulationParameters>,
) -> ApiResult<CreateResponse> {
    let id = manager.create_simulation(parameters).await?;
    Ok(Json(CreateResponse { id }))
}

async fn list_simulations(State(manager): State<Arc<SimulationManager>>) -> Json<ListResponse> {
    let items = manager
        .list_simulations()
        .await
        .into_iter()
        .map(SimulationModel::from)
        .collect();
    Json(ListResponse { items })
}

async fn get_simulation(
    State(manager): State<Arc<SimulationManager>>,
    Path(id): Path<String>,
) -> ApiResult<SimulationModel> {
    let info = manager.get_simulation(parse_id(&id)?).await?;
    Ok(Json(info.into()))
}

async fn update_simulation(
    State(manager): State<Arc<SimulationManager>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRequest>,
) -> ApiResult<StateResponse> {
    let id = parse_id(&id)?;
    let state = manager.update_simulation(id, req.state).await?;
    Ok(Json(StateResponse { id, state }))
}

async fn get_simulation_state(
    State(manager): State<Arc<SimulationManager>>,
    Path(id): Path<String>,
) -> ApiResult<StateResponse> {
    let id = parse_id(&id)?;
    let state = manager.get_simulation_state(id).await?;
    Ok(Json(StateResponse { id, state }))
}

async fn delete_simulation(
    State(manager): State<Arc<SimulationManager>>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResponse> {
    let id = parse_id(&id)?;
    manager.delete_simulation(id).await?;
    Ok(Json(DeleteResponse {
        status: format!("Simulation '{}' deleted successfully!", id),
    }))
}

async fn get_results(
    State(manager): State<Arc<SimulationManager>>,
    Query(query): Query<ResultsQuery>,
) -> Result<Response, SimulationError> {
    let id = parse_id(&query.dataset_name)?;

    let Some(path) = manager.get_simulation_output_path(id).await? else {
        return Ok(results_not_ready(id));
    };

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(simulation_id = %id, path = %path.display(), "Output bundle missing");
            return Ok(results_not_ready(id));
        }
        Err(e) => return Err(e.into()),
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.zip", id));

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

fn results_not_ready(id: Uuid) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            detail: format!("Results of simulation '{}' are not available", id),
        }),
    )
        .into_response()
}
