//! Request and response DTOs for the simulation API.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::simulation::{SimulationInfo, SimulationParameters, SimulationState, StateTransition};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimulationModel {
    pub id: Uuid,
    pub parameters: SimulationParameters,
    pub state: SimulationState,
    #[serde(default)]
    pub transitions: Vec<StateTransition>,
}

impl From<SimulationInfo> for SimulationModel {
    fn from(info: SimulationInfo) -> Self {
        Self {
            id: info.id,
            parameters: info.parameters,
            state: info.state,
            transitions: info.transitions,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub items: Vec<SimulationModel>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    /// Only `RUNNING` and `STOPPED` are accepted.
    pub state: SimulationState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StateResponse {
    pub id: Uuid,
    pub state: SimulationState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    #[serde(default)]
    pub collection_name: Option<String>,
    /// Id of the simulation whose bundle is requested.
    pub dataset_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
