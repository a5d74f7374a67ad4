use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::domain::agent::{Agent, AgentStatus, Performance};

/// Request body for registering an agent
#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    /// Optional caller-chosen id; generated when absent
    pub agent_id: Option<Uuid>,
    pub capabilities: Vec<String>,
}

/// Request body for taking an idle agent offline or back online
#[derive(Debug, Deserialize)]
pub struct UpdateAgentStatusRequest {
    pub status: AgentStatus,
}

/// Agent as returned by the API
#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub id: Uuid,
    pub capabilities: BTreeSet<String>,
    pub status: AgentStatus,
    pub current_task: Option<Uuid>,
    pub performance: Performance,
    pub registered_at: DateTime<Utc>,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            capabilities: agent.capabilities,
            status: agent.status,
            current_task: agent.current_task,
            performance: agent.performance,
            registered_at: agent.registered_at,
        }
    }
}

/// Register a new agent
///
/// POST /api/v1/agents
pub async fn register_agent(
    State(dispatcher): State<AppState>,
    Json(req): Json<RegisterAgentRequest>,
) -> Result<(StatusCode, Json<AgentResponse>), ApiError> {
    if req.capabilities.iter().any(|c| c.trim().is_empty()) {
        return Err(ApiError::bad_request("Capabilities cannot be empty strings"));
    }

    let agent = match req.agent_id {
        Some(agent_id) => dispatcher.register_agent_with_id(agent_id, req.capabilities)?,
        None => dispatcher.register_agent(req.capabilities)?,
    };

    Ok((StatusCode::CREATED, Json(AgentResponse::from(agent))))
}

/// List all agents
///
/// GET /api/v1/agents
pub async fn list_agents(State(dispatcher): State<AppState>) -> Json<Vec<AgentResponse>> {
    Json(
        dispatcher
            .agents()
            .into_iter()
            .map(AgentResponse::from)
            .collect(),
    )
}

/// Get an agent by ID
///
/// GET /api/v1/agents/:id
pub async fn get_agent(
    State(dispatcher): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentResponse>, ApiError> {
    let agent = dispatcher.agent(id)?;
    Ok(Json(AgentResponse::from(agent)))
}

/// Change an idle agent's status
///
/// PUT /api/v1/agents/:id/status
pub async fn update_agent_status(
    State(dispatcher): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAgentStatusRequest>,
) -> Result<Json<AgentResponse>, ApiError> {
    let agent = dispatcher.set_agent_status(id, req.status)?;
    Ok(Json(AgentResponse::from(agent)))
}
