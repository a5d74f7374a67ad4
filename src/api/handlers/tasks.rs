use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::api::AppState;
use crate::dispatch::events::RecordedEvent;
use crate::dispatch::progress::{aggregate_status, TaskFilter, TaskProgress};
use crate::dispatch::{Assignment, MetricsOutcome};
use crate::domain::task::{Subtask, SubtaskSpec, SubtaskStatus, Task, TaskStatus, DEFAULT_PRIORITY};

/// Events returned by the recent events endpoint when no limit is given
const DEFAULT_EVENT_LIMIT: usize = 100;

/// Request body for creating a task
///
/// The title defaults to the description.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: String,
    #[serde(default = "default_task_priority")]
    pub priority: u32,
}

fn default_task_priority() -> u32 {
    DEFAULT_PRIORITY
}

/// Query parameters of the recent events endpoint
#[derive(Debug, Deserialize)]
pub struct RecentEventsQuery {
    pub limit: Option<usize>,
}

/// Request body for assigning agents to a task
///
/// Without `subtasks`, the task's pending subtasks are retried.
#[derive(Debug, Deserialize)]
pub struct AssignTaskRequest {
    #[serde(default)]
    pub subtasks: Option<Vec<SubtaskSpec>>,
}

/// Request body for a subtask status update
#[derive(Debug, Deserialize)]
pub struct UpdateSubtaskStatusRequest {
    pub status: SubtaskStatus,
    pub result: Option<serde_json::Value>,
}

/// Request body for a subtask result report
#[derive(Debug, Deserialize)]
pub struct ReportResultRequest {
    pub agent_id: Uuid,
    pub success: bool,
    pub execution_time: f64,
    pub result: Option<serde_json::Value>,
}

/// Task as returned by the API
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: u32,
    pub status: TaskStatus,
    pub subtasks: Vec<Subtask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id(),
            title: task.title().to_string(),
            description: task.description().to_string(),
            priority: task.priority(),
            status: aggregate_status(task.subtasks()),
            subtasks: task.subtasks().to_vec(),
            created_at: task.created_at(),
            updated_at: task.updated_at(),
        }
    }
}

/// Response from an assignment call
#[derive(Debug, Serialize)]
pub struct AssignmentResponse {
    pub task_id: Uuid,
    pub assignments: Assignment,
    /// Subtask types that found no eligible agent
    pub unassigned: Vec<String>,
}

/// Create a task by decomposing its description
///
/// POST /api/v1/tasks
pub async fn create_task(
    State(dispatcher): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), ApiError> {
    let title = req.title.as_deref().unwrap_or(&req.description);
    let task = dispatcher
        .create_task_with_details(title, &req.description, req.priority)
        .await?;

    Ok((StatusCode::CREATED, Json(TaskResponse::from(&task))))
}

/// List tasks, optionally filtered by derived status and priority
///
/// GET /api/v1/tasks?status=in_progress&priority=1
pub async fn list_tasks(
    State(dispatcher): State<AppState>,
    Query(filter): Query<TaskFilter>,
) -> Json<Vec<TaskResponse>> {
    Json(
        dispatcher
            .tasks(&filter)
            .iter()
            .map(TaskResponse::from)
            .collect(),
    )
}

/// Get a task by ID
///
/// GET /api/v1/tasks/:id
pub async fn get_task(
    State(dispatcher): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = dispatcher.task(id)?;
    Ok(Json(TaskResponse::from(&task)))
}

/// Assign agents to a task's subtasks
///
/// POST /api/v1/tasks/:id/assign
pub async fn assign_task(
    State(dispatcher): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignTaskRequest>,
) -> Result<Json<AssignmentResponse>, ApiError> {
    let (assignments, unassigned) = match req.subtasks {
        Some(subtasks) => {
            let requested: Vec<String> = subtasks.iter().map(|s| s.kind.clone()).collect();
            let assignments = dispatcher.assign_subtasks(id, subtasks)?;
            let unassigned = assignments
                .missing(requested.iter().map(String::as_str))
                .into_iter()
                .map(str::to_string)
                .collect();
            (assignments, unassigned)
        }
        None => {
            let assignments = dispatcher.assign_pending(id)?;
            let mut unassigned: Vec<String> = Vec::new();
            for subtask in dispatcher.task(id)?.subtasks() {
                if subtask.status() == SubtaskStatus::Pending
                    && !unassigned.iter().any(|kind| kind == subtask.kind())
                {
                    unassigned.push(subtask.kind().to_string());
                }
            }
            (assignments, unassigned)
        }
    };

    Ok(Json(AssignmentResponse {
        task_id: id,
        assignments,
        unassigned,
    }))
}

/// Get the aggregate progress of a task
///
/// GET /api/v1/tasks/:id/status
pub async fn task_status(
    State(dispatcher): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskProgress>, ApiError> {
    let progress = dispatcher.task_progress(id)?;
    Ok(Json(progress))
}

/// Record a non-terminal subtask status change
///
/// `pending` unassigns the subtask and releases its agent.
///
/// PUT /api/v1/tasks/:id/subtasks/:subtask_id/status
pub async fn update_subtask_status(
    State(dispatcher): State<AppState>,
    Path((id, subtask_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateSubtaskStatusRequest>,
) -> Result<StatusCode, ApiError> {
    if req.status.is_terminal() {
        return Err(ApiError::bad_request(
            "Terminal statuses must be reported through the result endpoint",
        ));
    }

    dispatcher.record_subtask_status(id, subtask_id, req.status, req.result)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Report the result of a subtask and update the agent's metrics
///
/// POST /api/v1/tasks/:id/subtasks/:subtask_id/result
pub async fn report_result(
    State(dispatcher): State<AppState>,
    Path((id, subtask_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ReportResultRequest>,
) -> Result<Json<MetricsOutcome>, ApiError> {
    let outcome = dispatcher.report_subtask_result(
        req.agent_id,
        id,
        subtask_id,
        req.success,
        req.execution_time,
        req.result,
    )?;
    Ok(Json(outcome))
}

/// Get the retained event history of a task
///
/// GET /api/v1/tasks/:id/events
pub async fn task_events(
    State(dispatcher): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RecordedEvent>>, ApiError> {
    let events = dispatcher.task_events(id)?;
    Ok(Json(events))
}

/// Get the most recent events across all tasks and agents
///
/// GET /api/v1/events?limit=50
pub async fn recent_events(
    State(dispatcher): State<AppState>,
    Query(query): Query<RecentEventsQuery>,
) -> Json<Vec<RecordedEvent>> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    Json(dispatcher.recent_events(limit))
}
