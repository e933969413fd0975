//! HTTP surface: submission, query, lifecycle control and log tailing.

use crate::error::ServerError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::{stream, StreamExt};
use joblib::{
    types::{JobId, Owner, NO_OWNER},
    Action, JobSpec, JobStatus,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/run", post(run_workflow))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(job_status).post(job_control))
        .route("/jobs/{id}/log", get(job_log))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RunParams {
    wf: Option<String>,
    data_type: Option<String>,
    owner: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ControlParams {
    action: Option<String>,
}

async fn run_workflow(
    State(state): State<Arc<AppState>>,
    params: Result<Query<RunParams>, QueryRejection>,
    headers: HeaderMap,
    input: Bytes,
) -> Result<Json<JobStatus>, ServerError> {
    let Query(params) = params.map_err(|rejection| ServerError::BadRequest(rejection.body_text()))?;
    let workflow_path = required(params.wf, "wf")?;
    let data_type = required(params.data_type, "data_type")?;
    let owner = match params.owner {
        Some(raw) => raw.parse::<Owner>().map_err(|_| {
            ServerError::BadRequest(format!("owner must be an integer, got `{raw}`"))
        })?,
        None => NO_OWNER,
    };
    let token = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ServerError::BadRequest("missing Authorization header".to_owned()))?
        .to_str()
        .map_err(|_| ServerError::BadRequest("Authorization header is not text".to_owned()))?
        .to_owned();

    let job = state
        .registry
        .admit(JobSpec {
            workflow_path,
            input,
            token,
            data_type,
            owner,
            name: params.name,
        })
        .await?;
    Ok(Json(job.status().await))
}

/// Stream every job's status as one JSON array.
async fn list_jobs(State(state): State<Arc<AppState>>) -> Response {
    let jobs = state.registry.list();
    let items = stream::iter(jobs.into_iter().enumerate()).then(|(index, job)| async move {
        let mut chunk = if index == 0 { Vec::new() } else { b", ".to_vec() };
        serde_json::to_writer_pretty(&mut chunk, &job.status().await)?;
        Ok::<_, serde_json::Error>(Bytes::from(chunk))
    });
    let body = stream::once(async { Ok(Bytes::from_static(b"[")) })
        .chain(items)
        .chain(stream::once(async { Ok(Bytes::from_static(b"]")) }));
    (
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(body),
    )
        .into_response()
}

async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatus>, ServerError> {
    let job = state.registry.get(parse_id(&id)?)?;
    Ok(Json(job.status().await))
}

async fn job_control(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    params: Result<Query<ControlParams>, QueryRejection>,
) -> Result<Json<JobStatus>, ServerError> {
    let Query(params) = params.map_err(|rejection| ServerError::BadRequest(rejection.body_text()))?;
    let job = state.registry.get(parse_id(&id)?)?;
    let status = match params.action {
        Some(action) => {
            let action = action
                .parse::<Action>()
                .map_err(|err| ServerError::BadRequest(err.to_string()))?;
            job.control(action).await
        }
        None => job.status().await,
    };
    Ok(Json(status))
}

async fn job_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let job = state.registry.get(parse_id(&id)?)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(job.tail()),
    )
        .into_response())
}

fn required(value: Option<String>, name: &str) -> Result<String, ServerError> {
    value
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ServerError::BadRequest(format!("missing query parameter `{name}`")))
}

fn parse_id(raw: &str) -> Result<JobId, ServerError> {
    raw.parse().map_err(|_| {
        ServerError::BadRequest(format!("job id must be a non-negative integer, got `{raw}`"))
    })
}
