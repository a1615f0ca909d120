use crate::errors::AppError;
use crate::metrics::ChartRange;
use crate::models::{Dashboard, Entry, LogForm, LogRequest};
use crate::state::{AppState, StoreState};
use crate::storage::persist_store;
use crate::sync::{BootReport, SyncState};
use crate::ui::render_index;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    Html(render_index(&session.dashboard()))
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub range: Option<String>,
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Dashboard>, AppError> {
    let mut session = state.session.lock().await;
    if let Some(raw) = query.range {
        let range: ChartRange = raw.parse()?;
        session.set_range(range);
    }
    Ok(Json(session.dashboard()))
}

pub async fn get_entries(State(state): State<AppState>) -> Json<Vec<Entry>> {
    let session = state.session.lock().await;
    Json(session.entries())
}

pub async fn get_status(State(state): State<AppState>) -> Json<SyncState> {
    Json(state.status.borrow().clone())
}

pub async fn log(
    State(state): State<AppState>,
    Json(payload): Json<LogRequest>,
) -> Result<Json<Entry>, AppError> {
    let entry = payload.into_entry(today());
    Ok(Json(apply_log(&state, entry).await?))
}

pub async fn log_form(
    State(state): State<AppState>,
    Form(form): Form<LogForm>,
) -> Result<Redirect, AppError> {
    apply_log(&state, form.into_entry(today())).await?;
    Ok(Redirect::to("/"))
}

async fn apply_log(state: &AppState, entry: Entry) -> Result<Entry, AppError> {
    if !entry.has_measurement() {
        return Err(AppError::bad_request("at least one measurement is required"));
    }
    let mut session = state.session.lock().await;
    Ok(session.log_entry(entry).await)
}

pub async fn export(State(state): State<AppState>) -> Result<Response, AppError> {
    let session = state.session.lock().await;
    let document = session.export(today())?;
    let headers = [
        (header::CONTENT_TYPE, "application/json".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", document.file_name),
        ),
    ];
    Ok((headers, document.body).into_response())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResponse {
    pub count: usize,
}

pub async fn import(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportResponse>, AppError> {
    let mut session = state.session.lock().await;
    let count = session.import(&body).await?;
    Ok(Json(ImportResponse { count }))
}

/// The remote fetch runs with the session unlocked so a slow remote only
/// stalls this request.
pub async fn refresh(State(state): State<AppState>) -> Json<BootReport> {
    let fetch = state.session.lock().await.remote_fetch();
    let fetched = fetch.run().await;
    let mut session = state.session.lock().await;
    Json(session.finish_refresh(fetched).await)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub async fn get_data(State(state): State<StoreState>) -> Json<Vec<Entry>> {
    let entries = state.entries.lock().await;
    Json(entries.clone())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PutResponse {
    pub ok: bool,
    pub count: usize,
    pub synced: DateTime<Utc>,
}

pub async fn put_data(State(state): State<StoreState>, Json(payload): Json<Value>) -> Response {
    if !payload.is_array() {
        return bad_json("Expected JSON array");
    }
    let entries: Vec<Entry> = match serde_json::from_value(payload) {
        Ok(entries) => entries,
        Err(err) => return bad_json(&err.to_string()),
    };

    let mut stored = state.entries.lock().await;
    if let Err(err) = persist_store(&state.data_path, &entries).await {
        return AppError::from(err).into_response();
    }
    let count = entries.len();
    *stored = entries;
    info!("stored {count} entries");

    Json(PutResponse {
        ok: true,
        count,
        synced: Utc::now(),
    })
    .into_response()
}

pub async fn health(State(state): State<StoreState>) -> Json<Value> {
    let entries = state.entries.lock().await;
    Json(json!({ "status": "ok", "entries": entries.len() }))
}

fn bad_json(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::remote::HttpRemote;
    use crate::session::Session;
    use crate::sync::SyncPhase;
    use crate::testing::temp_dir;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    /// A remote that accepts connections and never answers.
    async fn silent_remote() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn hanging_refresh_leaves_other_requests_responsive() {
        let remote_url = silent_remote().await;
        let dir = temp_dir("handlers-hang");
        let config = AppConfig {
            data_dir: dir.clone(),
            seed_path: dir.join("missing-seed.json"),
            remote_url: remote_url.clone(),
            ..AppConfig::from_lookup(|_| None).unwrap()
        };
        let session = Session::new(&config, HttpRemote::new(&remote_url).unwrap());
        let state = AppState::new(session);

        let pending = tokio::spawn(refresh(State(state.clone())));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let status = timeout(Duration::from_secs(2), get_status(State(state.clone())))
            .await
            .expect("status stalled behind refresh");
        assert_eq!(status.0.phase, SyncPhase::Syncing);

        let entries = timeout(Duration::from_secs(2), get_entries(State(state.clone())))
            .await
            .expect("entries stalled behind refresh");
        assert!(entries.0.is_empty());

        let request = LogRequest {
            weight: Some(json!(91.5)),
            ..LogRequest::default()
        };
        let logged = timeout(Duration::from_secs(2), log(State(state.clone()), Json(request)))
            .await
            .expect("log stalled behind refresh")
            .unwrap();
        assert_eq!(logged.0.weight, Some(91.5));

        assert!(!pending.is_finished());
        pending.abort();
    }
}
