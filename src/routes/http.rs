//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_start_station(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartStationIn>,
) -> impl IntoResponse {
  let language = body.language.unwrap_or_else(|| "en".into());
  let (station, origin) = state
    .start_station(&language, body.chief_complaint, body.duration_secs.unwrap_or(0))
    .await;
  info!(target: "station", id = %station.id, %language, %origin, "HTTP station started");
  Json(to_out(&station))
}

#[instrument(level = "info", skip(state), fields(%id))]
pub async fn http_get_station(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> impl IntoResponse {
  match state.get_station(&id).await {
    Some(st) => Json(to_out(&st)).into_response(),
    None => (
      StatusCode::NOT_FOUND,
      Json(ErrorOut { message: format!("Unknown stationId: {}", id) }),
    )
      .into_response(),
  }
}

#[instrument(level = "info", skip(state, body), fields(%body.station_id, text_len = body.text.len()))]
pub async fn http_patient_message(
  State(state): State<Arc<AppState>>,
  Json(body): Json<PatientMessageIn>,
) -> impl IntoResponse {
  let text = patient_message(&state, &body.station_id, &body.text).await;
  Json(PatientMessageOut { text })
}

#[instrument(level = "info", skip(state), fields(%q.station_id))]
pub async fn http_get_hint(
  State(state): State<Arc<AppState>>,
  Query(q): Query<HintQuery>,
) -> impl IntoResponse {
  let text = get_hint_text(&state, &q.station_id).await;
  info!(target: "station", id = %q.station_id, "HTTP hint served");
  Json(HintOut { text })
}

#[instrument(level = "info", skip(state, body), fields(%body.station_id, dx_len = body.diagnosis.len()))]
pub async fn http_evaluate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<EvaluateIn>,
) -> impl IntoResponse {
  match evaluate_station(&state, &body.station_id, &body.diagnosis).await {
    Ok(report) => {
      info!(target: "station", id = %body.station_id, overall = %format!("{:.1}", report.overall_pct), "HTTP evaluation served");
      Json(report).into_response()
    }
    Err(message) => {
      (StatusCode::NOT_FOUND, Json(ErrorOut { message })).into_response()
    }
  }
}

#[instrument(level = "info", skip(state), fields(%q.station_id))]
pub async fn http_mark_sheet(
  State(state): State<Arc<AppState>>,
  Query(q): Query<MarkSheetQuery>,
) -> impl IntoResponse {
  match mark_sheet(&state, &q.station_id).await {
    Ok(markdown) => Json(MarkSheetOut { markdown }).into_response(),
    Err(message) => (StatusCode::NOT_FOUND, Json(ErrorOut { message })).into_response(),
  }
}

#[instrument(level = "info", skip(state), fields(%q.station_id))]
pub async fn http_timer(
  State(state): State<Arc<AppState>>,
  Query(q): Query<TimerQuery>,
) -> impl IntoResponse {
  match state.get_station(&q.station_id).await {
    Some(st) => Json(TimerOut {
      remaining_secs: st.timer.remaining_secs(),
      expired: st.timer.expired(),
    })
    .into_response(),
    None => (
      StatusCode::NOT_FOUND,
      Json(ErrorOut { message: format!("Unknown stationId: {}", q.station_id) }),
    )
      .into_response(),
  }
}
