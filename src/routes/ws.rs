//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::logic::*;
use crate::protocol::{to_out, ClientWsMessage, ServerWsMessage};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "osce_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "osce_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "osce_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "osce_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "osce_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartStation { language, chief_complaint, duration_secs } => {
      let language = language.unwrap_or_else(|| "en".into());
      let (station, origin) = state
        .start_station(&language, chief_complaint, duration_secs.unwrap_or(0))
        .await;
      tracing::info!(target: "station", id = %station.id, %language, %origin, "WS station started");
      ServerWsMessage::Station { station: to_out(&station) }
    }

    ClientWsMessage::PatientMessage { station_id, text } => {
      let text = patient_message(state, &station_id, &text).await;
      ServerWsMessage::PatientReply { text }
    }

    ClientWsMessage::Hint { station_id } => {
      let text = get_hint_text(state, &station_id).await;
      tracing::info!(target: "station", id = %station_id, "WS hint served");
      ServerWsMessage::Hint { text }
    }

    ClientWsMessage::SubmitDiagnosis { station_id, diagnosis } => {
      match evaluate_station(state, &station_id, &diagnosis).await {
        Ok(report) => {
          tracing::info!(target: "station", id = %station_id, overall = %format!("{:.1}", report.overall_pct), "WS evaluation served");
          ServerWsMessage::Evaluation { report }
        }
        Err(message) => ServerWsMessage::Error { message },
      }
    }

    ClientWsMessage::MarkSheet { station_id } => {
      match mark_sheet(state, &station_id).await {
        Ok(markdown) => ServerWsMessage::MarkSheet { markdown },
        Err(message) => ServerWsMessage::Error { message },
      }
    }

    ClientWsMessage::TimerStatus { station_id } => {
      match state.get_station(&station_id).await {
        Some(st) => ServerWsMessage::Timer {
          remaining_secs: st.timer.remaining_secs(),
          expired: st.timer.expired(),
        },
        None => ServerWsMessage::Error { message: format!("Unknown stationId: {}", station_id) },
      }
    }
  }
}
