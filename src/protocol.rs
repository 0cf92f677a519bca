//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.
//!
//! Note: the student-facing station DTO deliberately excludes the answer key
//! and physical findings — the only scoring surfaces the presentation layer
//! gets are the `EvaluationReport` and the rendered mark sheet.

use serde::{Deserialize, Serialize};

use crate::domain::{CaseSource, PatientInfo, Station};
use crate::eval::EvaluationReport;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartStation {
        #[serde(default)]
        language: Option<String>,
        #[serde(default, rename = "chiefComplaint")]
        chief_complaint: Option<String>,
        #[serde(default, rename = "durationSecs")]
        duration_secs: Option<u64>,
    },
    PatientMessage {
        #[serde(rename = "stationId")]
        station_id: String,
        text: String,
    },
    Hint {
        #[serde(rename = "stationId")]
        station_id: String,
    },
    SubmitDiagnosis {
        #[serde(rename = "stationId")]
        station_id: String,
        diagnosis: String,
    },
    MarkSheet {
        #[serde(rename = "stationId")]
        station_id: String,
    },
    TimerStatus {
        #[serde(rename = "stationId")]
        station_id: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Station {
        station: StationOut,
    },
    PatientReply {
        text: String,
    },
    Hint {
        text: String,
    },
    Evaluation {
        report: EvaluationReport,
    },
    MarkSheet {
        markdown: String,
    },
    Timer {
        #[serde(rename = "remainingSecs")]
        remaining_secs: u64,
        expired: bool,
    },
    Error {
        message: String,
    },
}

/// DTO used by both WS and HTTP for station delivery.
#[derive(Debug, Serialize)]
pub struct StationOut {
    pub id: String,
    pub language: String,
    pub source: CaseSource,
    #[serde(rename = "chiefComplaint")]
    pub chief_complaint: String,
    pub patient: PatientInfo,
    #[serde(rename = "durationSecs")]
    pub duration_secs: u64,
    #[serde(rename = "remainingSecs")]
    pub remaining_secs: u64,
    pub evaluated: bool,
}

/// Convert a full `Station` (internal) to the public DTO.
pub fn to_out(st: &Station) -> StationOut {
    StationOut {
        id: st.id.clone(),
        language: st.language.clone(),
        source: st.source,
        chief_complaint: st.case.chief_complaint.clone(),
        patient: st.case.patient_info.clone(),
        duration_secs: st.timer.duration_secs,
        remaining_secs: st.timer.remaining_secs(),
        evaluated: st.report.is_some(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize, Default)]
pub struct StartStationIn {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default, rename = "chiefComplaint")]
    pub chief_complaint: Option<String>,
    #[serde(default, rename = "durationSecs")]
    pub duration_secs: Option<u64>,
}

#[derive(Deserialize)]
pub struct PatientMessageIn {
    #[serde(rename = "stationId")]
    pub station_id: String,
    pub text: String,
}
#[derive(Serialize)]
pub struct PatientMessageOut {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct HintQuery {
    #[serde(rename = "stationId")]
    pub station_id: String,
}
#[derive(Serialize)]
pub struct HintOut {
    pub text: String,
}

#[derive(Deserialize)]
pub struct EvaluateIn {
    #[serde(rename = "stationId")]
    pub station_id: String,
    pub diagnosis: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkSheetQuery {
    #[serde(rename = "stationId")]
    pub station_id: String,
}
#[derive(Serialize)]
pub struct MarkSheetOut {
    pub markdown: String,
}

#[derive(Debug, Deserialize)]
pub struct TimerQuery {
    #[serde(rename = "stationId")]
    pub station_id: String,
}
#[derive(Serialize)]
pub struct TimerOut {
    #[serde(rename = "remainingSecs")]
    pub remaining_secs: u64,
    pub expired: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CaseFile, StationTimer};

    #[test]
    fn station_dto_does_not_leak_the_answer_key() {
        let st = Station {
            id: "s1".into(),
            language: "en".into(),
            source: CaseSource::Seed,
            case: CaseFile {
                chief_complaint: "Chest pain".into(),
                answer_key: crate::domain::AnswerKey {
                    main_diagnosis: "Acute myocardial infarction".into(),
                    ..Default::default()
                },
                ..CaseFile::default()
            },
            transcript: vec![],
            timer: StationTimer::start(300),
            diagnosis: None,
            report: None,
        };
        let json = serde_json::to_string(&to_out(&st)).expect("json");
        assert!(json.contains("Chest pain"));
        assert!(!json.contains("myocardial"));
        assert!(!json.contains("answer_key"));
    }

    #[test]
    fn ws_messages_parse_from_tagged_json() {
        let msg: ClientWsMessage = serde_json::from_str(
            r#"{"type":"submit_diagnosis","stationId":"s1","diagnosis":"appendicitis"}"#,
        )
        .expect("parse");
        match msg {
            ClientWsMessage::SubmitDiagnosis { station_id, diagnosis } => {
                assert_eq!(station_id, "s1");
                assert_eq!(diagnosis, "appendicitis");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
