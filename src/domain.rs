//! Domain models: patient cases, answer keys, stations, and the station timer.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::eval::EvaluationReport;

/// Where did a case come from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseSource {
  LocalBank, // from user-provided TOML bank
  Generated, // generated via OpenAI and cached in memory
  Seed,      // built-in cases (last resort)
}

/// Ground truth for diagnosis scoring. Immutable once the case exists.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AnswerKey {
  pub main_diagnosis: String,
  #[serde(default)]
  pub differentials: Vec<String>,
  #[serde(default)]
  pub management: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PatientInfo {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub age: String,
  #[serde(default)]
  pub gender: String,
  #[serde(default)]
  pub occupation: String,
}

/// A generated (or bank/seed) OSCE case. Field names follow the JSON the case
/// generator model is asked to produce, so the whole struct deserializes
/// straight from its response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseFile {
  #[serde(default)]
  pub patient_info: PatientInfo,
  pub chief_complaint: String,
  /// Onset/duration/character etc. — free-form, quoted into the patient prompt.
  #[serde(default)]
  pub history_details: serde_json::Value,
  #[serde(default)]
  pub past_medical_history: Vec<String>,
  #[serde(default)]
  pub medications: Vec<String>,
  #[serde(default)]
  pub social_history: serde_json::Value,
  #[serde(default)]
  pub physical_findings: Vec<String>,
  #[serde(rename = "answer_key")]
  pub answer_key: AnswerKey,
}

/// One side of the station conversation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
  Student,
  Patient,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
  pub speaker: Speaker,
  pub text: String,
}

const DEFAULT_STATION_SECS: u64 = 300;

/// Wall-clock countdown for one station.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StationTimer {
  pub started_at: u64, // unix seconds
  pub duration_secs: u64,
}

impl StationTimer {
  /// Start a timer; a zero duration falls back to 5 minutes.
  pub fn start(duration_secs: u64) -> Self {
    let duration_secs = if duration_secs == 0 { DEFAULT_STATION_SECS } else { duration_secs };
    Self { started_at: now_unix(), duration_secs }
  }

  /// Remaining whole seconds, never negative.
  pub fn remaining_secs(&self) -> u64 {
    let elapsed = now_unix().saturating_sub(self.started_at);
    self.duration_secs.saturating_sub(elapsed)
  }

  pub fn expired(&self) -> bool {
    self.remaining_secs() == 0
  }
}

fn now_unix() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs())
    .unwrap_or(0)
}

/// One simulated patient encounter within an exam session. Lives in memory
/// for the rest of the session; the report is attached once after evaluation.
#[derive(Clone, Debug)]
pub struct Station {
  pub id: String,
  pub language: String,
  pub source: CaseSource,
  pub case: CaseFile,
  pub transcript: Vec<Turn>,
  pub timer: StationTimer,
  /// The student's submitted diagnosis, recorded at evaluation time.
  pub diagnosis: Option<String>,
  pub report: Option<EvaluationReport>,
}

impl Station {
  /// The student-authored utterances, one per line — what the examiner sees.
  pub fn student_transcript(&self) -> String {
    self
      .transcript
      .iter()
      .filter(|t| t.speaker == Speaker::Student)
      .map(|t| t.text.as_str())
      .collect::<Vec<_>>()
      .join("\n")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn zero_duration_falls_back_to_five_minutes() {
    let t = StationTimer::start(0);
    assert_eq!(t.duration_secs, 300);
    assert!(t.remaining_secs() <= 300);
    assert!(!t.expired());
  }

  #[test]
  fn elapsed_timer_reports_zero_not_negative() {
    let t = StationTimer { started_at: 0, duration_secs: 10 };
    assert_eq!(t.remaining_secs(), 0);
    assert!(t.expired());
  }

  #[test]
  fn student_transcript_drops_patient_turns() {
    let st = Station {
      id: "s1".into(),
      language: "en".into(),
      source: CaseSource::Seed,
      case: CaseFile::default(),
      transcript: vec![
        Turn { speaker: Speaker::Student, text: "What brings you in today?".into() },
        Turn { speaker: Speaker::Patient, text: "Chest pain, doctor.".into() },
        Turn { speaker: Speaker::Student, text: "When did it start?".into() },
      ],
      timer: StationTimer::start(300),
      diagnosis: None,
      report: None,
    };
    assert_eq!(st.student_transcript(), "What brings you in today?\nWhen did it start?");
  }
}
