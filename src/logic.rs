//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Patient roleplay replies (OpenAI or deterministic stub)
//!   - Hints from the transcript so far
//!   - Station evaluation (checklist scoring + diagnosis scoring + weighting)
//!   - Mark sheet rendering for the examiner view

use tracing::{debug, error, info, instrument};

use crate::domain::{Speaker, Station, Turn};
use crate::util::trunc_for_log;
use crate::eval::{
  build_examiner_user_prompt, combine, grade_examiner_response, score_diagnosis,
  zero_checklist_result, ChecklistOutcome, EvaluationReport,
};
use crate::marksheet::render_mark_sheet;
use crate::rubric::Section;
use crate::state::AppState;

/// Patient reply to one student utterance. Both sides of the exchange are
/// recorded on the station transcript.
#[instrument(level = "info", skip(state, text), fields(%station_id, text_len = text.len()))]
pub async fn patient_message(state: &AppState, station_id: &str, text: &str) -> String {
  let station = match state.get_station(station_id).await {
    Some(st) => st,
    None => return format!("Unknown stationId: {}", station_id),
  };

  let reply = if let Some(oa) = &state.openai {
    match oa
      .patient_reply(&state.prompts, &station.case, &station.transcript, text)
      .await
    {
      Ok(t) => t,
      Err(e) => {
        error!(target: "station", id = %station.id, error = %e, "OpenAI patient_reply failed; using stub.");
        patient_reply_stub(&station, text)
      }
    }
  } else {
    patient_reply_stub(&station, text)
  };

  state
    .push_turn(station_id, Turn { speaker: Speaker::Student, text: text.to_string() })
    .await;
  state
    .push_turn(station_id, Turn { speaker: Speaker::Patient, text: reply.clone() })
    .await;
  reply
}

#[instrument(level = "info", skip(state), fields(%station_id))]
pub async fn get_hint_text(state: &AppState, station_id: &str) -> String {
  let station = match state.get_station(station_id).await {
    Some(st) => st,
    None => return "No hint: unknown station.".into(),
  };

  if let Some(oa) = &state.openai {
    match oa
      .hint(&state.prompts, &station.language, &station.student_transcript())
      .await
    {
      Ok(t) => return t,
      Err(e) => {
        error!(target: "station", id = %station.id, error = %e, "OpenAI hint failed; using local hint.");
      }
    }
  }
  hint_local(state, &station)
}

/// Evaluate a station attempt: examiner checklist scoring plus diagnosis
/// scoring, combined into one weighted report that is attached to the
/// station. The checklist side never fails outright — transport and parse
/// problems degrade to the zero-score result with the reason recorded.
#[instrument(level = "info", skip(state, student_dx), fields(%station_id, dx_len = student_dx.len()))]
pub async fn evaluate_station(
  state: &AppState,
  station_id: &str,
  student_dx: &str,
) -> Result<EvaluationReport, String> {
  let station = state
    .get_station(station_id)
    .await
    .ok_or_else(|| format!("Unknown stationId: {}", station_id))?;

  let transcript = station.student_transcript();
  let user_prompt = build_examiner_user_prompt(&transcript, &state.rubric, Some(&station.case));

  let checklist: ChecklistOutcome = if let Some(oa) = &state.openai {
    match oa
      .examiner_score(&state.prompts, &station.language, &user_prompt)
      .await
    {
      Ok(raw) => {
        debug!(target: "station", id = %station.id, raw = %trunc_for_log(&raw, 200), "Examiner raw response");
        grade_examiner_response(&raw, &state.rubric)
      }
      Err(e) => {
        error!(target: "station", id = %station.id, error = %e, "Examiner call failed; falling back to zero score.");
        ChecklistOutcome::Degraded {
          result: zero_checklist_result(
            &state.rubric,
            format!("Evaluation error occurred: {}", e),
          ),
          reason: e,
        }
      }
    }
  } else {
    ChecklistOutcome::Degraded {
      result: zero_checklist_result(
        &state.rubric,
        "Evaluation unavailable: OpenAI is not configured".into(),
      ),
      reason: "OPENAI_API_KEY not set".into(),
    }
  };

  let (dx_score, correct_dx) = score_diagnosis(student_dx, &station.case.answer_key);
  let report = combine(&checklist, dx_score, correct_dx);

  info!(
    target: "station",
    id = %station.id,
    overall = %format!("{:.1}", report.overall_pct),
    checklist = %format!("{:.1}", report.checklist_pct),
    diagnosis = report.diagnosis_pct,
    degraded = report.degraded.is_some(),
    "Station evaluated"
  );

  state
    .attach_report(station_id, student_dx.to_string(), report.clone())
    .await;
  Ok(report)
}

/// Rendered examiner mark sheet for an already-evaluated station.
#[instrument(level = "info", skip(state), fields(%station_id))]
pub async fn mark_sheet(state: &AppState, station_id: &str) -> Result<String, String> {
  let station = state
    .get_station(station_id)
    .await
    .ok_or_else(|| format!("Unknown stationId: {}", station_id))?;
  let report = station
    .report
    .as_ref()
    .ok_or_else(|| "Station has not been evaluated yet.".to_string())?;

  Ok(render_mark_sheet(
    &state.rubric,
    &report.raw_scores,
    station.diagnosis.as_deref().unwrap_or(""),
    &report.correct_dx,
    report.diagnosis_pct,
    report.overall_pct,
    &report.comments,
  ))
}

// -------- Local fallbacks --------

/// Tiny deterministic patient: answers the opening question with the chief
/// complaint and deflects everything else the way an unforthcoming patient
/// would.
fn patient_reply_stub(station: &Station, text: &str) -> String {
  let lower = text.to_lowercase();
  let name = &station.case.patient_info.name;
  if lower.contains("hello") || lower.contains("good morning") || lower.contains("name") {
    if name.is_empty() {
      "Hello, doctor.".into()
    } else {
      format!("Hello doctor, I'm {}.", name)
    }
  } else if lower.contains("bring") || lower.contains("problem") || lower.contains("complain") {
    format!(
      "Well, I've been having {}. That's why I came in.",
      station.case.chief_complaint.to_lowercase()
    )
  } else if lower.contains("worse") || lower.contains("better") {
    "It comes and goes, honestly. Some things make it worse but I can't always tell.".into()
  } else {
    "I'm not sure, doctor. Could you ask me something more specific?".into()
  }
}

/// Local hint: point at the first rubric section the transcript has not
/// touched yet, without revealing the diagnosis.
fn hint_local(state: &AppState, station: &Station) -> String {
  let transcript = station.student_transcript().to_lowercase();
  for (section, _) in state.rubric.sections() {
    if !section_touched(*section, &transcript) {
      return format!(
        "Consider the {} part of the encounter — there may be ground you haven't covered yet.",
        section.key()
      );
    }
  }
  "Review the marking areas you have touched only briefly and go deeper on one of them.".into()
}

/// Surface cues that suggest the student's questions reached a section.
/// Matched against the lowercased student transcript.
fn section_touched(section: Section, transcript: &str) -> bool {
  let cues: &[&str] = match section {
    Section::History => &[
      "when did", "how long", "history", "medication", "allerg", "smok", "alcohol", "family",
    ],
    Section::Exam => &[
      "examin", "vital", "blood pressure", "temperature", "listen to", "have a look",
    ],
    Section::Lab => &["test", "x-ray", "blood work", "scan", "investigation", "ecg"],
    Section::Management => &[
      "treat", "prescri", "refer", "follow-up", "follow up", "advise", "management",
    ],
    Section::Interaction => &["concern", "worri", "understand", "anything else"],
  };
  cues.iter().any(|cue| transcript.contains(cue))
}
