//! The evaluation engine: checklist grading, diagnosis scoring, and the
//! weighted station report.
//!
//! Flow:
//! 1) App builds one examiner request (rubric listing + student transcript).
//! 2) The model returns a JSON object, one score array per rubric section.
//! 3) App repairs/parses the response and reconciles every array against the
//!    rubric's fixed shape before any aggregation.
//! 4) Checklist and diagnosis results are combined with a fixed weighting.
//!
//! The model's output is untrusted end to end: missing sections, short or long
//! arrays, out-of-domain values, and unparseable text all land on defined
//! paths. Nothing in this module panics on malformed input, and a fallback is
//! always tagged `Degraded` so callers can tell it apart from a genuine zero.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{AnswerKey, CaseFile};
use crate::rubric::{Rubric, Section, ITEM_MAX};
use crate::similarity::similarity;

// Station weighting: the marking sheet makes the diagnosis important but it
// never overrides the whole performance.
pub const CHECKLIST_WEIGHT: f64 = 0.8;
pub const DIAGNOSIS_WEIGHT: f64 = 0.2;

// Diagnosis tiers: strong match with the main diagnosis, a close
// approximation of it, or a recognized differential.
pub const DX_MAIN_THRESHOLD: f64 = 0.8;
pub const DX_CLOSE_THRESHOLD: f64 = 0.6;
pub const DX_DIFFERENTIAL_THRESHOLD: f64 = 0.7;
pub const DX_MAIN_SCORE: u32 = 100;
pub const DX_CLOSE_SCORE: u32 = 75;
pub const DX_DIFFERENTIAL_SCORE: u32 = 50;

/// Per-section reconciled score arrays, domain {0, 3, 5}.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawScores {
  #[serde(default)]
  pub history: Vec<u8>,
  #[serde(default)]
  pub exam: Vec<u8>,
  #[serde(default)]
  pub lab: Vec<u8>,
  #[serde(default)]
  pub management: Vec<u8>,
  #[serde(default)]
  pub interaction: Vec<u8>,
}

impl RawScores {
  pub fn get(&self, section: Section) -> &[u8] {
    match section {
      Section::History => &self.history,
      Section::Exam => &self.exam,
      Section::Lab => &self.lab,
      Section::Management => &self.management,
      Section::Interaction => &self.interaction,
    }
  }

  fn set(&mut self, section: Section, scores: Vec<u8>) {
    match section {
      Section::History => self.history = scores,
      Section::Exam => self.exam = scores,
      Section::Lab => self.lab = scores,
      Section::Management => self.management = scores,
      Section::Interaction => self.interaction = scores,
    }
  }
}

/// Checklist grading output for one station attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChecklistResult {
  pub total_pct: f64,
  pub history_pct: f64,
  pub exam_pct: f64,
  pub lab_pct: f64,
  pub management_pct: f64,
  pub interaction_pct: f64,
  pub raw_scores: RawScores,
  pub missed_items: Vec<String>,
  pub comments: String,
}

/// Tagged grading outcome. `Degraded` carries the same zero-shaped result the
/// exam flow needs to proceed, plus the reason it is not a genuine score.
#[derive(Clone, Debug)]
pub enum ChecklistOutcome {
  Scored(ChecklistResult),
  Degraded { result: ChecklistResult, reason: String },
}

impl ChecklistOutcome {
  pub fn result(&self) -> &ChecklistResult {
    match self {
      ChecklistOutcome::Scored(r) => r,
      ChecklistOutcome::Degraded { result, .. } => result,
    }
  }

  pub fn degraded_reason(&self) -> Option<&str> {
    match self {
      ChecklistOutcome::Scored(_) => None,
      ChecklistOutcome::Degraded { reason, .. } => Some(reason),
    }
  }
}

/// The complete station report handed to the presentation layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationReport {
  pub overall_pct: f64,
  pub checklist_pct: f64,
  pub history_pct: f64,
  pub exam_pct: f64,
  pub lab_pct: f64,
  pub management_pct: f64,
  pub interaction_pct: f64,
  pub diagnosis_pct: u32,
  pub raw_scores: RawScores,
  pub missed_items: Vec<String>,
  pub correct_dx: String,
  pub comments: String,
  /// Set when the checklist side fell back after a transport/parse failure.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub degraded: Option<String>,
}

pub fn round1(x: f64) -> f64 {
  (x * 10.0).round() / 10.0
}

/// Read a reported score as an integer. Models regularly emit `5.0` for `5`,
/// so floats are rounded rather than discarded; non-numeric values read as 0.
fn json_score(v: &Value) -> i64 {
  v.as_i64()
    .or_else(|| v.as_f64().map(|f| f.round() as i64))
    .unwrap_or(0)
}

/// Snap an untrusted reported value to the nearest valid tier.
fn clamp_tier(v: i64) -> u8 {
  if v <= 1 {
    0
  } else if v <= 4 {
    3
  } else {
    5
  }
}

/// Force a reported score array to exactly `expected` entries: pad missing
/// entries with 0, drop extras, clamp every value into {0, 3, 5}. This runs
/// per section before any aggregation.
pub fn reconcile_section(reported: &[i64], expected: usize) -> Vec<u8> {
  let mut out: Vec<u8> = reported.iter().take(expected).map(|&v| clamp_tier(v)).collect();
  out.resize(expected, 0);
  out
}

/// `sum / (items * 5) * 100`, one decimal; 0.0 when the section is empty.
pub fn section_percentage(scores: &[u8], item_count: usize) -> f64 {
  if item_count == 0 {
    return 0.0;
  }
  let sum: u32 = scores.iter().map(|&s| s as u32).sum();
  let possible = item_count as u32 * ITEM_MAX;
  round1(sum as f64 / possible as f64 * 100.0)
}

/// Best-effort JSON repair for model output: strip code fences, then trim
/// leading/trailing noise outside the outermost braces, and retry once.
fn parse_with_repair(raw: &str) -> Result<Value, String> {
  if let Ok(v) = serde_json::from_str::<Value>(raw) {
    return Ok(v);
  }
  let mut s = raw.trim();
  if let Some(stripped) = s.strip_prefix("```json") {
    s = stripped;
  } else if let Some(stripped) = s.strip_prefix("```") {
    s = stripped;
  }
  s = s.strip_suffix("```").unwrap_or(s).trim();
  let (start, end) = match (s.find('{'), s.rfind('}')) {
    (Some(a), Some(b)) if a < b => (a, b),
    _ => return Err("response contains no JSON object".into()),
  };
  serde_json::from_str::<Value>(&s[start..=end]).map_err(|e| format!("JSON parse error: {e}"))
}

/// The all-zero checklist result: every rubric item missed, every percentage
/// 0. Used whenever the examiner response is unusable.
pub fn zero_checklist_result(rubric: &Rubric, comments: String) -> ChecklistResult {
  let mut raw_scores = RawScores::default();
  for (section, items) in rubric.sections() {
    raw_scores.set(*section, vec![0; items.len()]);
  }
  ChecklistResult {
    total_pct: 0.0,
    history_pct: 0.0,
    exam_pct: 0.0,
    lab_pct: 0.0,
    management_pct: 0.0,
    interaction_pct: 0.0,
    raw_scores,
    missed_items: rubric.flattened(),
    comments,
  }
}

/// Grade a raw examiner response against the rubric. Never fails: unusable
/// input yields `Degraded` with the zero result.
pub fn grade_examiner_response(raw: &str, rubric: &Rubric) -> ChecklistOutcome {
  let parsed = match parse_with_repair(raw) {
    Ok(v) => v,
    Err(reason) => {
      return ChecklistOutcome::Degraded {
        result: zero_checklist_result(
          rubric,
          "Evaluation error occurred - could not parse scores".into(),
        ),
        reason,
      };
    }
  };
  let obj = match parsed.as_object() {
    Some(o) => o,
    None => {
      return ChecklistOutcome::Degraded {
        result: zero_checklist_result(
          rubric,
          "Evaluation error occurred - could not parse scores".into(),
        ),
        reason: "top-level JSON value is not an object".into(),
      };
    }
  };

  let mut raw_scores = RawScores::default();
  let mut result = zero_checklist_result(rubric, String::new());
  let mut total_raw: u32 = 0;
  let mut total_possible: u32 = 0;
  let mut missed_items: Vec<String> = Vec::new();

  for (section, items) in rubric.sections() {
    let reported: Vec<i64> = obj
      .get(section.key())
      .and_then(Value::as_array)
      .map(|arr| arr.iter().map(json_score).collect())
      .unwrap_or_default();
    let reconciled = reconcile_section(&reported, items.len());

    for (item, &score) in items.iter().zip(&reconciled) {
      if score == 0 {
        missed_items.push(item.clone());
      }
    }
    total_raw += reconciled.iter().map(|&s| s as u32).sum::<u32>();
    total_possible += items.len() as u32 * ITEM_MAX;

    let pct = section_percentage(&reconciled, items.len());
    match section {
      Section::History => result.history_pct = pct,
      Section::Exam => result.exam_pct = pct,
      Section::Lab => result.lab_pct = pct,
      Section::Management => result.management_pct = pct,
      Section::Interaction => result.interaction_pct = pct,
    }
    raw_scores.set(*section, reconciled);
  }

  result.total_pct = if total_possible > 0 {
    round1(total_raw as f64 / total_possible as f64 * 100.0)
  } else {
    0.0
  };
  result.raw_scores = raw_scores;
  result.missed_items = missed_items;
  result.comments = obj
    .get("comments")
    .or_else(|| obj.get("overall_comments"))
    .and_then(Value::as_str)
    .unwrap_or_default()
    .to_string();

  ChecklistOutcome::Scored(result)
}

/// The user half of the examiner request: transcript, rubric listing grouped
/// by section, and optional case context for grounding.
pub fn build_examiner_user_prompt(
  transcript: &str,
  rubric: &Rubric,
  case: Option<&CaseFile>,
) -> String {
  let mut prompt = format!("Transcript:\n{transcript}\n\nChecklist Items:\n");
  for (section, items) in rubric.sections() {
    prompt.push_str(&format!("\n{}:\n", section.key().to_uppercase()));
    for item in items {
      prompt.push_str(&format!("- {item}\n"));
    }
  }
  if let Some(case) = case {
    prompt.push_str(&format!(
      "\nCase Information (for context):\nChief Complaint: {}\nDiagnosis: {}\n",
      case.chief_complaint, case.answer_key.main_diagnosis
    ));
  }
  prompt
}

/// Tiered diagnosis score against the answer key. Always returns the main
/// diagnosis for display regardless of the match outcome.
pub fn score_diagnosis(student_dx: &str, answer_key: &AnswerKey) -> (u32, String) {
  let correct = answer_key.main_diagnosis.clone();

  let sim = similarity(student_dx, &correct);
  if sim > DX_MAIN_THRESHOLD {
    return (DX_MAIN_SCORE, correct);
  }
  if sim > DX_CLOSE_THRESHOLD {
    return (DX_CLOSE_SCORE, correct);
  }
  for differential in &answer_key.differentials {
    if similarity(student_dx, differential) > DX_DIFFERENTIAL_THRESHOLD {
      return (DX_DIFFERENTIAL_SCORE, correct);
    }
  }
  (0, correct)
}

/// Combine the checklist outcome and diagnosis score into the station report.
pub fn combine(checklist: &ChecklistOutcome, dx_score: u32, correct_dx: String) -> EvaluationReport {
  let c = checklist.result();
  let overall_pct = round1(CHECKLIST_WEIGHT * c.total_pct + DIAGNOSIS_WEIGHT * dx_score as f64);
  EvaluationReport {
    overall_pct,
    checklist_pct: c.total_pct,
    history_pct: c.history_pct,
    exam_pct: c.exam_pct,
    lab_pct: c.lab_pct,
    management_pct: c.management_pct,
    interaction_pct: c.interaction_pct,
    diagnosis_pct: dx_score,
    raw_scores: c.raw_scores.clone(),
    missed_items: c.missed_items.clone(),
    correct_dx,
    comments: c.comments.clone(),
    degraded: checklist.degraded_reason().map(str::to_string),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn two_section_rubric() -> Rubric {
    Rubric::new(vec![
      (Section::History, vec!["history item 1".into(), "history item 2".into()]),
      (Section::Exam, vec!["exam item 1".into(), "exam item 2".into()]),
    ])
  }

  fn answer_key() -> AnswerKey {
    AnswerKey {
      main_diagnosis: "Acute appendicitis".into(),
      differentials: vec!["Mesenteric adenitis".into(), "Ectopic pregnancy".into()],
      management: vec!["Appendectomy".into()],
    }
  }

  #[test]
  fn reconcile_always_matches_expected_length() {
    for expected in 0..6usize {
      for reported_len in 0..8usize {
        let reported = vec![5i64; reported_len];
        assert_eq!(reconcile_section(&reported, expected).len(), expected);
      }
    }
  }

  #[test]
  fn reconcile_pads_with_zero_and_truncates_extras() {
    assert_eq!(reconcile_section(&[5], 3), vec![5, 0, 0]);
    assert_eq!(reconcile_section(&[5, 3, 0, 5, 5], 3), vec![5, 3, 0]);
    assert_eq!(reconcile_section(&[], 2), vec![0, 0]);
  }

  #[test]
  fn reconcile_clamps_out_of_domain_values() {
    assert_eq!(reconcile_section(&[-7, 1, 2, 4, 7, 100], 6), vec![0, 0, 3, 3, 5, 5]);
  }

  #[test]
  fn section_percentage_stays_in_range() {
    assert_eq!(section_percentage(&[], 0), 0.0);
    assert_eq!(section_percentage(&[0, 0], 2), 0.0);
    assert_eq!(section_percentage(&[5, 5], 2), 100.0);
    assert_eq!(section_percentage(&[3], 1), 60.0);
    for scores in [&[0u8, 3, 5][..], &[5, 5, 5], &[0, 0, 0]] {
      let pct = section_percentage(scores, scores.len());
      assert!((0.0..=100.0).contains(&pct), "pct={pct}");
    }
  }

  #[test]
  fn grades_well_formed_response() {
    let rubric = two_section_rubric();
    let raw = r#"{"history":[5,5],"exam":[0,3],"comments":"ok"}"#;
    let outcome = grade_examiner_response(raw, &rubric);
    assert!(outcome.degraded_reason().is_none());
    let r = outcome.result();
    assert_eq!(r.history_pct, 100.0);
    assert_eq!(r.exam_pct, 30.0);
    assert_eq!(r.total_pct, 65.0); // 13 of 20 points
    assert_eq!(r.missed_items, vec!["exam item 1".to_string()]);
    assert_eq!(r.comments, "ok");
    assert_eq!(r.raw_scores.history, vec![5, 5]);
    assert_eq!(r.raw_scores.exam, vec![0, 3]);
  }

  #[test]
  fn float_scores_count_the_same_as_integers() {
    let rubric = two_section_rubric();
    let raw = r#"{"history":[5.0,5.0],"exam":[3.0,0.0]}"#;
    let outcome = grade_examiner_response(raw, &rubric);
    assert!(outcome.degraded_reason().is_none());
    let r = outcome.result();
    assert_eq!(r.raw_scores.history, vec![5, 5]);
    assert_eq!(r.raw_scores.exam, vec![3, 0]);
    assert_eq!(r.history_pct, 100.0);
    assert_eq!(r.total_pct, 65.0);
  }

  #[test]
  fn non_numeric_scores_read_as_zero() {
    let rubric = two_section_rubric();
    let raw = r#"{"history":["5",null],"exam":[5,5]}"#;
    let r = grade_examiner_response(raw, &rubric);
    assert_eq!(r.result().raw_scores.history, vec![0, 0]);
  }

  #[test]
  fn short_section_array_is_padded_before_percentages() {
    let rubric = two_section_rubric();
    let raw = r#"{"history":[5],"exam":[5,5]}"#;
    let r = grade_examiner_response(raw, &rubric);
    let r = r.result();
    assert_eq!(r.raw_scores.history, vec![5, 0]);
    assert_eq!(r.history_pct, 50.0);
    assert_eq!(r.exam_pct, 100.0);
    assert_eq!(r.missed_items, vec!["history item 2".to_string()]);
  }

  #[test]
  fn missing_section_counts_as_all_missed() {
    let rubric = two_section_rubric();
    let raw = r#"{"exam":[5,5],"comments":"partial"}"#;
    let r = grade_examiner_response(raw, &rubric);
    let r = r.result();
    assert_eq!(r.raw_scores.history, vec![0, 0]);
    assert_eq!(r.history_pct, 0.0);
    assert_eq!(
      r.missed_items,
      vec!["history item 1".to_string(), "history item 2".to_string()]
    );
  }

  #[test]
  fn unparseable_response_degrades_to_zero() {
    let rubric = two_section_rubric();
    let outcome = grade_examiner_response("not json at all", &rubric);
    assert!(outcome.degraded_reason().is_some());
    let r = outcome.result();
    assert_eq!(r.total_pct, 0.0);
    assert_eq!(r.missed_items, rubric.flattened());
    assert!(r.comments.contains("could not parse"));
  }

  #[test]
  fn non_object_top_level_degrades_to_zero() {
    let rubric = two_section_rubric();
    let outcome = grade_examiner_response("[5, 5, 3]", &rubric);
    assert!(outcome.degraded_reason().is_some());
    assert_eq!(outcome.result().total_pct, 0.0);
  }

  #[test]
  fn code_fenced_response_is_repaired() {
    let rubric = two_section_rubric();
    let raw = "```json\n{\"history\":[5,5],\"exam\":[5,5],\"comments\":\"fenced\"}\n```";
    let outcome = grade_examiner_response(raw, &rubric);
    assert!(outcome.degraded_reason().is_none());
    assert_eq!(outcome.result().total_pct, 100.0);
    assert_eq!(outcome.result().comments, "fenced");
  }

  #[test]
  fn leading_prose_before_the_object_is_trimmed() {
    let rubric = two_section_rubric();
    let raw = "Here are the scores:\n{\"history\":[3,3],\"exam\":[3,3]}\nHope this helps!";
    let outcome = grade_examiner_response(raw, &rubric);
    assert!(outcome.degraded_reason().is_none());
    assert_eq!(outcome.result().total_pct, 60.0);
  }

  #[test]
  fn overall_comments_key_is_accepted() {
    let rubric = two_section_rubric();
    let raw = r#"{"history":[5,5],"exam":[5,5],"overall_comments":"solid work"}"#;
    let outcome = grade_examiner_response(raw, &rubric);
    assert_eq!(outcome.result().comments, "solid work");
  }

  #[test]
  fn exact_diagnosis_scores_top_tier() {
    let key = answer_key();
    assert_eq!(score_diagnosis("Acute appendicitis", &key), (100, key.main_diagnosis.clone()));
  }

  #[test]
  fn empty_diagnosis_scores_zero() {
    let key = answer_key();
    assert_eq!(score_diagnosis("", &key), (0, key.main_diagnosis.clone()));
  }

  #[test]
  fn typo_in_main_diagnosis_still_scores_top_tier() {
    let key = answer_key();
    assert_eq!(score_diagnosis("Acute appendicitiss", &key).0, 100);
  }

  #[test]
  fn approximation_of_main_diagnosis_scores_close_tier() {
    let key = answer_key();
    // "appendicitis" vs "acute appendicitis": similarity 0.667.
    assert_eq!(score_diagnosis("appendicitis", &key).0, 75);
  }

  #[test]
  fn differential_match_scores_partial_credit() {
    let key = answer_key();
    let (score, correct) = score_diagnosis("mesenteric adenitis", &key);
    assert_eq!(score, 50);
    assert_eq!(correct, "Acute appendicitis");
  }

  #[test]
  fn unrelated_diagnosis_scores_zero() {
    let key = answer_key();
    assert_eq!(score_diagnosis("tension headache", &key).0, 0);
  }

  #[test]
  fn overall_is_the_fixed_weighted_combination() {
    let rubric = two_section_rubric();
    let outcome = grade_examiner_response(r#"{"history":[5,5],"exam":[0,3]}"#, &rubric);
    let report = combine(&outcome, 100, "Acute appendicitis".into());
    // 0.8 * 65.0 + 0.2 * 100 = 72.0
    assert_eq!(report.overall_pct, round1(0.8 * 65.0 + 0.2 * 100.0));
    assert_eq!(report.overall_pct, 72.0);
    assert_eq!(report.checklist_pct, 65.0);
    assert_eq!(report.diagnosis_pct, 100);
    assert!(report.degraded.is_none());
  }

  #[test]
  fn degraded_outcome_is_visible_on_the_report() {
    let rubric = two_section_rubric();
    let outcome = grade_examiner_response("garbage", &rubric);
    let report = combine(&outcome, 50, "Acute appendicitis".into());
    assert_eq!(report.overall_pct, 10.0); // 0.8*0 + 0.2*50
    assert!(report.degraded.is_some());
    assert_eq!(report.missed_items.len(), rubric.total_items());
  }

  #[test]
  fn examiner_prompt_lists_every_item_under_its_section() {
    let rubric = two_section_rubric();
    let prompt = build_examiner_user_prompt("asked about onset", &rubric, None);
    assert!(prompt.contains("Transcript:\nasked about onset"));
    assert!(prompt.contains("HISTORY:"));
    assert!(prompt.contains("- history item 2"));
    assert!(prompt.contains("EXAM:"));
    assert!(!prompt.contains("Case Information"));
  }

  #[test]
  fn examiner_prompt_appends_case_context_when_present() {
    let rubric = two_section_rubric();
    let case = CaseFile {
      chief_complaint: "Abdominal pain".into(),
      answer_key: answer_key(),
      ..CaseFile::default()
    };
    let prompt = build_examiner_user_prompt("t", &rubric, Some(&case));
    assert!(prompt.contains("Chief Complaint: Abdominal pain"));
    assert!(prompt.contains("Diagnosis: Acute appendicitis"));
  }
}
