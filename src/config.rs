//! Loading exam configuration (prompts + optional case bank) from TOML.
//!
//! See `ExamConfig` and `Prompts` for expected schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::AnswerKey;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ExamConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub cases: Vec<CaseCfg>,
}

/// Case entry accepted in TOML configuration. Enough to run a station without
/// OpenAI: a chief complaint and an answer key, everything else optional.
#[derive(Clone, Debug, Deserialize)]
pub struct CaseCfg {
  #[serde(default)] pub id: Option<String>,
  #[serde(default)] pub language: Option<String>,
  pub chief_complaint: String,
  #[serde(default)] pub patient_name: Option<String>,
  #[serde(default)] pub patient_age: Option<String>,
  #[serde(default)] pub patient_gender: Option<String>,
  #[serde(default)] pub physical_findings: Vec<String>,
  pub answer_key: AnswerKey,
}

/// Prompts used by the OpenAI client. Defaults cover the full exam flow;
/// override them in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  // Station/case generation
  pub case_system_template: String,
  pub case_user_template: String,
  // Patient roleplay
  pub patient_system_template: String,
  // Hints
  pub hint_system_template: String,
  // Checklist scoring
  pub examiner_system_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      case_system_template: "You are an expert medical OSCE case generator. Create a detailed, realistic OSCE station in {lang}. Produce a STRICT JSON response with keys: patientInfo (object with name, age, gender, occupation), chiefComplaint (string), historyDetails (object with onset, duration, character, aggravating factors, relieving factors), pastMedicalHistory (array), medications (array), socialHistory (object), physicalFindings (array), answer_key (object with main_diagnosis, differentials array, management array). ONLY return valid JSON without any additional text or markdown formatting.".into(),
      case_user_template: "Generate an OSCE station for chief complaint: {chief}".into(),
      patient_system_template: "You are roleplaying as a patient named {name}, {age} years old, {gender}, attending a medical consultation for: {chief}. Respond AS THE PATIENT in first person. Only know what a real patient would know. Do NOT volunteer information unless directly asked. No medical terminology a patient wouldn't use. Express appropriate emotions. Deny symptoms you don't have naturally. Keep responses under 2-3 sentences. Your details: history {history}; past medical history {pmh}; medications {meds}.".into(),
      hint_system_template: "You are a medical OSCE tutor coaching in {lang}. Given the student's transcript so far, give ONE short hint (< 25 words) about an important aspect of the encounter they may have missed. Never reveal the diagnosis.".into(),
      examiner_system_template: "You are a medical OSCE examiner scoring in {lang}. Carefully evaluate this student's performance against standard OSCE marking criteria. For EACH checklist item, respond with a score: 0 (Not Done), 3 (Partially Done), or 5 (Well Done). Return a JSON object with these sections: 'history', 'exam', 'lab', 'management', 'interaction' (each with arrays of scores), 'comments' (string with brief feedback).".into(),
    }
  }
}

/// Attempt to load `ExamConfig` from EXAM_CONFIG_PATH. On any parsing/IO
/// error, returns None.
pub fn load_exam_config_from_env() -> Option<ExamConfig> {
  let path = std::env::var("EXAM_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<ExamConfig>(&s) {
      Ok(cfg) => {
        info!(target: "osce_backend", %path, "Loaded exam config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "osce_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "osce_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn case_bank_entries_parse_from_toml() {
    let toml_src = r#"
      [[cases]]
      chief_complaint = "Chest pain"
      physical_findings = ["Diaphoresis"]

      [cases.answer_key]
      main_diagnosis = "Myocardial infarction"
      differentials = ["Unstable angina"]
      management = ["Aspirin"]
    "#;
    let cfg: ExamConfig = toml::from_str(toml_src).expect("config");
    assert_eq!(cfg.cases.len(), 1);
    assert_eq!(cfg.cases[0].answer_key.main_diagnosis, "Myocardial infarction");
    assert!(cfg.cases[0].id.is_none());
    // Prompt defaults kick in when the table is absent.
    assert!(cfg.prompts.examiner_system_template.contains("OSCE examiner"));
  }
}
