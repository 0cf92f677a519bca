//! Seed data: specialty/chief-complaint tables for case generation and
//! built-in cases so a station can always start without OpenAI.

use rand::seq::SliceRandom;
use serde_json::json;

use crate::domain::{AnswerKey, CaseFile, PatientInfo};

/// Specialties and their common presenting complaints.
pub const CATEGORIES: &[(&str, &[&str])] = &[
  ("Family Medicine", &["Cough", "Fever", "Back pain", "Fatigue", "Headache", "Weight loss", "Insomnia", "Anxiety", "Rash"]),
  ("Cardiology", &["Chest pain", "Palpitations", "Dyspnea on exertion", "Syncope", "Edema", "Hypertension"]),
  ("Gastroenterology", &["Abdominal pain", "Diarrhea", "Constipation", "Nausea and vomiting", "Jaundice", "Heartburn", "Gastrointestinal bleeding"]),
  ("Neurology", &["Headache", "Dizziness", "Numbness/tingling", "Seizure", "Tremor", "Memory impairment", "Gait disturbance"]),
  ("Pulmonology", &["Shortness of breath", "Cough", "Hemoptysis", "Wheezing", "Sleep apnea"]),
  ("Obstetrics & Gynecology", &["Abdominal pain in pregnancy", "Vaginal bleeding", "Amenorrhea", "Dysmenorrhea", "Pelvic pain", "Early pregnancy bleeding", "Contraception counseling"]),
  ("Pediatrics", &["Fever in infant", "Rash", "Cough in child", "Developmental delay", "Abdominal pain in child", "Ear pain"]),
  ("Orthopedics", &["Joint pain", "Back pain", "Fracture", "Sports injury", "Knee pain", "Shoulder pain"]),
  ("Psychiatry", &["Depression", "Anxiety", "Psychosis", "Substance abuse", "Insomnia", "Suicidal ideation"]),
  ("Dermatology", &["Rash", "Pruritus", "Skin lesion", "Hair loss", "Nail abnormality"]),
  ("Emergency Medicine", &["Chest pain", "Shortness of breath", "Trauma", "Altered mental status", "Severe headache", "Acute abdominal pain"]),
];

/// Pick a random chief complaint across all specialties.
pub fn random_chief_complaint() -> String {
  let mut rng = rand::thread_rng();
  CATEGORIES
    .choose(&mut rng)
    .and_then(|(_, complaints)| complaints.choose(&mut rng))
    .map(|c| c.to_string())
    .unwrap_or_else(|| "Chest pain".into())
}

/// Minimal set of built-in cases that keep the app useful even without
/// external config or OpenAI.
pub fn seed_cases() -> Vec<CaseFile> {
  vec![
    CaseFile {
      patient_info: PatientInfo {
        name: "Adam Carter".into(),
        age: "54".into(),
        gender: "male".into(),
        occupation: "accountant".into(),
      },
      chief_complaint: "Chest pain".into(),
      history_details: json!({
        "onset": "2 hours ago at rest",
        "duration": "constant since onset",
        "character": "central crushing pressure radiating to the left arm",
        "aggravating": "exertion",
        "relieving": "nothing so far"
      }),
      past_medical_history: vec!["Hypertension".into(), "Type 2 diabetes".into()],
      medications: vec!["Metformin".into(), "Lisinopril".into()],
      social_history: json!({"smoking": "20 pack-years", "alcohol": "occasional"}),
      physical_findings: vec![
        "Diaphoretic and anxious".into(),
        "BP 150/95, HR 102".into(),
      ],
      answer_key: AnswerKey {
        main_diagnosis: "Acute myocardial infarction".into(),
        differentials: vec![
          "Unstable angina".into(),
          "Aortic dissection".into(),
          "Pulmonary embolism".into(),
        ],
        management: vec![
          "ECG and cardiac troponins".into(),
          "Aspirin loading dose".into(),
          "Urgent cardiology referral".into(),
        ],
      },
    },
    CaseFile {
      patient_info: PatientInfo {
        name: "Leila Hassan".into(),
        age: "23".into(),
        gender: "female".into(),
        occupation: "student".into(),
      },
      chief_complaint: "Abdominal pain".into(),
      history_details: json!({
        "onset": "since yesterday, started around the umbilicus",
        "duration": "worsening, now in the right lower quadrant",
        "character": "sharp, worse on movement",
        "aggravating": "coughing, walking",
        "relieving": "lying still"
      }),
      past_medical_history: vec![],
      medications: vec![],
      social_history: json!({"smoking": "never", "alcohol": "none"}),
      physical_findings: vec![
        "Right lower quadrant tenderness with guarding".into(),
        "Low-grade fever 37.9C".into(),
      ],
      answer_key: AnswerKey {
        main_diagnosis: "Acute appendicitis".into(),
        differentials: vec![
          "Mesenteric adenitis".into(),
          "Ectopic pregnancy".into(),
          "Ovarian torsion".into(),
        ],
        management: vec![
          "Surgical review for appendectomy".into(),
          "Urine pregnancy test".into(),
          "IV fluids and analgesia".into(),
        ],
      },
    },
  ]
}

/// Absolute last-resort fallback: if the whole case pool is empty, we serve this.
pub fn hard_fallback_case() -> CaseFile {
  CaseFile {
    patient_info: PatientInfo {
      name: "Sam Reed".into(),
      age: "35".into(),
      gender: "male".into(),
      occupation: "teacher".into(),
    },
    chief_complaint: "Cough".into(),
    history_details: json!({
      "onset": "5 days ago after a cold",
      "character": "productive, yellow sputum",
      "aggravating": "lying down at night"
    }),
    past_medical_history: vec![],
    medications: vec![],
    social_history: json!({"smoking": "never"}),
    physical_findings: vec!["Crackles at the right base".into()],
    answer_key: AnswerKey {
      main_diagnosis: "Community-acquired pneumonia".into(),
      differentials: vec!["Acute bronchitis".into(), "Post-viral cough".into()],
      management: vec!["Chest X-ray".into(), "Oral antibiotics".into()],
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn random_chief_complaint_comes_from_the_table() {
    for _ in 0..20 {
      let chief = random_chief_complaint();
      let known = CATEGORIES
        .iter()
        .any(|(_, complaints)| complaints.contains(&chief.as_str()));
      assert!(known, "unknown complaint: {chief}");
    }
  }

  #[test]
  fn seed_cases_carry_complete_answer_keys() {
    for case in seed_cases() {
      assert!(!case.answer_key.main_diagnosis.is_empty());
      assert!(!case.answer_key.differentials.is_empty());
      assert!(!case.answer_key.management.is_empty());
    }
  }
}
