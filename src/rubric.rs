//! The fixed OSCE marking rubric: checklist items grouped by section.
//!
//! Section order and item order are fixed at startup and never change for the
//! lifetime of the process; every percentage and the mark sheet numbering
//! depend on that stability. Each item is worth 5 points (WD=5, PD=3, ND=0).

use serde::{Deserialize, Serialize};

/// Per-item maximum (Well Done).
pub const ITEM_MAX: u32 = 5;

/// Rubric sections, in marking-sheet order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
  History,
  Exam,
  Lab,
  Management,
  Interaction,
}

impl Section {
  pub const ALL: [Section; 5] = [
    Section::History,
    Section::Exam,
    Section::Lab,
    Section::Management,
    Section::Interaction,
  ];

  /// Lowercase key used in prompts, JSON responses, and report fields.
  pub fn key(self) -> &'static str {
    match self {
      Section::History => "history",
      Section::Exam => "exam",
      Section::Lab => "lab",
      Section::Management => "management",
      Section::Interaction => "interaction",
    }
  }

  /// Heading used on the rendered mark sheet.
  pub fn heading(self) -> &'static str {
    match self {
      Section::History => "History",
      Section::Exam => "Exam",
      Section::Lab => "Lab and Radiology",
      Section::Management => "Management",
      Section::Interaction => "Doctor/Patient Interaction",
    }
  }
}

/// An ordered, immutable section -> items mapping. Built once at startup and
/// shared by reference into the scorer; tests build small custom rubrics.
#[derive(Clone, Debug)]
pub struct Rubric {
  sections: Vec<(Section, Vec<String>)>,
}

impl Rubric {
  pub fn new(sections: Vec<(Section, Vec<String>)>) -> Self {
    Self { sections }
  }

  pub fn sections(&self) -> &[(Section, Vec<String>)] {
    &self.sections
  }

  pub fn items(&self, section: Section) -> &[String] {
    self
      .sections
      .iter()
      .find(|(s, _)| *s == section)
      .map(|(_, items)| items.as_slice())
      .unwrap_or(&[])
  }

  pub fn item_count(&self, section: Section) -> usize {
    self.items(section).len()
  }

  pub fn total_items(&self) -> usize {
    self.sections.iter().map(|(_, items)| items.len()).sum()
  }

  /// Maximum attainable raw score across the whole rubric.
  pub fn max_score(&self) -> u32 {
    self.total_items() as u32 * ITEM_MAX
  }

  /// Every item in rubric order (section order, then item order).
  pub fn flattened(&self) -> Vec<String> {
    self
      .sections
      .iter()
      .flat_map(|(_, items)| items.iter().cloned())
      .collect()
  }

  /// The standard 35-item marking sheet.
  pub fn standard() -> Self {
    fn items(xs: &[&str]) -> Vec<String> {
      xs.iter().map(|s| s.to_string()).collect()
    }
    Self::new(vec![
      (
        Section::History,
        items(&[
          "Greets the patient / introduces self and establishes good rapport",
          "Clarifies details of the chief complaint",
          "Asks about associated symptoms related to the presenting system",
          "Rules out emergency case red flags",
          "Rules out B-symptom red flags",
          "Performs review of systems",
          "Takes obstetric and gynecological history (for female patients)",
          "Asks about past medical history: includes admissions, chronic diseases, similar episodes",
          "Asks about past surgical history",
          "Asks about drug and allergy history",
          "Asks about family history",
          "Takes social history: diet, exercise, alcohol, drugs, smoking, occupation, marital status, etc.",
          "Takes neonatal history (for pediatric patients): mode of delivery, gestational age, diseases, infections, medications, pregnancy history, birth weight, postnatal admissions",
          "Asks about developmental milestones (for pediatric patients)",
          "Elicits ICEE (Ideas, Concerns, Expectations, and Effects on life)",
          "Screens using PHQ2",
          "Screens for vaccination and preventive health relevant to age and sex",
        ]),
      ),
      (
        Section::Exam,
        items(&[
          "Takes permission, washes hands, maintains privacy",
          "Measures vital signs",
          "Assesses general appearance",
          "Examines the main system involved in the chief complaint",
          "Examines related systems as relevant to the main system",
          "Elicits specific signs to confirm the suspected diagnosis",
          "Performs focused examinations if specific instruments are provided",
        ]),
      ),
      (
        Section::Lab,
        items(&[
          "Orders or explains lab investigations as required",
          "Recognizes and interprets radiological findings appropriately",
        ]),
      ),
      (
        Section::Management,
        items(&[
          "Clarifies diagnosis and explains management options",
          "Reassures the patient with empathy and honesty",
          "Provides non-pharmacological advice",
          "Prescribes pharmacological treatment",
          "Refers to appropriate services as needed (specialists, physiotherapy, nutrition, smoking cessation, social worker, etc.)",
          "Orders further investigations as needed",
          "Advises on follow-up/observation",
          "Discusses disease prevention and health promotion (e.g. vaccines, screenings)",
        ]),
      ),
      (
        Section::Interaction,
        items(&[
          "Demonstrates effective communication (verbal and non-verbal), active listening, open-ended questions, and empathy",
        ]),
      ),
    ])
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn standard_rubric_shape_is_stable() {
    let r = Rubric::standard();
    let order: Vec<Section> = r.sections().iter().map(|(s, _)| *s).collect();
    assert_eq!(order, Section::ALL.to_vec());
    assert_eq!(r.item_count(Section::History), 17);
    assert_eq!(r.item_count(Section::Exam), 7);
    assert_eq!(r.item_count(Section::Lab), 2);
    assert_eq!(r.item_count(Section::Management), 8);
    assert_eq!(r.item_count(Section::Interaction), 1);
    assert_eq!(r.total_items(), 35);
    assert_eq!(r.max_score(), 175);
  }

  #[test]
  fn flattened_preserves_section_then_item_order() {
    let r = Rubric::new(vec![
      (Section::History, vec!["h1".into(), "h2".into()]),
      (Section::Exam, vec!["e1".into()]),
    ]);
    assert_eq!(r.flattened(), vec!["h1", "h2", "e1"]);
    assert_eq!(r.max_score(), 15);
  }

  #[test]
  fn missing_section_is_empty_not_a_panic() {
    let r = Rubric::new(vec![(Section::History, vec!["h1".into()])]);
    assert!(r.items(Section::Lab).is_empty());
    assert_eq!(r.item_count(Section::Lab), 0);
  }
}
