//! Examiner's mark sheet rendering: a deterministic markdown report built
//! from the reconciled raw scores and the diagnosis comparison.

use crate::eval::RawScores;
use crate::rubric::Rubric;

/// Global rating thresholds on the overall percentage.
pub const CLEAR_PASS_PCT: f64 = 70.0;
pub const BORDERLINE_PCT: f64 = 60.0;

pub fn global_rating(total_score: f64) -> &'static str {
  if total_score >= CLEAR_PASS_PCT {
    "Clear Pass"
  } else if total_score >= BORDERLINE_PCT {
    "Borderline"
  } else {
    "Clear Fail"
  }
}

fn score_label(score: u8) -> &'static str {
  match score {
    0 => "ND=0",
    3 => "PD=3",
    _ => "WD=5",
  }
}

/// Render the mark sheet. Every rubric item gets a numbered row in rubric
/// order; a stored array shorter than the section reads as 0 rather than
/// going out of range.
pub fn render_mark_sheet(
  rubric: &Rubric,
  raw_scores: &RawScores,
  student_dx: &str,
  correct_dx: &str,
  dx_score: u32,
  total_score: f64,
  comments: &str,
) -> String {
  let mut md: Vec<String> = vec![
    "### Examiner's Mark Sheet".into(),
    "| Item | Score |".into(),
    "|---|---|".into(),
  ];
  let mut idx = 1usize;

  for (section, items) in rubric.sections() {
    md.push(format!("**{}:**", section.heading()));
    let section_scores = raw_scores.get(*section);
    for (i, item) in items.iter().enumerate() {
      let score = section_scores.get(i).copied().unwrap_or(0);
      md.push(format!("| {idx}. {item} | {score} ({}) |", score_label(score)));
      idx += 1;
    }
  }

  md.push("\n**Diagnosis Assessment:**".into());
  md.push(format!("Student diagnosis: {student_dx}"));
  md.push(format!("Correct diagnosis: {correct_dx}"));
  md.push(format!("Diagnosis score: {dx_score}%"));

  let max_score = rubric.max_score();
  let points = (max_score as f64 * total_score / 100.0) as u32;
  md.push(format!("\n**Total Score:** {total_score:.1}% ({points}/{max_score})"));
  md.push(format!("\n**Global Rating:** {}", global_rating(total_score)));

  md.push("\n**Examiner's Comments:**".into());
  md.push(if comments.is_empty() {
    "No specific comments provided.".into()
  } else {
    comments.to_string()
  });

  md.join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rubric::Section;

  fn small_rubric() -> Rubric {
    Rubric::new(vec![
      (Section::History, vec!["asks about onset".into(), "asks about family history".into()]),
      (Section::Exam, vec!["measures vital signs".into()]),
    ])
  }

  #[test]
  fn rating_thresholds() {
    assert_eq!(global_rating(72.3), "Clear Pass");
    assert_eq!(global_rating(70.0), "Clear Pass");
    assert_eq!(global_rating(65.0), "Borderline");
    assert_eq!(global_rating(60.0), "Borderline");
    assert_eq!(global_rating(59.9), "Clear Fail");
    assert_eq!(global_rating(40.0), "Clear Fail");
  }

  #[test]
  fn renders_numbered_rows_in_rubric_order() {
    let rubric = small_rubric();
    let raw = RawScores { history: vec![5, 0], exam: vec![3], ..RawScores::default() };
    let sheet = render_mark_sheet(&rubric, &raw, "appendicitis", "Acute appendicitis", 75, 72.3, "good");
    assert!(sheet.contains("| 1. asks about onset | 5 (WD=5) |"));
    assert!(sheet.contains("| 2. asks about family history | 0 (ND=0) |"));
    assert!(sheet.contains("| 3. measures vital signs | 3 (PD=3) |"));
    assert!(sheet.contains("**History:**"));
    assert!(sheet.contains("**Exam:**"));
    assert!(sheet.contains("Student diagnosis: appendicitis"));
    assert!(sheet.contains("Diagnosis score: 75%"));
    assert!(sheet.contains("**Total Score:** 72.3% (10/15)"));
    assert!(sheet.contains("**Global Rating:** Clear Pass"));
    assert!(sheet.contains("good"));
  }

  #[test]
  fn short_score_array_reads_as_zero() {
    let rubric = small_rubric();
    let raw = RawScores { history: vec![5], ..RawScores::default() };
    let sheet = render_mark_sheet(&rubric, &raw, "", "Acute appendicitis", 0, 20.0, "");
    assert!(sheet.contains("| 2. asks about family history | 0 (ND=0) |"));
    assert!(sheet.contains("| 3. measures vital signs | 0 (ND=0) |"));
    assert!(sheet.contains("No specific comments provided."));
    assert!(sheet.contains("**Global Rating:** Clear Fail"));
  }
}
