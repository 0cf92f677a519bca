//! Textual closeness between two short strings (diagnosis matching).

/// Case-folded similarity ratio in [0.0, 1.0]. Symmetric, deterministic;
/// identical non-empty strings score 1.0, any comparison involving an empty
/// string scores 0.0 (two blanks are not a match).
pub fn similarity(a: &str, b: &str) -> f64 {
  let a = a.trim().to_lowercase();
  let b = b.trim().to_lowercase();
  if a.is_empty() || b.is_empty() {
    return 0.0;
  }
  strsim::normalized_levenshtein(&a, &b)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identical_strings_score_one() {
    assert_eq!(similarity("acute appendicitis", "acute appendicitis"), 1.0);
  }

  #[test]
  fn comparison_ignores_case_and_outer_whitespace() {
    assert_eq!(similarity("Acute Appendicitis", " acute appendicitis "), 1.0);
  }

  #[test]
  fn empty_against_non_empty_scores_zero() {
    assert_eq!(similarity("", "acute appendicitis"), 0.0);
    assert_eq!(similarity("acute appendicitis", ""), 0.0);
  }

  #[test]
  fn two_empty_strings_do_not_match() {
    assert_eq!(similarity("", ""), 0.0);
    assert_eq!(similarity("  ", "\t"), 0.0);
  }

  #[test]
  fn closer_strings_score_higher() {
    let near = similarity("acute appendicitis", "acute appendicitis?");
    let far = similarity("acute appendicitis", "migraine");
    assert!(near > 0.9, "near={near}");
    assert!(far < 0.4, "far={far}");
    assert!(near > far);
  }
}
