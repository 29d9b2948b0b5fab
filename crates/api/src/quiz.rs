//! Quiz question validation, attempt policy, and grading.

use std::collections::{BTreeMap, BTreeSet};

use crate::score::round1;
use crate::{QuestionType, ServiceError};

const OPTION_LETTERS: [&str; 4] = ["A", "B", "C", "D"];

/// Parse a comma-separated answer key (`"B, d"`) into a set of upper-case
/// option letters.
pub fn parse_answer_key(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Normalize submitted letters the same way as stored keys.
pub fn normalize_answers(raw: &[String]) -> BTreeSet<String> {
    raw.iter()
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Validate a question's answer key against its type and filled-in options.
/// Returns the canonical key (`"B,D"`).
pub fn validate_answer_key(
    question_type: QuestionType,
    options: [Option<&str>; 4],
    correct_answers: &str,
) -> Result<String, ServiceError> {
    let key = parse_answer_key(correct_answers);
    if key.is_empty() {
        return Err(ServiceError::BadRequest(
            "at least one correct answer is required".into(),
        ));
    }

    let available: BTreeSet<&str> = match question_type {
        QuestionType::TrueFalse => ["A", "B"].into_iter().collect(),
        _ => OPTION_LETTERS
            .iter()
            .zip(options.iter())
            .filter(|(_, opt)| opt.is_some_and(|o| !o.trim().is_empty()))
            .map(|(letter, _)| *letter)
            .collect(),
    };

    if available.len() < 2 {
        return Err(ServiceError::BadRequest(
            "a question needs at least two options".into(),
        ));
    }
    if let Some(bad) = key.iter().find(|k| !available.contains(k.as_str())) {
        return Err(ServiceError::BadRequest(format!(
            "correct answer {bad} is not one of the question's options"
        )));
    }
    if question_type != QuestionType::MultipleSelect && key.len() != 1 {
        return Err(ServiceError::BadRequest(format!(
            "{question_type} questions have exactly one correct answer"
        )));
    }

    Ok(key.into_iter().collect::<Vec<_>>().join(","))
}

/// Grading view of one stored question.
#[derive(Debug, Clone)]
pub struct AnswerKey {
    pub question_id: String,
    pub correct: BTreeSet<String>,
    pub points: i64,
}

/// Result of grading a full submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub earned_points: i64,
    pub total_points: i64,
    /// Percentage of points earned, one decimal.
    pub score: f64,
}

/// Grade answers keyed by question id. A question earns its points only when
/// the chosen set equals the correct set exactly; partial selections earn
/// nothing. Unanswered questions earn nothing.
pub fn grade(keys: &[AnswerKey], answers: &BTreeMap<String, Vec<String>>) -> Grade {
    let total_points: i64 = keys.iter().map(|k| k.points.max(0)).sum();
    let earned_points: i64 = keys
        .iter()
        .filter(|k| {
            answers
                .get(&k.question_id)
                .is_some_and(|chosen| normalize_answers(chosen) == k.correct)
        })
        .map(|k| k.points.max(0))
        .sum();

    let score = if total_points > 0 {
        round1(earned_points as f64 * 100.0 / total_points as f64)
    } else {
        0.0
    };

    Grade {
        earned_points,
        total_points,
        score,
    }
}

/// Per-quiz limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptPolicy {
    pub passing_score: f64,
    /// Zero means no time limit.
    pub time_limit_minutes: i64,
    /// Zero means unlimited attempts.
    pub max_attempts: i64,
}

impl AttemptPolicy {
    /// Reject a new attempt when the quiz is already passed or the attempt
    /// budget is spent.
    pub fn check_can_attempt(
        &self,
        previous_attempts: i64,
        already_passed: bool,
    ) -> Result<(), ServiceError> {
        if already_passed {
            return Err(ServiceError::Conflict("quiz already passed".into()));
        }
        if self.max_attempts > 0 && previous_attempts >= self.max_attempts {
            return Err(ServiceError::Conflict(format!(
                "maximum of {} quiz attempts reached",
                self.max_attempts
            )));
        }
        Ok(())
    }

    pub fn is_late(&self, time_taken_seconds: i64) -> bool {
        self.time_limit_minutes > 0 && time_taken_seconds > self.time_limit_minutes * 60
    }

    /// A late attempt is scored but never passes.
    pub fn evaluate(&self, grade: &Grade, time_taken_seconds: i64) -> AttemptOutcome {
        let late = self.is_late(time_taken_seconds);
        AttemptOutcome {
            score: grade.score,
            passed: !late && grade.total_points > 0 && grade.score >= self.passing_score,
            late,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptOutcome {
    pub score: f64,
    pub passed: bool,
    pub late: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phishing_quiz() -> Vec<AnswerKey> {
        vec![
            AnswerKey {
                question_id: "q1".into(),
                correct: parse_answer_key("B"),
                points: 10,
            },
            AnswerKey {
                question_id: "q2".into(),
                correct: parse_answer_key("B,D"),
                points: 15,
            },
        ]
    }

    fn answers(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(q, a)| (q.to_string(), a.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn full_marks_for_exact_answers() {
        let g = grade(&phishing_quiz(), &answers(&[("q1", &["b"]), ("q2", &["D", "B"])]));
        assert_eq!(g.earned_points, 25);
        assert_eq!(g.score, 100.0);
    }

    #[test]
    fn partial_multi_select_earns_nothing() {
        let g = grade(&phishing_quiz(), &answers(&[("q1", &["B"]), ("q2", &["B"])]));
        assert_eq!(g.earned_points, 10);
        assert_eq!(g.score, 40.0);
    }

    #[test]
    fn unanswered_quiz_scores_zero() {
        let g = grade(&phishing_quiz(), &BTreeMap::new());
        assert_eq!(g.score, 0.0);
        assert_eq!(g.total_points, 25);
    }

    #[test]
    fn answer_key_must_match_options() {
        let opts = [Some("a"), Some("b"), None, None];
        assert_eq!(
            validate_answer_key(QuestionType::MultipleChoice, opts, " b ").unwrap(),
            "B"
        );
        assert!(validate_answer_key(QuestionType::MultipleChoice, opts, "C").is_err());
        assert!(validate_answer_key(QuestionType::MultipleChoice, opts, "A,B").is_err());
        assert_eq!(
            validate_answer_key(QuestionType::MultipleSelect, opts, "b,a").unwrap(),
            "A,B"
        );
        assert_eq!(
            validate_answer_key(QuestionType::TrueFalse, [None; 4], "a").unwrap(),
            "A"
        );
        assert!(validate_answer_key(QuestionType::MultipleChoice, opts, "").is_err());
    }

    #[test]
    fn attempt_budget_is_enforced() {
        let policy = AttemptPolicy {
            passing_score: 70.0,
            time_limit_minutes: 30,
            max_attempts: 2,
        };
        assert!(policy.check_can_attempt(1, false).is_ok());
        assert!(policy.check_can_attempt(2, false).is_err());
        assert!(policy.check_can_attempt(0, true).is_err());

        let unlimited = AttemptPolicy {
            max_attempts: 0,
            ..policy
        };
        assert!(unlimited.check_can_attempt(50, false).is_ok());
    }

    #[test]
    fn late_attempt_never_passes() {
        let policy = AttemptPolicy {
            passing_score: 70.0,
            time_limit_minutes: 30,
            max_attempts: 0,
        };
        let g = Grade {
            earned_points: 25,
            total_points: 25,
            score: 100.0,
        };
        let on_time = policy.evaluate(&g, 1200);
        assert!(on_time.passed && !on_time.late);
        let late = policy.evaluate(&g, 1801);
        assert!(!late.passed && late.late);
        assert_eq!(late.score, 100.0);
    }
}
