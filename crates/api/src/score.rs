//! Percentage arithmetic and the employee awareness score.

/// Round to one decimal place, the precision used by every reported rate.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// `part / whole * 100`, rounded to one decimal. Zero when `whole` is zero.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    round1(part as f64 * 100.0 / whole as f64)
}

const COURSE_WEIGHT: f64 = 0.2;
const QUIZ_WEIGHT: f64 = 0.4;
const PHISHING_WEIGHT: f64 = 0.4;

/// Points contributed by each completed course, capped at 100.
const POINTS_PER_COURSE: i64 = 10;

/// Inputs of the awareness score, as stored on an employee profile.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProfileStats {
    pub completed_courses: i64,
    /// `None` when the employee never attempted a quiz.
    pub average_quiz_score: Option<f64>,
    pub phishing_tests_taken: i64,
    pub phishing_tests_passed: i64,
}

impl ProfileStats {
    pub fn phishing_pass_rate(&self) -> Option<f64> {
        (self.phishing_tests_taken > 0).then(|| {
            self.phishing_tests_passed.min(self.phishing_tests_taken) as f64 * 100.0
                / self.phishing_tests_taken as f64
        })
    }
}

/// Weighted mean of the components that have data.
///
/// Components without data are dropped and the remaining weights are
/// renormalised, so a new employee is not punished for a phishing test they
/// never received. No data at all yields 0.
pub fn awareness_score(stats: &ProfileStats) -> f64 {
    let course = (stats.completed_courses > 0)
        .then(|| (stats.completed_courses * POINTS_PER_COURSE).min(100) as f64);
    let quiz = stats.average_quiz_score.map(|s| s.clamp(0.0, 100.0));
    let phishing = stats.phishing_pass_rate();

    let components = [
        (course, COURSE_WEIGHT),
        (quiz, QUIZ_WEIGHT),
        (phishing, PHISHING_WEIGHT),
    ];

    let (sum, weight) = components
        .iter()
        .filter_map(|(value, weight)| value.map(|v| (v * weight, *weight)))
        .fold((0.0, 0.0), |(s, w), (v, wt)| (s + v, w + wt));

    if weight == 0.0 {
        return 0.0;
    }
    round1(sum / weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_handles_empty_denominator() {
        assert_eq!(percentage(3, 0), 0.0);
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
    }

    #[test]
    fn awareness_combines_all_components() {
        let stats = ProfileStats {
            completed_courses: 3,
            average_quiz_score: Some(85.0),
            phishing_tests_taken: 5,
            phishing_tests_passed: 4,
        };
        // 0.2 * 30 + 0.4 * 85 + 0.4 * 80
        assert_eq!(awareness_score(&stats), 72.0);
    }

    #[test]
    fn awareness_renormalises_missing_components() {
        let stats = ProfileStats {
            completed_courses: 0,
            average_quiz_score: Some(90.0),
            phishing_tests_taken: 0,
            phishing_tests_passed: 0,
        };
        assert_eq!(awareness_score(&stats), 90.0);
    }

    #[test]
    fn awareness_is_zero_without_data() {
        assert_eq!(awareness_score(&ProfileStats::default()), 0.0);
    }

    #[test]
    fn course_component_is_capped() {
        let stats = ProfileStats {
            completed_courses: 25,
            ..Default::default()
        };
        assert_eq!(awareness_score(&stats), 100.0);
    }
}
