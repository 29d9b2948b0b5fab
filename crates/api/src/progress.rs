//! Course progress state machine.
//!
//! An employee assignment moves `assigned → in_progress → completed`. Video
//! watching and quiz attempts update a [`CourseProgress`]; after every update
//! [`advance`] decides the assignment's next status. Completion requires both
//! the watch threshold and a passed quiz (when the course has one).

use crate::score::round1;
use crate::{AssignmentStatus, ServiceError};

/// Watch share required before a course counts as watched.
pub const DEFAULT_REQUIRED_WATCH_PERCENTAGE: i64 = 80;

/// Quiz score required when the course has no quiz configured yet.
pub const DEFAULT_REQUIRED_QUIZ_SCORE: f64 = 70.0;

/// Per-assignment progress counters.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseProgress {
    pub video_total_seconds: i64,
    pub video_watched_seconds: i64,
    pub total_time_spent: i64,
    pub required_watch_percentage: i64,
    pub required_quiz_score: f64,
    pub quiz_attempts: i64,
    pub best_quiz_score: Option<f64>,
    pub passed_quiz: bool,
}

impl CourseProgress {
    /// Fresh progress for a video of `video_total_seconds`.
    pub fn new(video_total_seconds: i64, required_quiz_score: f64) -> Self {
        Self {
            video_total_seconds: video_total_seconds.max(0),
            video_watched_seconds: 0,
            total_time_spent: 0,
            required_watch_percentage: DEFAULT_REQUIRED_WATCH_PERCENTAGE,
            required_quiz_score,
            quiz_attempts: 0,
            best_quiz_score: None,
            passed_quiz: false,
        }
    }

    /// Share of the video watched, 0–100, one decimal.
    pub fn watch_percentage(&self) -> f64 {
        if self.video_total_seconds <= 0 {
            return 100.0;
        }
        let pct = self.video_watched_seconds as f64 * 100.0 / self.video_total_seconds as f64;
        round1(pct.min(100.0))
    }

    /// Whether the watch threshold is reached. Integer arithmetic keeps the
    /// boundary exact: 2160 of 2700 seconds at 80% is complete.
    pub fn video_complete(&self) -> bool {
        if self.video_total_seconds <= 0 {
            return true;
        }
        self.video_watched_seconds * 100
            >= self.video_total_seconds * self.required_watch_percentage
    }

    /// Record the player position. The watched counter never decreases and
    /// never exceeds the video length.
    pub fn record_watch(
        &mut self,
        watched_seconds: i64,
        time_spent_seconds: i64,
    ) -> Result<(), ServiceError> {
        if watched_seconds < 0 || time_spent_seconds < 0 {
            return Err(ServiceError::BadRequest(
                "watched and spent seconds must not be negative".into(),
            ));
        }
        let capped = watched_seconds.min(self.video_total_seconds);
        self.video_watched_seconds = self.video_watched_seconds.max(capped);
        self.total_time_spent = self.total_time_spent.saturating_add(time_spent_seconds);
        Ok(())
    }

    /// Record a graded quiz attempt. The best score is kept; the grader's
    /// verdict decides the pass, and a pass is never taken back.
    pub fn record_attempt(&mut self, score: f64, passed: bool) {
        self.quiz_attempts += 1;
        self.best_quiz_score = Some(match self.best_quiz_score {
            Some(best) => best.max(score),
            None => score,
        });
        self.passed_quiz |= passed;
    }

    /// Both completion requirements. A course without a quiz only needs the
    /// video.
    pub fn requirements_met(&self, has_quiz: bool) -> bool {
        self.video_complete() && (!has_quiz || self.passed_quiz)
    }
}

/// Outcome of [`advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub status: AssignmentStatus,
    pub progress_percentage: f64,
    /// The assignment left `assigned` in this step.
    pub started: bool,
    /// The assignment reached `completed` in this step.
    pub completed: bool,
}

/// Reject activity on an assignment that is already completed.
pub fn ensure_open(status: AssignmentStatus) -> Result<(), ServiceError> {
    if status == AssignmentStatus::Completed {
        return Err(ServiceError::Conflict("assignment already completed".into()));
    }
    Ok(())
}

/// Compute the next status after learner activity.
///
/// Any activity moves `assigned` to `in_progress`; meeting all requirements
/// moves to `completed` with 100% progress. `completed` is terminal.
pub fn advance(current: AssignmentStatus, progress: &CourseProgress, has_quiz: bool) -> Step {
    if current == AssignmentStatus::Completed {
        return Step {
            status: current,
            progress_percentage: 100.0,
            started: false,
            completed: false,
        };
    }

    if progress.requirements_met(has_quiz) {
        return Step {
            status: AssignmentStatus::Completed,
            progress_percentage: 100.0,
            started: current == AssignmentStatus::Assigned,
            completed: true,
        };
    }

    Step {
        status: AssignmentStatus::InProgress,
        progress_percentage: progress.watch_percentage(),
        started: current == AssignmentStatus::Assigned,
        completed: false,
    }
}

/// An assignment is overdue when its due date is before `today` and it is
/// not completed. Dates are ISO `YYYY-MM-DD`, so string order is date order.
pub fn is_overdue(status: AssignmentStatus, due_date: Option<&str>, today: &str) -> bool {
    status != AssignmentStatus::Completed && due_date.is_some_and(|d| d < today)
}
