//! Onboarding session model and step tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Subscription plan a session was started under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Basic,
    Premium,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Premium => "premium",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "premium" => Self::Premium,
            _ => Self::Basic,
        }
    }
}

/// Lifecycle status of an onboarding session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initiated,
    InProgress,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Initiated,
        }
    }

    /// Whether the session can still accept step completions.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Initiated | Self::InProgress)
    }
}

/// A per-user record tracking progress through a named sequence of setup
/// steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingSession {
    pub id: String,
    pub user_id: String,
    pub plan_type: PlanType,
    pub status: SessionStatus,
    pub current_step: u32,
    pub total_steps: u32,
    pub steps_completed: Vec<String>,
    pub verification_request_id: Option<String>,
    pub video_session_id: Option<String>,
    pub video_token: Option<String>,
    pub ai_recommendations: serde_json::Value,
    pub personalization_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl OnboardingSession {
    /// Start a new session for a user.
    pub fn new(user_id: &str, plan_type: PlanType, total_steps: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            plan_type,
            status: SessionStatus::Initiated,
            current_step: 0,
            total_steps,
            steps_completed: Vec::new(),
            verification_request_id: None,
            video_session_id: None,
            video_token: None,
            ai_recommendations: json!({}),
            personalization_score: 0.0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Record a completed step.
    ///
    /// Appends `step_name` only if it is not already present, then derives
    /// `current_step` from the list length. The first completion moves the
    /// session into `in_progress`; reaching `total_steps` flips it to
    /// `completed` and stamps `completed_at` exactly once. Duplicate step
    /// names are a no-op.
    pub fn complete_step(&mut self, step_name: &str) -> bool {
        if self.steps_completed.iter().any(|s| s == step_name) {
            return false;
        }
        self.steps_completed.push(step_name.to_string());
        self.current_step = self.steps_completed.len() as u32;
        self.updated_at = Utc::now();

        if self.current_step >= self.total_steps {
            if self.status != SessionStatus::Completed {
                self.status = SessionStatus::Completed;
                self.completed_at = Some(Utc::now());
            }
        } else if self.status == SessionStatus::Initiated {
            self.status = SessionStatus::InProgress;
        }
        true
    }

    /// Percent of steps completed, clamped so extra steps never push the
    /// figure past 100.
    pub fn progress_percentage(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        let done = (self.steps_completed.len() as u32).min(self.total_steps);
        f64::from(done) / f64::from(self.total_steps) * 100.0
    }

    /// API representation, including the derived progress figure.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "session_id": self.id,
            "user_id": self.user_id,
            "plan_type": self.plan_type,
            "status": self.status,
            "current_step": self.current_step,
            "total_steps": self.total_steps,
            "steps_completed": self.steps_completed,
            "progress_percentage": self.progress_percentage(),
            "verification_request_id": self.verification_request_id,
            "video_session_id": self.video_session_id,
            "ai_recommendations": self.ai_recommendations,
            "personalization_score": self.personalization_score,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
            "completed_at": self.completed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(total_steps: u32) -> OnboardingSession {
        OnboardingSession::new("user-1", PlanType::Basic, total_steps)
    }

    #[test]
    fn test_complete_step_is_idempotent() {
        let mut s = session(4);
        assert!(s.complete_step("welcome_sms"));
        assert_eq!(s.current_step, 1);

        assert!(!s.complete_step("welcome_sms"));
        assert_eq!(s.current_step, 1);
        assert_eq!(s.steps_completed, vec!["welcome_sms"]);
    }

    #[test]
    fn test_first_step_moves_to_in_progress() {
        let mut s = session(4);
        assert_eq!(s.status, SessionStatus::Initiated);
        s.complete_step("welcome_sms");
        assert_eq!(s.status, SessionStatus::InProgress);
    }

    #[test]
    fn test_completion_happens_exactly_at_total_steps() {
        let mut s = session(2);
        s.complete_step("a");
        assert_eq!(s.status, SessionStatus::InProgress);
        assert!(s.completed_at.is_none());

        s.complete_step("b");
        assert_eq!(s.status, SessionStatus::Completed);
        assert!(s.completed_at.is_some());
    }

    #[test]
    fn test_completed_at_is_stamped_once() {
        let mut s = session(1);
        s.complete_step("a");
        let first = s.completed_at;
        assert!(first.is_some());

        // An extra step past total_steps must not restamp the timestamp.
        s.complete_step("b");
        assert_eq!(s.completed_at, first);
        assert_eq!(s.status, SessionStatus::Completed);
    }

    #[test]
    fn test_progress_percentage() {
        let mut s = session(4);
        assert_eq!(s.progress_percentage(), 0.0);
        s.complete_step("a");
        assert_eq!(s.progress_percentage(), 25.0);
        s.complete_step("b");
        assert_eq!(s.progress_percentage(), 50.0);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut s = session(2);
        s.complete_step("a");
        s.complete_step("b");
        s.complete_step("c");
        assert_eq!(s.progress_percentage(), 100.0);
        // current_step still reflects the raw list length.
        assert_eq!(s.current_step, 3);
    }

    #[test]
    fn test_zero_total_steps_has_zero_progress() {
        let s = session(0);
        assert_eq!(s.progress_percentage(), 0.0);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            SessionStatus::Initiated,
            SessionStatus::InProgress,
            SessionStatus::Completed,
            SessionStatus::Failed,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), status);
        }
    }
}
