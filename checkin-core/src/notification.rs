use crate::error::CheckinError;
use crate::outcome::MatchDetails;

/// Why a call failed, as far as the user is concerned.
///
/// `Processing` covers answers the service gave (rejection, non-200, bad
/// body); `Unreachable` covers everything that prevented an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Processing,
    Unreachable,
}

impl From<&CheckinError> for FailureKind {
    fn from(err: &CheckinError) -> Self {
        match err {
            CheckinError::Transport(_)
            | CheckinError::Acquisition(_)
            | CheckinError::PermissionDenied => FailureKind::Unreachable,
            _ => FailureKind::Processing,
        }
    }
}

/// Labels of the two choices offered with a pending match.
pub const CHOICE_CORRECT: &str = "Correct";
pub const CHOICE_NOT_CORRECT: &str = "Not Correct";

/// User-facing result of a check-in step.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    CheckinSucceeded(MatchDetails),
    ConfirmationRequested(MatchDetails),
    CheckinFailed(FailureKind),
    ConfirmationSucceeded,
    ConfirmationFailed(FailureKind),
}

impl Notification {
    pub fn title(&self) -> &'static str {
        match self {
            Notification::CheckinSucceeded(_) | Notification::ConfirmationRequested(_) => {
                "Checkin Success"
            }
            Notification::CheckinFailed(_) => "Checkin Failed",
            Notification::ConfirmationSucceeded => "Confirmation Success",
            Notification::ConfirmationFailed(_) => "Confirmation Failed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notification::CheckinSucceeded(details) => details.to_string(),
            Notification::ConfirmationRequested(details) => format!(
                "Please confirm the information below is correct or not.\n{}",
                details
            ),
            Notification::CheckinFailed(FailureKind::Processing) => {
                "Failed to process the image. Please try again later.".to_string()
            }
            Notification::CheckinFailed(FailureKind::Unreachable) => {
                "An error occurred while processing the image. Please try again later.".to_string()
            }
            Notification::ConfirmationSucceeded => {
                "Information confirmed successfully.".to_string()
            }
            Notification::ConfirmationFailed(FailureKind::Processing) => {
                "Failed to confirm the information. Please try again later.".to_string()
            }
            Notification::ConfirmationFailed(FailureKind::Unreachable) => {
                "An error occurred while confirming the information. Please try again later."
                    .to_string()
            }
        }
    }

    /// Choices the user must pick from before the notification closes.
    pub fn choices(&self) -> &'static [&'static str] {
        match self {
            Notification::ConfirmationRequested(_) => &[CHOICE_CORRECT, CHOICE_NOT_CORRECT],
            _ => &[],
        }
    }

    pub fn details(&self) -> Option<&MatchDetails> {
        match self {
            Notification::CheckinSucceeded(d) | Notification::ConfirmationRequested(d) => Some(d),
            _ => None,
        }
    }
}
