//! The check-in state machine.
//!
//! One attempt runs `Idle -> Capturing -> Uploading` and settles either back
//! in `Idle` or in `AwaitingConfirmation`, where the user picks `confirm` or
//! `dismiss`. Busy is a property of the state, so every path that settles the
//! state also clears it.

use log::{error, info, warn};

use crate::camera::{Camera, CaptureHandle};
use crate::error::{CheckinError, Result};
use crate::notification::{FailureKind, Notification};
use crate::outcome::{MatchDetails, OutcomeStatus, RecognitionResult, RecordId};
use crate::service::CheckinService;

#[derive(Debug, Clone, PartialEq)]
pub enum CheckinState {
    Idle,
    Capturing,
    Uploading,
    /// A candidate match waits for the user's verdict.
    AwaitingConfirmation(PendingMatch),
    Confirming(RecordId),
}

impl CheckinState {
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            CheckinState::Capturing | CheckinState::Uploading | CheckinState::Confirming(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingMatch {
    pub record_id: RecordId,
    pub details: MatchDetails,
}

/// How an upload attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome {
    Confirmed(MatchDetails),
    PendingConfirmation(PendingMatch),
    Failed(CheckinError),
}

/// How a confirmation round-trip ended.
#[derive(Debug)]
pub enum ConfirmationOutcome {
    Confirmed,
    Failed(CheckinError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckinEvent {
    StateChanged(CheckinState),
    Notify(Notification),
}

/// Receives controller events; the UI layer implements this.
pub trait EventSink {
    fn emit(&self, event: CheckinEvent);
}

impl<F: Fn(CheckinEvent)> EventSink for F {
    fn emit(&self, event: CheckinEvent) {
        self(event)
    }
}

/// Maps a parsed `/process` body to an attempt outcome.
pub fn classify(result: RecognitionResult) -> AttemptOutcome {
    let Some(code) = result.status else {
        return AttemptOutcome::Failed(CheckinError::MalformedResponse(
            "response has no status".to_string(),
        ));
    };

    match OutcomeStatus::from_code(code) {
        OutcomeStatus::Confirmed => AttemptOutcome::Confirmed(result.details()),
        OutcomeStatus::PendingConfirmation => match result.id {
            Some(record_id) => AttemptOutcome::PendingConfirmation(PendingMatch {
                record_id,
                details: result.details(),
            }),
            None => AttemptOutcome::Failed(CheckinError::MalformedResponse(
                "pending match without a record id".to_string(),
            )),
        },
        OutcomeStatus::Failed => {
            if !OutcomeStatus::is_known_code(code) {
                warn!("Unknown recognition status {}, treating as failure", code);
            }
            AttemptOutcome::Failed(CheckinError::Rejected { code })
        }
    }
}

pub struct CheckinController<C, S, E> {
    camera: C,
    service: S,
    events: E,
    state: CheckinState,
}

impl<C: Camera, S: CheckinService, E: EventSink> CheckinController<C, S, E> {
    pub fn new(camera: C, service: S, events: E) -> Self {
        Self {
            camera,
            service,
            events,
            state: CheckinState::Idle,
        }
    }

    pub fn state(&self) -> &CheckinState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state.is_busy()
    }

    /// True when a new attempt may be started.
    pub fn can_capture(&self) -> bool {
        self.state == CheckinState::Idle
    }

    pub fn pending(&self) -> Option<&PendingMatch> {
        match &self.state {
            CheckinState::AwaitingConfirmation(pending) => Some(pending),
            _ => None,
        }
    }

    /// Starts an attempt: capture, upload, classify.
    ///
    /// Returns an error without side effects while another operation is in
    /// flight or a match is waiting for the user. Failures of the attempt
    /// itself come back as `AttemptOutcome::Failed` after the failure
    /// notification has been emitted.
    pub fn request_capture(&mut self) -> Result<AttemptOutcome> {
        match &self.state {
            CheckinState::Idle => {}
            CheckinState::AwaitingConfirmation(_) => return Err(CheckinError::ConfirmationPending),
            _ => return Err(CheckinError::Busy),
        }

        info!("Check-in attempt started");
        self.set_state(CheckinState::Capturing);

        let outcome = match self.camera.capture() {
            Ok(handle) => self.submit_image(handle),
            Err(e) => {
                error!("Capture failed: {}", e);
                AttemptOutcome::Failed(e)
            }
        };

        self.settle_attempt(&outcome);
        Ok(outcome)
    }

    /// Uploads the capture; the handle and its file are gone once the call
    /// returns.
    fn submit_image(&mut self, handle: CaptureHandle) -> AttemptOutcome {
        self.set_state(CheckinState::Uploading);
        info!("Uploading {}", handle.file_name());

        let response = self.service.process(&handle);
        drop(handle);

        match response {
            Ok(result) => classify(result),
            Err(e) => {
                match &e {
                    CheckinError::Transport(_) => error!("Upload failed: {}", e),
                    _ => warn!("Upload rejected: {}", e),
                }
                AttemptOutcome::Failed(e)
            }
        }
    }

    fn settle_attempt(&mut self, outcome: &AttemptOutcome) {
        match outcome {
            AttemptOutcome::Confirmed(details) => {
                info!(
                    "Checked in {} ({})",
                    details.name.as_deref().unwrap_or("?"),
                    details.student_id.as_deref().unwrap_or("?")
                );
                self.set_state(CheckinState::Idle);
                self.notify(Notification::CheckinSucceeded(details.clone()));
            }
            AttemptOutcome::PendingConfirmation(pending) => {
                info!("Record {} needs confirmation", pending.record_id);
                self.set_state(CheckinState::AwaitingConfirmation(pending.clone()));
                self.notify(Notification::ConfirmationRequested(pending.details.clone()));
            }
            AttemptOutcome::Failed(e) => {
                info!("Check-in failed: {}", e);
                self.set_state(CheckinState::Idle);
                self.notify(Notification::CheckinFailed(FailureKind::from(e)));
            }
        }
    }

    /// The "Correct" answer to the pending match.
    pub fn confirm(&mut self) -> Result<ConfirmationOutcome> {
        let record_id = self.require_pending()?.record_id;
        self.confirm_record(record_id)
    }

    /// Sends `/confirm` for `record_id`, which must be the pending match.
    pub fn confirm_record(&mut self, record_id: RecordId) -> Result<ConfirmationOutcome> {
        let expected = self.require_pending()?.record_id;
        if expected != record_id {
            return Err(CheckinError::RecordMismatch {
                expected,
                actual: record_id,
            });
        }

        self.set_state(CheckinState::Confirming(record_id));
        let outcome = match self.service.confirm(record_id) {
            Ok(()) => {
                info!("Record {} confirmed", record_id);
                ConfirmationOutcome::Confirmed
            }
            Err(e) => {
                match &e {
                    CheckinError::Transport(_) => error!("Confirmation failed: {}", e),
                    _ => warn!("Confirmation rejected: {}", e),
                }
                ConfirmationOutcome::Failed(e)
            }
        };

        self.set_state(CheckinState::Idle);
        match &outcome {
            ConfirmationOutcome::Confirmed => self.notify(Notification::ConfirmationSucceeded),
            ConfirmationOutcome::Failed(e) => {
                self.notify(Notification::ConfirmationFailed(FailureKind::from(e)))
            }
        }
        Ok(outcome)
    }

    /// The "Not Correct" answer: drop the pending match without contacting
    /// the service.
    pub fn dismiss(&mut self) -> Result<()> {
        let record_id = self.require_pending()?.record_id;
        info!("Record {} dismissed", record_id);
        self.set_state(CheckinState::Idle);
        Ok(())
    }

    fn require_pending(&self) -> Result<&PendingMatch> {
        match &self.state {
            CheckinState::AwaitingConfirmation(pending) => Ok(pending),
            state if state.is_busy() => Err(CheckinError::Busy),
            _ => Err(CheckinError::NothingPending),
        }
    }

    fn set_state(&mut self, state: CheckinState) {
        if self.state != state {
            self.state = state;
            self.events.emit(CheckinEvent::StateChanged(self.state.clone()));
        }
    }

    fn notify(&self, notification: Notification) {
        self.events.emit(CheckinEvent::Notify(notification));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PermissionState;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct NoCamera;

    impl Camera for NoCamera {
        fn permission(&self) -> PermissionState {
            PermissionState::Denied
        }

        fn request_permission(&mut self) -> PermissionState {
            PermissionState::Denied
        }

        fn capture(&mut self) -> Result<CaptureHandle> {
            Err(CheckinError::PermissionDenied)
        }
    }

    struct Unused;

    impl CheckinService for Unused {
        fn process(&self, _capture: &CaptureHandle) -> Result<RecognitionResult> {
            panic!("no upload expected");
        }

        fn confirm(&self, _record_id: RecordId) -> Result<()> {
            panic!("no confirmation expected");
        }
    }

    fn result(json: &str) -> RecognitionResult {
        RecognitionResult::from_json(json).unwrap()
    }

    #[test]
    fn classify_dispatches_known_codes() {
        assert!(matches!(
            classify(result(r#"{"status": 1, "name": "Alice"}"#)),
            AttemptOutcome::Confirmed(_)
        ));
        match classify(result(r#"{"status": 0, "id": 7}"#)) {
            AttemptOutcome::PendingConfirmation(p) => assert_eq!(p.record_id, 7),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            classify(result(r#"{"status": -1}"#)),
            AttemptOutcome::Failed(CheckinError::Rejected { code: -1 })
        ));
    }

    #[test]
    fn classify_fails_safe() {
        assert!(matches!(
            classify(result(r#"{"status": 5}"#)),
            AttemptOutcome::Failed(CheckinError::Rejected { code: 5 })
        ));
        assert!(matches!(
            classify(result(r#"{"name": "Alice"}"#)),
            AttemptOutcome::Failed(CheckinError::MalformedResponse(_))
        ));
        assert!(matches!(
            classify(result(r#"{"status": 0, "name": "Bob"}"#)),
            AttemptOutcome::Failed(CheckinError::MalformedResponse(_))
        ));
    }

    #[test]
    fn camera_failure_returns_to_idle_with_notification() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = {
            let events = Rc::clone(&events);
            move |e: CheckinEvent| events.borrow_mut().push(e)
        };
        let mut controller = CheckinController::new(NoCamera, Unused, sink);

        let outcome = controller.request_capture().unwrap();
        assert!(matches!(outcome, AttemptOutcome::Failed(CheckinError::PermissionDenied)));
        assert_eq!(controller.state(), &CheckinState::Idle);

        let events = events.borrow();
        assert_eq!(
            *events,
            vec![
                CheckinEvent::StateChanged(CheckinState::Capturing),
                CheckinEvent::StateChanged(CheckinState::Idle),
                CheckinEvent::Notify(Notification::CheckinFailed(FailureKind::Unreachable)),
            ]
        );
    }

    #[test]
    fn confirm_and_dismiss_need_a_pending_match() {
        let mut controller = CheckinController::new(NoCamera, Unused, |_e: CheckinEvent| {});
        assert!(matches!(controller.confirm(), Err(CheckinError::NothingPending)));
        assert!(matches!(controller.confirm_record(7), Err(CheckinError::NothingPending)));
        assert!(matches!(controller.dismiss(), Err(CheckinError::NothingPending)));
        assert!(controller.can_capture());
    }

    #[test]
    fn busy_states() {
        assert!(!CheckinState::Idle.is_busy());
        assert!(CheckinState::Capturing.is_busy());
        assert!(CheckinState::Uploading.is_busy());
        assert!(CheckinState::Confirming(1).is_busy());
        assert!(!CheckinState::AwaitingConfirmation(PendingMatch {
            record_id: 1,
            details: MatchDetails::default(),
        })
        .is_busy());
    }
}
