//! Capture-and-verify check-in.
//!
//! A [`CheckinController`] takes a still from a [`Camera`], uploads it to a
//! [`CheckinService`] and reports every result through an [`EventSink`].

pub mod camera;
pub mod config;
pub mod controller;
pub mod error;
pub mod filename;
pub mod notification;
pub mod outcome;
pub mod service;

pub use camera::{Camera, CameraFacing, CameraInfo, CaptureHandle, PermissionState};
pub use config::CheckinConfig;
pub use controller::{
    AttemptOutcome, CheckinController, CheckinEvent, CheckinState, ConfirmationOutcome,
    EventSink, PendingMatch,
};
pub use error::CheckinError;
pub use notification::{FailureKind, Notification};
pub use outcome::{MatchDetails, OutcomeStatus, RecognitionResult, RecordId};
pub use service::{CheckinService, HttpCheckinService};
