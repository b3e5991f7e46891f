use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;

use checkin_core::camera::{self, capture_dir, probe_permission};
use checkin_core::config::CameraConfig;
use checkin_core::error::Result;
use checkin_core::{Camera, CaptureHandle, CheckinError, PermissionState};
use log::warn;

/// Serves a fixed JPEG as every capture. For stations without a camera and
/// for demos.
pub struct StillFileCamera {
    source: PathBuf,
    capture_dir: PathBuf,
}

impl StillFileCamera {
    pub fn new(source: PathBuf) -> Self {
        Self::with_capture_dir(source, capture_dir())
    }

    pub fn with_capture_dir(source: PathBuf, capture_dir: PathBuf) -> Self {
        Self { source, capture_dir }
    }
}

impl Camera for StillFileCamera {
    fn permission(&self) -> PermissionState {
        probe_permission(&self.source)
    }

    fn request_permission(&mut self) -> PermissionState {
        self.permission()
    }

    fn capture(&mut self) -> Result<CaptureHandle> {
        let handle = CaptureHandle::allocate(&self.capture_dir).map_err(|e| {
            CheckinError::Acquisition(format!("cannot prepare {:?}: {}", self.capture_dir, e))
        })?;
        fs::copy(&self.source, handle.path()).map_err(|e| {
            CheckinError::Acquisition(format!("cannot read {:?}: {}", self.source, e))
        })?;
        Ok(handle)
    }
}

#[cfg(feature = "opencv-camera")]
pub use self::v4l2::V4l2Camera;

#[cfg(feature = "opencv-camera")]
mod v4l2 {
    use super::*;
    use checkin_core::CameraInfo;
    use log::info;
    use opencv::core::{Mat, Vector};
    use opencv::imgcodecs;
    use opencv::prelude::*;
    use opencv::videoio::{self, VideoCapture, CAP_V4L2};

    /// Front camera read through OpenCV's V4L2 backend.
    pub struct V4l2Camera {
        info: CameraInfo,
        config: CameraConfig,
        capture_dir: PathBuf,
        cap: Option<VideoCapture>,
    }

    impl V4l2Camera {
        pub fn new(info: CameraInfo, config: CameraConfig) -> Self {
            Self {
                info,
                config,
                capture_dir: capture_dir(),
                cap: None,
            }
        }

        fn open(&mut self) -> Result<&mut VideoCapture> {
            if self.cap.is_none() {
                let mut cap = VideoCapture::new(self.info.device_id, CAP_V4L2).map_err(|e| {
                    CheckinError::Acquisition(format!("Failed to open camera: {}", e))
                })?;

                if !cap.is_opened().unwrap_or(false) {
                    return Err(CheckinError::Acquisition(format!(
                        "Camera video{} not opened",
                        self.info.device_id
                    )));
                }

                cap.set(videoio::CAP_PROP_FRAME_WIDTH, self.config.frame_width as f64).ok();
                cap.set(videoio::CAP_PROP_FRAME_HEIGHT, self.config.frame_height as f64).ok();
                info!("Opened camera video{} ({})", self.info.device_id, self.info.name);
                self.cap = Some(cap);
            }

            self.cap
                .as_mut()
                .ok_or_else(|| CheckinError::Acquisition("camera closed".to_string()))
        }

        fn read_frame(&mut self) -> Result<Mat> {
            let warmup = self.config.warmup_frames;
            let cap = self.open()?;

            // Auto exposure settles over the first frames after a pause.
            let mut frame = Mat::default();
            for _ in 0..warmup {
                let _ = cap.read(&mut frame);
            }

            cap.read(&mut frame)
                .map_err(|e| CheckinError::Acquisition(format!("Failed to read frame: {}", e)))?;
            if frame.empty() {
                return Err(CheckinError::Acquisition("Empty frame".to_string()));
            }
            Ok(frame)
        }
    }

    impl Camera for V4l2Camera {
        fn permission(&self) -> PermissionState {
            probe_permission(&self.info.device_path)
        }

        fn request_permission(&mut self) -> PermissionState {
            // Device access is granted through group membership; nothing to
            // ask for at runtime.
            self.permission()
        }

        fn capture(&mut self) -> Result<CaptureHandle> {
            let frame = match self.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    // Reopen on the next attempt.
                    self.cap = None;
                    return Err(e);
                }
            };

            let handle = CaptureHandle::allocate(&self.capture_dir).map_err(|e| {
                CheckinError::Acquisition(format!("cannot prepare {:?}: {}", self.capture_dir, e))
            })?;
            let path = handle.path().to_string_lossy().to_string();
            let params = Vector::<i32>::from_slice(&[
                imgcodecs::IMWRITE_JPEG_QUALITY,
                self.config.jpeg_quality.min(100) as i32,
            ]);

            match imgcodecs::imwrite(&path, &frame, &params) {
                Ok(true) => Ok(handle),
                Ok(false) => Err(CheckinError::Acquisition(format!("could not encode {}", path))),
                Err(e) => Err(CheckinError::Acquisition(format!("JPEG encoding failed: {}", e))),
            }
        }
    }

    impl Drop for V4l2Camera {
        fn drop(&mut self) {
            if let Some(cap) = self.cap.as_mut() {
                let _ = cap.release();
            }
        }
    }
}

/// Blocks until a front camera shows up, printing the placeholder once.
#[cfg(feature = "opencv-camera")]
pub fn wait_for_front_camera<W: Write>(
    config: &CameraConfig,
    out: &mut W,
) -> checkin_core::CameraInfo {
    let mut announced = false;
    loop {
        let found = match config.device.as_deref() {
            Some(device) => camera::configured_camera(device).filter(|c| c.device_path.exists()),
            None => camera::select_front(&camera::detect_cameras()).cloned(),
        };
        if let Some(info) = found {
            log::info!("Using camera video{}: {}", info.device_id, info.name);
            return info;
        }
        if !announced {
            let _ = writeln!(out, "Waiting for a front camera...");
            let _ = out.flush();
            announced = true;
        }
        thread::sleep(config.placeholder_poll());
    }
}

/// Asks once, then keeps the capture surface blocked until access is granted.
pub fn wait_for_permission<C: Camera, W: Write>(
    device: &mut C,
    config: &CameraConfig,
    out: &mut W,
) {
    if camera::ensure_permission(device) == PermissionState::Authorized {
        return;
    }
    warn!("Camera access is not authorized");
    let _ = writeln!(out, "Camera access denied. Waiting for permission...");
    let _ = out.flush();
    while device.permission() != PermissionState::Authorized {
        thread::sleep(config.placeholder_poll());
    }
}

pub fn still_image_exists(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_camera_copies_source_per_capture() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("face.jpg");
        fs::write(&source, b"\xff\xd8still").unwrap();
        let mut camera =
            StillFileCamera::with_capture_dir(source.clone(), dir.path().join("captures"));

        assert_eq!(camera.permission(), PermissionState::Authorized);

        let first = camera.capture().unwrap();
        let second = camera.capture().unwrap();
        assert_ne!(first.path(), second.path());
        assert_eq!(first.read_bytes().unwrap(), b"\xff\xd8still");
        assert!(source.exists());
    }

    #[test]
    fn missing_still_image_fails_capture() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = StillFileCamera::with_capture_dir(
            dir.path().join("missing.jpg"),
            dir.path().join("captures"),
        );

        assert_eq!(camera.permission(), PermissionState::Undetermined);
        assert!(matches!(camera.capture(), Err(CheckinError::Acquisition(_))));
    }

    #[test]
    fn authorized_camera_does_not_wait() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("face.jpg");
        fs::write(&source, b"x").unwrap();
        let mut camera = StillFileCamera::with_capture_dir(source, dir.path().to_path_buf());
        let mut out = Vec::new();

        wait_for_permission(&mut camera, &CameraConfig::default(), &mut out);
        assert!(out.is_empty());
    }
}
