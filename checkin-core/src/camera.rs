//! Camera contract the controller captures through, plus V4L2 device
//! discovery shared by the concrete cameras.

use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::filename::generate_file_name;

pub const JPEG_MIME: &str = "image/jpeg";

const SYSFS_VIDEO_DIR: &str = "/sys/class/video4linux";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Authorized,
    Denied,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    Front,
    Back,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub device_id: i32,
    pub device_path: PathBuf,
    pub name: String,
    pub facing: CameraFacing,
}

/// A still image that was just taken and is waiting to be uploaded.
///
/// The backing file belongs to the handle and is removed when it drops.
#[derive(Debug)]
pub struct CaptureHandle {
    path: PathBuf,
    file_name: String,
    mime_type: &'static str,
}

impl CaptureHandle {
    /// Wraps an image already written to `path`.
    pub fn new(path: PathBuf, file_name: String) -> Self {
        Self {
            path,
            file_name,
            mime_type: JPEG_MIME,
        }
    }

    /// Allocates a fresh capture path in `dir` with a generated filename.
    /// Nothing is written yet.
    pub fn allocate(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let file_name = generate_file_name();
        Ok(Self::new(dir.join(&file_name), file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Discarded capture {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove capture {:?}: {}", self.path, e),
        }
    }
}

/// The camera the controller captures through.
pub trait Camera {
    fn permission(&self) -> PermissionState;

    fn request_permission(&mut self) -> PermissionState;

    /// Takes one still image.
    fn capture(&mut self) -> Result<CaptureHandle>;
}

/// Asks for permission once if it has not been granted yet.
pub fn ensure_permission<C: Camera + ?Sized>(camera: &mut C) -> PermissionState {
    match camera.permission() {
        PermissionState::Authorized => PermissionState::Authorized,
        state => {
            info!("Camera permission is {:?}, requesting it", state);
            camera.request_permission()
        }
    }
}

/// Where captures are staged before upload.
pub fn capture_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("checkin")
        .join("captures")
}

/// Whether the device node can be opened for reading by this process.
pub fn probe_permission(device_path: &Path) -> PermissionState {
    match fs::OpenOptions::new().read(true).open(device_path) {
        Ok(_) => PermissionState::Authorized,
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => PermissionState::Denied,
        Err(e) => {
            debug!("Probing {:?} failed: {}", device_path, e);
            PermissionState::Undetermined
        }
    }
}

pub fn detect_cameras() -> Vec<CameraInfo> {
    detect_cameras_in(Path::new(SYSFS_VIDEO_DIR))
}

/// Lists capture nodes below a `video4linux` sysfs class directory.
pub fn detect_cameras_in(video_dir: &Path) -> Vec<CameraInfo> {
    let mut cameras = Vec::new();

    let entries = match fs::read_dir(video_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Cannot read {:?}: {}", video_dir, e);
            return cameras;
        }
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();

        let device_id: i32 = match name.strip_prefix("video").and_then(|s| s.parse().ok()) {
            Some(id) => id,
            None => continue,
        };

        // Index 0 is the capture node; higher indices are metadata nodes of
        // the same sensor.
        let index_path = entry.path().join("index");
        if let Ok(index_str) = fs::read_to_string(&index_path) {
            if let Ok(index) = index_str.trim().parse::<i32>() {
                if index != 0 {
                    debug!("Skipping video{} (index {}), likely metadata device", device_id, index);
                    continue;
                }
            }
        }

        let camera_name = fs::read_to_string(entry.path().join("name"))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| format!("Camera {}", device_id));

        cameras.push(CameraInfo {
            device_id,
            device_path: PathBuf::from(format!("/dev/video{}", device_id)),
            facing: detect_facing(&camera_name),
            name: camera_name,
        });
    }

    cameras.sort_by_key(|c| c.device_id);

    info!("Detected {} cameras", cameras.len());
    for cam in &cameras {
        debug!("  video{}: {} ({:?})", cam.device_id, cam.name, cam.facing);
    }

    cameras
}

pub fn detect_facing(name: &str) -> CameraFacing {
    let name_lower = name.to_lowercase();

    let back_keywords = ["rear", "back", "environment", "world"];
    if back_keywords.iter().any(|k| name_lower.contains(k)) {
        return CameraFacing::Back;
    }

    let front_keywords = ["integrated", "front", "user", "facetime", "built-in", "internal"];
    if front_keywords.iter().any(|k| name_lower.contains(k)) {
        return CameraFacing::Front;
    }

    CameraFacing::External
}

/// The first front-facing camera, if any.
pub fn select_front(cameras: &[CameraInfo]) -> Option<&CameraInfo> {
    cameras.iter().find(|c| c.facing == CameraFacing::Front)
}

/// A device named in the configuration. The operator picked it, so it is
/// taken as the front camera whatever its name says.
pub fn configured_camera(device: &str) -> Option<CameraInfo> {
    let path = PathBuf::from(device);
    let device_id: i32 = path
        .file_name()?
        .to_str()?
        .strip_prefix("video")?
        .parse()
        .ok()?;
    Some(CameraInfo {
        device_id,
        name: format!("video{}", device_id),
        device_path: path,
        facing: CameraFacing::Front,
    })
}
