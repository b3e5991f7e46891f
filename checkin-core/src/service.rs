//! Client for the recognition (`/process`) and confirmation (`/confirm`)
//! endpoints.

use log::debug;
use serde::Serialize;
use std::time::Duration;

use crate::camera::CaptureHandle;
use crate::config::ServiceConfig;
use crate::error::{CheckinError, Result};
use crate::filename::random_token;
use crate::outcome::{RecognitionResult, RecordId};

pub const PROCESS_PATH: &str = "/process";
pub const CONFIRM_PATH: &str = "/confirm";
pub const IMAGE_FIELD: &str = "img";

/// The remote side of a check-in.
pub trait CheckinService {
    /// Uploads a capture and returns the parsed recognition result.
    fn process(&self, capture: &CaptureHandle) -> Result<RecognitionResult>;

    /// Confirms a pending match.
    fn confirm(&self, record_id: RecordId) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct ConfirmRequest {
    id: RecordId,
}

pub struct HttpCheckinService {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpCheckinService {
    pub fn new(config: &ServiceConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        let timeout = config.timeout();
        if timeout > Duration::ZERO {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            base_url: config.base_url().to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl CheckinService for HttpCheckinService {
    fn process(&self, capture: &CaptureHandle) -> Result<RecognitionResult> {
        let image = capture.read_bytes().map_err(|e| {
            CheckinError::Acquisition(format!("cannot read {:?}: {}", capture.path(), e))
        })?;

        let boundary = format!("----checkin{}", random_token());
        let body = multipart_body(
            &boundary,
            IMAGE_FIELD,
            capture.file_name(),
            capture.mime_type(),
            &image,
        );

        let url = self.url(PROCESS_PATH);
        debug!("POST {} ({} bytes, file {})", url, body.len(), capture.file_name());

        let response = self
            .agent
            .post(&url)
            .set("Accept", "application/json")
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body)
            .map_err(from_ureq)?;

        if response.status() != 200 {
            return Err(CheckinError::Server {
                status: response.status(),
            });
        }

        let text = response
            .into_string()
            .map_err(|e| CheckinError::Transport(format!("reading response body: {}", e)))?;
        debug!("/process responded: {}", text);

        RecognitionResult::from_json(&text)
            .map_err(|e| CheckinError::MalformedResponse(e.to_string()))
    }

    fn confirm(&self, record_id: RecordId) -> Result<()> {
        let url = self.url(CONFIRM_PATH);
        debug!("POST {} (id {})", url, record_id);

        let response = self
            .agent
            .post(&url)
            .send_json(ConfirmRequest { id: record_id })
            .map_err(from_ureq)?;

        match response.status() {
            200 => Ok(()),
            status => Err(CheckinError::Server { status }),
        }
    }
}

fn from_ureq(err: ureq::Error) -> CheckinError {
    match err {
        ureq::Error::Status(status, _) => CheckinError::Server { status },
        ureq::Error::Transport(transport) => CheckinError::Transport(transport.to_string()),
    }
}

/// Single-part `multipart/form-data` body carrying one file field.
pub fn multipart_body(
    boundary: &str,
    field: &str,
    file_name: &str,
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_layout() {
        let body = multipart_body("XYZ", "img", "1_abc.jpg", "image/jpeg", b"\xff\xd8data");
        let expected = b"--XYZ\r\n\
Content-Disposition: form-data; name=\"img\"; filename=\"1_abc.jpg\"\r\n\
Content-Type: image/jpeg\r\n\r\n\
\xff\xd8data\r\n--XYZ--\r\n";
        assert_eq!(body, expected.to_vec());
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let config = ServiceConfig {
            api_host: "http://localhost:8796/".to_string(),
            timeout_secs: 1.0,
        };
        let service = HttpCheckinService::new(&config);
        assert_eq!(service.base_url(), "http://localhost:8796");
        assert_eq!(service.url(PROCESS_PATH), "http://localhost:8796/process");
    }
}
