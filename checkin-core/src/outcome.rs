//! Recognition results returned by the `/process` endpoint and their
//! classification into check-in outcomes.

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier the service assigns to a recognition record; echoed back to
/// `/confirm`.
pub type RecordId = i64;

/// Tri-state outcome of one recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeStatus {
    Failed,
    PendingConfirmation,
    Confirmed,
}

impl OutcomeStatus {
    pub const FAILED_CODE: i64 = -1;
    pub const PENDING_CODE: i64 = 0;
    pub const CONFIRMED_CODE: i64 = 1;

    /// Total mapping from wire code to outcome. Unknown codes fail safe.
    pub fn from_code(code: i64) -> Self {
        match code {
            Self::CONFIRMED_CODE => OutcomeStatus::Confirmed,
            Self::PENDING_CODE => OutcomeStatus::PendingConfirmation,
            Self::FAILED_CODE => OutcomeStatus::Failed,
            _ => OutcomeStatus::Failed,
        }
    }

    pub fn is_known_code(code: i64) -> bool {
        matches!(
            code,
            Self::FAILED_CODE | Self::PENDING_CODE | Self::CONFIRMED_CODE
        )
    }
}

/// Accepts an integer or an integral float such as `1.0`.
fn integral<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(number) = Option::<Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(n) = number.as_i64() {
        return Ok(Some(n));
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(Some(f as i64))
        }
        _ => Err(D::Error::custom(format!("expected an integer, got {}", number))),
    }
}

// The fields below are only shown to the user. A value of the wrong type
// reads as absent instead of failing the whole response.

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Keeps the numeric entries of the emotion map.
fn lenient_scores<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, f64>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => Some(
            map.into_iter()
                .filter_map(|(label, score)| score.as_f64().map(|s| (label, s)))
                .collect(),
        ),
        _ => None,
    })
}

/// Parsed 200 body of `/process`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecognitionResult {
    #[serde(default, deserialize_with = "integral")]
    pub status: Option<i64>,
    #[serde(default, deserialize_with = "integral")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub student_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub distance: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub dominant_emotion: Option<String>,
    #[serde(default, deserialize_with = "lenient_scores")]
    pub emotion: Option<BTreeMap<String, f64>>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub img_path: Option<String>,
}

impl RecognitionResult {
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    pub fn details(&self) -> MatchDetails {
        MatchDetails {
            record_id: self.id,
            name: self.name.clone(),
            student_id: self.student_id.clone(),
            distance: self.distance,
            dominant_emotion: self.dominant_emotion.clone(),
            emotion: self.emotion.clone().unwrap_or_default(),
        }
    }
}

/// What the user is shown about a match.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MatchDetails {
    pub record_id: Option<RecordId>,
    pub name: Option<String>,
    pub student_id: Option<String>,
    pub distance: Option<f64>,
    pub dominant_emotion: Option<String>,
    pub emotion: BTreeMap<String, f64>,
}

const MISSING: &str = "-";

impl MatchDetails {
    /// Emotion scores sorted from strongest to weakest.
    pub fn ranked_emotions(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .emotion
            .iter()
            .map(|(label, score)| (label.as_str(), *score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

impl fmt::Display for MatchDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let distance = self
            .distance
            .map(|d| d.to_string())
            .unwrap_or_else(|| MISSING.to_string());
        write!(
            f,
            "Name: {}\nStudent ID: {}\nDistance: {}\nEmotion: {}",
            self.name.as_deref().unwrap_or(MISSING),
            self.student_id.as_deref().unwrap_or(MISSING),
            distance,
            self.dominant_emotion.as_deref().unwrap_or(MISSING),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_total() {
        assert_eq!(OutcomeStatus::from_code(-1), OutcomeStatus::Failed);
        assert_eq!(OutcomeStatus::from_code(0), OutcomeStatus::PendingConfirmation);
        assert_eq!(OutcomeStatus::from_code(1), OutcomeStatus::Confirmed);
        for code in [-100, -2, 2, 3, 42, i64::MIN, i64::MAX] {
            assert_eq!(
                OutcomeStatus::from_code(code),
                OutcomeStatus::Failed,
                "code {code}"
            );
            assert!(!OutcomeStatus::is_known_code(code));
        }
    }

    #[test]
    fn parses_full_service_sample() {
        let body = r#"{"distance": 0.452579140663147, "dominant_emotion": "angry",
            "emotion": {"angry": 57.85, "happy": 2.9e-7, "neutral": 31.52},
            "id": 7, "img_path": "public/faces/IMG_2023-11-26_20-16-55.jpg",
            "name": "Nguyen Hoang Duy", "status": 1, "student_id": "22520328"}"#;
        let result = RecognitionResult::from_json(body).unwrap();

        assert_eq!(result.status, Some(OutcomeStatus::CONFIRMED_CODE));
        assert_eq!(result.id, Some(7));
        assert_eq!(result.student_id.as_deref(), Some("22520328"));
        assert_eq!(
            result.img_path.as_deref(),
            Some("public/faces/IMG_2023-11-26_20-16-55.jpg")
        );

        let details = result.details();
        assert_eq!(details.ranked_emotions()[0].0, "angry");
        assert_eq!(details.ranked_emotions()[1].0, "neutral");
    }

    #[test]
    fn missing_status_parses_as_none() {
        let result = RecognitionResult::from_json(r#"{"name": "Alice"}"#).unwrap();
        assert_eq!(result.status, None);
        assert_eq!(result.name.as_deref(), Some("Alice"));
    }

    #[test]
    fn numeric_student_id_is_accepted() {
        let result =
            RecognitionResult::from_json(r#"{"status": 1, "student_id": 22520328}"#).unwrap();
        assert_eq!(result.student_id.as_deref(), Some("22520328"));
    }

    #[test]
    fn non_integer_status_does_not_parse() {
        assert!(RecognitionResult::from_json(r#"{"status": "ok"}"#).is_err());
        assert!(RecognitionResult::from_json(r#"{"status": 0.5}"#).is_err());
        assert!(RecognitionResult::from_json(r#"{"status": 1e300}"#).is_err());
        assert!(RecognitionResult::from_json("<html>").is_err());
    }

    #[test]
    fn integral_float_status_is_accepted() {
        let result = RecognitionResult::from_json(r#"{"status": 1.0, "name": "Alice"}"#).unwrap();
        assert_eq!(result.status, Some(OutcomeStatus::CONFIRMED_CODE));

        let result = RecognitionResult::from_json(r#"{"status": 0.0, "id": 7.0}"#).unwrap();
        assert_eq!(result.status, Some(OutcomeStatus::PENDING_CODE));
        assert_eq!(result.id, Some(7));
    }

    #[test]
    fn string_distance_keeps_the_match() {
        let result =
            RecognitionResult::from_json(r#"{"status": 1, "name": "Alice", "distance": "0.12"}"#)
                .unwrap();
        assert_eq!(result.status, Some(OutcomeStatus::CONFIRMED_CODE));
        assert_eq!(result.distance, Some(0.12));

        let result =
            RecognitionResult::from_json(r#"{"status": 1, "distance": "far"}"#).unwrap();
        assert_eq!(result.distance, None);
    }

    #[test]
    fn null_emotion_score_is_skipped() {
        let body = r#"{"status": 1, "emotion": {"happy": 80.5, "sad": null, "angry": "x"}}"#;
        let result = RecognitionResult::from_json(body).unwrap();
        let details = result.details();
        assert_eq!(details.ranked_emotions(), vec![("happy", 80.5)]);
    }

    #[test]
    fn mistyped_display_fields_read_as_missing() {
        let body = r#"{"status": 1, "name": "Alice", "dominant_emotion": ["happy"],
            "emotion": [1, 2], "img_path": false}"#;
        let result = RecognitionResult::from_json(body).unwrap();
        assert_eq!(result.name.as_deref(), Some("Alice"));
        assert_eq!(result.dominant_emotion, None);
        assert_eq!(result.emotion, None);
        assert_eq!(result.img_path, None);
    }

    #[test]
    fn display_renders_fields_verbatim() {
        let details = MatchDetails {
            name: Some("Alice".into()),
            student_id: Some("S1".into()),
            distance: Some(0.12),
            dominant_emotion: Some("happy".into()),
            ..Default::default()
        };
        assert_eq!(
            details.to_string(),
            "Name: Alice\nStudent ID: S1\nDistance: 0.12\nEmotion: happy"
        );
    }

    #[test]
    fn display_uses_placeholder_for_missing_fields() {
        let details = MatchDetails {
            name: Some("Bob".into()),
            student_id: Some("S2".into()),
            ..Default::default()
        };
        assert_eq!(
            details.to_string(),
            "Name: Bob\nStudent ID: S2\nDistance: -\nEmotion: -"
        );
    }
}
