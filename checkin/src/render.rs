use checkin_core::{CheckinState, Notification};

/// Text for the busy indicator, if the state shows one.
pub fn busy_label(state: &CheckinState) -> Option<&'static str> {
    match state {
        CheckinState::Capturing => Some("Capturing..."),
        CheckinState::Uploading => Some("Processing..."),
        CheckinState::Confirming(_) => Some("Confirming..."),
        CheckinState::Idle | CheckinState::AwaitingConfirmation(_) => None,
    }
}

pub fn notification(n: &Notification, verbose: bool) -> String {
    let mut text = format!("== {} ==\n{}\n", n.title(), n.message());

    if verbose {
        if let Some(details) = n.details() {
            let ranked = details.ranked_emotions();
            if !ranked.is_empty() {
                text.push_str("Emotion scores:\n");
                for (label, score) in ranked {
                    text.push_str(&format!("  {:<10} {:>6.2}\n", label, score));
                }
            }
        }
    }

    if let [accept, reject] = n.choices() {
        text.push_str(&format!("[c] {}   [n] {}\n", accept, reject));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkin_core::{FailureKind, MatchDetails};

    fn bob() -> MatchDetails {
        let mut details = MatchDetails {
            record_id: Some(7),
            name: Some("Bob".into()),
            student_id: Some("S2".into()),
            ..Default::default()
        };
        details.emotion.insert("neutral".into(), 31.5);
        details.emotion.insert("angry".into(), 57.85);
        details
    }

    #[test]
    fn failure_box() {
        assert_eq!(
            notification(&Notification::CheckinFailed(FailureKind::Processing), false),
            "== Checkin Failed ==\nFailed to process the image. Please try again later.\n"
        );
    }

    #[test]
    fn pending_box_lists_choices() {
        let text = notification(&Notification::ConfirmationRequested(bob()), false);
        assert!(text.starts_with("== Checkin Success ==\nPlease confirm"));
        assert!(text.ends_with("[c] Correct   [n] Not Correct\n"));
        assert!(!text.contains("Emotion scores"));
    }

    #[test]
    fn verbose_ranks_emotions() {
        let text = notification(&Notification::CheckinSucceeded(bob()), true);
        let angry = text.find("angry").unwrap();
        let neutral = text.find("neutral").unwrap();
        assert!(angry < neutral);
        assert!(text.contains("57.85"));
    }

    #[test]
    fn only_busy_states_have_labels() {
        assert_eq!(busy_label(&CheckinState::Uploading), Some("Processing..."));
        assert_eq!(busy_label(&CheckinState::Idle), None);
    }
}
