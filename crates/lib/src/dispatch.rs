//! Payload dispatch: postback / quick-reply payload strings to dialogue actions.

/// Payload set by the Get Started button.
pub const PAYLOAD_GET_STARTED: &str = "GET_STARTED";
/// Payload of the persistent-menu About entry.
pub const PAYLOAD_ABOUT: &str = "ABOUT";
/// Payload requesting the latest comic.
pub const PAYLOAD_LATEST: &str = "LATEST";
/// Payload requesting a random comic.
pub const PAYLOAD_RANDOM: &str = "RANDOM";
/// Payload of the "read another one?" prompt.
pub const PAYLOAD_READ_MORE: &str = "READ_MORE";

/// What one dialogue turn should do. Derived solely from a payload string;
/// unknown strings map to [`DialogueAction::Unrecognized`], never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueAction {
    GetStarted,
    ShowAbout,
    ShowLatest,
    ShowRandom,
    ReadMore,
    Unrecognized,
}

/// Map a payload string to its action. Exact, case-sensitive matches only.
pub fn dispatch(payload: &str) -> DialogueAction {
    match payload {
        PAYLOAD_GET_STARTED => DialogueAction::GetStarted,
        PAYLOAD_ABOUT => DialogueAction::ShowAbout,
        PAYLOAD_LATEST => DialogueAction::ShowLatest,
        PAYLOAD_RANDOM => DialogueAction::ShowRandom,
        PAYLOAD_READ_MORE => DialogueAction::ReadMore,
        _ => DialogueAction::Unrecognized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_payloads() {
        assert_eq!(dispatch("GET_STARTED"), DialogueAction::GetStarted);
        assert_eq!(dispatch("ABOUT"), DialogueAction::ShowAbout);
        assert_eq!(dispatch("LATEST"), DialogueAction::ShowLatest);
        assert_eq!(dispatch("RANDOM"), DialogueAction::ShowRandom);
        assert_eq!(dispatch("READ_MORE"), DialogueAction::ReadMore);
    }

    #[test]
    fn unknown_payloads_fall_through() {
        assert_eq!(dispatch("anything-else"), DialogueAction::Unrecognized);
        assert_eq!(dispatch(""), DialogueAction::Unrecognized);
        // Case-sensitive: near-misses are not recognized.
        assert_eq!(dispatch("about"), DialogueAction::Unrecognized);
        assert_eq!(dispatch("Latest"), DialogueAction::Unrecognized);
    }
}
