/// Orthogonal to [`SessionStatus`]: a session can be `Active` in either
/// mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Story narration plays; microphone off, transport closed.
    Passive,
    /// Microphone active, VAD running, duplex session open.
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Initial,
    Calibrating,
    Active,
    Paused,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub message: String,
    pub recoverable: bool,
}

/// Story metadata pushed to the backend when an interactive session
/// opens, so AI responses stay grounded in the current narrative.
#[derive(Debug, Clone, Default)]
pub struct StoryContext {
    pub story_id: String,
    pub story_title: String,
    pub story_synopsis: Option<String>,
    pub characters: Option<Vec<String>>,
    pub current_scene: Option<String>,
}

/// One interactive Q&A/listening session. Mutated exclusively by the
/// interaction state machine; observers receive snapshots over a watch
/// channel.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub story_id: String,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub playback_position_ms: u64,
    pub is_listening: bool,
    pub child_speaking: bool,
    pub ai_responding: bool,
    pub transcript: String,
    pub ai_response: String,
    pub last_error: Option<LastError>,
}

impl Session {
    pub fn new(id: impl Into<String>, story_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            story_id: story_id.into(),
            mode: SessionMode::Passive,
            status: SessionStatus::Initial,
            playback_position_ms: 0,
            is_listening: false,
            child_speaking: false,
            ai_responding: false,
            transcript: String::new(),
            ai_response: String::new(),
            last_error: None,
        }
    }

    pub(crate) fn record_error(&mut self, message: impl Into<String>, recoverable: bool) {
        self.last_error = Some(LastError {
            message: message.into(),
            recoverable,
        });
        if !recoverable {
            self.status = SessionStatus::Error;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_passive_and_initial() {
        let session = Session::new("s1", "story-9");
        assert_eq!(session.mode, SessionMode::Passive);
        assert_eq!(session.status, SessionStatus::Initial);
        assert!(!session.is_listening);
        assert!(session.last_error.is_none());
    }

    #[test]
    fn unrecoverable_error_forces_error_status() {
        let mut session = Session::new("s1", "story-9");
        session.status = SessionStatus::Active;

        session.record_error("transient glitch", true);
        assert_eq!(session.status, SessionStatus::Active);

        session.record_error("session expired", false);
        assert_eq!(session.status, SessionStatus::Error);
    }
}
