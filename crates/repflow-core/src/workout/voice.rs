//! Voice-driven completion for reps-based activities.
//!
//! The speech platform pushes [`VoiceMessage`]s into a channel; the
//! controller decides whether each one still matters. Every listening
//! session gets its own id, so anything arriving for a session that was
//! stopped (or for a previous activity) is dropped here.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::engine::{AdvanceToken, WorkoutEngine, WorkoutState};
use crate::error::VoiceError;

pub type SessionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceMessage {
    /// Live (partial or final) transcript.
    Transcript { session: SessionId, text: String },
    /// The platform ended the utterance on its own.
    Ended { session: SessionId },
    Failed { session: SessionId, error: VoiceError },
}

impl VoiceMessage {
    pub fn session(&self) -> SessionId {
        match self {
            VoiceMessage::Transcript { session, .. }
            | VoiceMessage::Ended { session }
            | VoiceMessage::Failed { session, .. } => *session,
        }
    }
}

/// Platform speech-to-text.
pub trait SpeechRecognizer: Send {
    /// Begin a listening session. Results for it must carry `session`.
    fn start_listening(
        &mut self,
        locale: &str,
        session: SessionId,
        results: mpsc::UnboundedSender<VoiceMessage>,
    ) -> Result<(), VoiceError>;

    fn stop_listening(&mut self);
}

/// Recognizer for platforms without speech support.
#[derive(Debug, Default)]
pub struct NoSpeech;

impl SpeechRecognizer for NoSpeech {
    fn start_listening(
        &mut self,
        _locale: &str,
        _session: SessionId,
        _results: mpsc::UnboundedSender<VoiceMessage>,
    ) -> Result<(), VoiceError> {
        Err(VoiceError::Unavailable)
    }

    fn stop_listening(&mut self) {}
}

/// Case-insensitive substring match against a keyword set.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
}

impl KeywordMatcher {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, transcript: &str) -> bool {
        let transcript = transcript.to_lowercase();
        self.keywords.iter().any(|k| transcript.contains(k.as_str()))
    }
}

#[derive(Debug, Clone, Copy)]
struct LiveSession {
    id: SessionId,
    token: AdvanceToken,
}

pub struct VoiceController {
    recognizer: Box<dyn SpeechRecognizer>,
    sender: mpsc::UnboundedSender<VoiceMessage>,
    locale: String,
    matcher: KeywordMatcher,
    available: bool,
    next_session: SessionId,
    live: Option<LiveSession>,
}

impl VoiceController {
    pub fn new(
        recognizer: Box<dyn SpeechRecognizer>,
        locale: &str,
        matcher: KeywordMatcher,
    ) -> (Self, mpsc::UnboundedReceiver<VoiceMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let controller = Self {
            recognizer,
            sender,
            locale: locale.to_string(),
            matcher,
            available: true,
            next_session: 1,
            live: None,
        };
        (controller, receiver)
    }

    /// A controller that never listens. The run is completed manually.
    pub fn disabled() -> (Self, mpsc::UnboundedReceiver<VoiceMessage>) {
        let (mut controller, receiver) =
            Self::new(Box::new(NoSpeech), "", KeywordMatcher::new(Vec::<String>::new()));
        controller.available = false;
        (controller, receiver)
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn is_listening(&self) -> bool {
        self.live.is_some()
    }

    pub fn listening_session(&self) -> Option<SessionId> {
        self.live.map(|l| l.id)
    }

    fn in_scope(engine: &WorkoutEngine) -> bool {
        engine.state() == WorkoutState::Running
            && engine
                .current_activity()
                .is_some_and(|a| a.measurement.is_reps())
    }

    /// Bring listening in line with the engine: listen only for a running
    /// reps-based activity, and restart whenever that activity changes.
    pub fn sync(&mut self, engine: &WorkoutEngine) {
        let wanted = Self::in_scope(engine).then(|| engine.current_token());
        let live = self.live.map(|l| l.token);
        if live == wanted {
            return;
        }
        self.stop();
        if let Some(token) = wanted {
            self.start(token);
        }
    }

    pub fn stop(&mut self) {
        if let Some(live) = self.live.take() {
            debug!(session = live.id, "stop listening");
            self.recognizer.stop_listening();
        }
    }

    fn start(&mut self, token: AdvanceToken) {
        if !self.available {
            return;
        }
        let id = self.next_session;
        self.next_session += 1;
        match self
            .recognizer
            .start_listening(&self.locale, id, self.sender.clone())
        {
            Ok(()) => {
                debug!(session = id, token = token.value(), "start listening");
                self.live = Some(LiveSession { id, token });
            }
            Err(e) => {
                warn!(error = %e, "voice recognition unavailable, manual completion only");
                self.available = false;
            }
        }
    }

    /// Handle one message from the platform. Returns the token to advance
    /// when a completion keyword was heard for the current activity.
    pub fn handle(&mut self, msg: VoiceMessage, engine: &WorkoutEngine) -> Option<AdvanceToken> {
        let Some(live) = self.live else {
            debug!(session = msg.session(), "voice message after stop ignored");
            return None;
        };
        if msg.session() != live.id {
            debug!(session = msg.session(), live = live.id, "stale voice message ignored");
            return None;
        }
        match msg {
            VoiceMessage::Transcript { text, .. } => {
                let current = Self::in_scope(engine) && engine.current_token() == live.token;
                (current && self.matcher.matches(&text)).then_some(live.token)
            }
            VoiceMessage::Ended { .. } => {
                self.live = None;
                if Self::in_scope(engine) && engine.current_token() == live.token {
                    self.start(live.token);
                }
                None
            }
            VoiceMessage::Failed { error, .. } => {
                warn!(error = %error, "voice recognition failed, manual completion only");
                self.live = None;
                self.available = false;
                None
            }
        }
    }
}

impl Drop for VoiceController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for VoiceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceController")
            .field("locale", &self.locale)
            .field("available", &self.available)
            .field("live", &self.live)
            .finish()
    }
}
