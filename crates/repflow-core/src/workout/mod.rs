mod engine;
mod timeline;
mod trigger;
pub mod voice;

pub use engine::{AdvanceToken, Cursor, WorkoutEngine, WorkoutState};
pub use timeline::{ActivityOutcome, ActivityRecord, CompletedSession};
pub use trigger::{CompletionTrigger, TriggerMode};
pub use voice::{KeywordMatcher, NoSpeech, SpeechRecognizer, VoiceController, VoiceMessage};
