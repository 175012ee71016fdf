//! Radio simulation toolkit for exercising the service-state tracker.
//!
//! Provides a scriptable radio layer whose replies can be held back,
//! shuffled or delivered from worker threads, a static subscriber card,
//! reply builders, an observer that records every notification, and
//! deterministic technology-walk scenarios.

pub mod card;
pub mod radio;
pub mod recorder;
pub mod reply;
pub mod scenario;

pub use card::StaticCard;
pub use radio::{ReplyMode, ScriptedRadio};
pub use recorder::RecordingObserver;
pub use reply::{data_reply, operator_reply, VoiceReply};
