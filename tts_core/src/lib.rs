//! Speech synthesis relay core.
//!
//! Text is fed to a [`SpeechEngine`]; the PCM it produces is accumulated per
//! sentence by the [`SegmentAccumulator`], framed as WAV, and queued as
//! [`FinishedClip`]s for clients to pull. The earliest connected listener is
//! told whenever a clip is ready. [`SpeechRelay`] wires all of it together.

pub mod clip;
pub mod controller;
pub mod delivery;
pub mod engine;
pub mod segment;
pub mod segmenter;
pub mod stats;
pub mod wav;

mod relay;

pub use clip::FinishedClip;
pub use controller::{PlaybackOutcome, PlaybackState, StreamController};
pub use delivery::{ClipNotifier, ClipQueue, ClipReady, ListenerId, ListenerRegistry};
pub use engine::{PiperEngine, PlaybackEvents, SpeechEngine, StreamFormat, ToneEngine};
pub use relay::{RelayOptions, RelaySnapshot, SpeechRelay, DEFAULT_MAX_PENDING_CLIPS};
pub use segment::{FinalizeOutcome, SegmentAccumulator, DEFAULT_MIN_SEGMENT_BYTES};
pub use stats::{RelayStats, StatsSnapshot};
