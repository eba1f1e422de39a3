// Fretline - guitar controller input core
// Serial-line telemetry to debounced note on/off events

// Module declarations
pub mod config;
pub mod error;
pub mod events;
pub mod link;
pub mod listener;
pub mod resolver;

// Re-exports for convenience
pub use config::InputConfig;
pub use error::{ConfigError, ErrorCode, PortError};
pub use events::EventBus;
pub use link::{ReadOutcome, ScriptedLink, SerialLink};
pub use listener::{RawEvent, RawSample, SignalListener};
pub use resolver::{NoteResolver, ResolvedNote};
