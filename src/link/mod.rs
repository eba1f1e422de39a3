//! Serial link seam - the upstream contract of the input pipeline.
//!
//! The crate never talks to a serial driver directly. Callers adapt their
//! driver to [SerialLink]; the listener only needs an open handle it can
//! pull text lines from. [ScriptedLink] is the in-memory implementation
//! used by tests and the diagnostic CLI.

use std::io;
use std::time::Duration;

mod scripted;
pub use scripted::{LinkFeed, ScriptedLink};

/// Default poll window for worker reads.
///
/// A delivered line is returned immediately; the deadline only bounds how
/// long the worker waits on an idle line before re-checking its running
/// flag, which in turn bounds stop() latency.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Outcome of a single bounded line read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One full line of raw bytes, line terminator included if the device
    /// sent one.
    Line(Vec<u8>),
    /// No line arrived within the deadline. Not an error and not noise;
    /// the caller should poll again.
    TimedOut,
    /// The device hung up; no further lines will arrive.
    Disconnected,
}

/// A line-oriented serial-port handle.
///
/// Mirrors the surface the listener needs from a serial driver: identity
/// for diagnostics, open/close lifecycle, and a blocking line read with a
/// deadline.
pub trait SerialLink: Send {
    /// Device name or identifier, for diagnostics only.
    fn name(&self) -> &str;

    /// Whether the handle is currently open.
    fn is_open(&self) -> bool;

    /// Open the handle. Fails if the underlying device does not exist or
    /// cannot be claimed.
    fn open(&mut self) -> io::Result<()>;

    /// Close the handle. Reads after close fail.
    fn close(&mut self) -> io::Result<()>;

    /// Read one line, waiting at most `timeout` for it to arrive.
    fn read_line(&mut self, timeout: Duration) -> io::Result<ReadOutcome>;
}
