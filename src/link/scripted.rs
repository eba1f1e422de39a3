//! Scripted serial link for tests and offline replay.
//!
//! This provides an in-memory [SerialLink] fed from a [LinkFeed] handle,
//! so the full pipeline can run against deterministic line scripts without
//! hardware. Blocking-with-deadline semantics match what a real driver's
//! line read would do.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use super::{ReadOutcome, SerialLink};

struct FeedState {
    lines: VecDeque<Vec<u8>>,
    disconnected: bool,
    open: bool,
    close_count: u32,
}

struct FeedInner {
    state: Mutex<FeedState>,
    arrived: Condvar,
}

/// Producer handle for a [ScriptedLink].
///
/// Cloneable; tests keep one to push lines while the listener owns the
/// link itself.
#[derive(Clone)]
pub struct LinkFeed {
    inner: Arc<FeedInner>,
}

impl LinkFeed {
    /// Queue one text line, appending a newline terminator.
    pub fn push_line(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.push_raw(bytes);
    }

    /// Queue raw bytes as one line, exactly as given. Used to script
    /// undecodable noise.
    pub fn push_raw(&self, bytes: Vec<u8>) {
        let mut state = self.inner.state.lock().unwrap();
        state.lines.push_back(bytes);
        self.inner.arrived.notify_all();
    }

    /// Mark the device as hung up. Queued lines still drain before the
    /// link reports [ReadOutcome::Disconnected].
    pub fn disconnect(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.disconnected = true;
        self.inner.arrived.notify_all();
    }

    /// Whether the link is currently open. Test probe.
    pub fn is_open(&self) -> bool {
        self.inner.state.lock().unwrap().open
    }

    /// How many times the link was closed. Test probe.
    pub fn close_count(&self) -> u32 {
        self.inner.state.lock().unwrap().close_count
    }
}

/// In-memory serial link driven by a [LinkFeed].
pub struct ScriptedLink {
    name: String,
    inner: Arc<FeedInner>,
    fail_open: bool,
}

impl ScriptedLink {
    /// Create a closed link and its feed handle. The listener opens it
    /// during set_port.
    pub fn new(name: &str) -> (Self, LinkFeed) {
        let inner = Arc::new(FeedInner {
            state: Mutex::new(FeedState {
                lines: VecDeque::new(),
                disconnected: false,
                open: false,
                close_count: 0,
            }),
            arrived: Condvar::new(),
        });
        let feed = LinkFeed {
            inner: Arc::clone(&inner),
        };
        (
            ScriptedLink {
                name: name.to_string(),
                inner,
                fail_open: false,
            },
            feed,
        )
    }

    /// Create a link preloaded with text lines.
    pub fn preloaded(name: &str, lines: &[&str]) -> (Self, LinkFeed) {
        let (link, feed) = Self::new(name);
        for line in lines {
            feed.push_line(line);
        }
        (link, feed)
    }

    /// Create a link whose open() always fails, emulating a missing
    /// device.
    pub fn failing(name: &str) -> Self {
        let (mut link, _feed) = Self::new(name);
        link.fail_open = true;
        link
    }
}

impl SerialLink for ScriptedLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.inner.state.lock().unwrap().open
    }

    fn open(&mut self) -> io::Result<()> {
        if self.fail_open {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such device: {}", self.name),
            ));
        }
        self.inner.state.lock().unwrap().open = true;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        let mut state = self.inner.state.lock().unwrap();
        state.open = false;
        state.close_count += 1;
        // Wake any blocked reader so it can observe the closed handle.
        self.inner.arrived.notify_all();
        Ok(())
    }

    fn read_line(&mut self, timeout: Duration) -> io::Result<ReadOutcome> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock().unwrap();
        loop {
            if !state.open {
                return Err(io::Error::new(
                    io::ErrorKind::NotConnected,
                    "read from closed link",
                ));
            }
            if let Some(bytes) = state.lines.pop_front() {
                return Ok(ReadOutcome::Line(bytes));
            }
            if state.disconnected {
                return Ok(ReadOutcome::Disconnected);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(ReadOutcome::TimedOut);
            }
            let (guard, wait) = self
                .inner
                .arrived
                .wait_timeout(state, remaining)
                .expect("scripted link lock poisoned");
            state = guard;
            if wait.timed_out() && state.lines.is_empty() && !state.disconnected {
                return Ok(ReadOutcome::TimedOut);
            }
        }
    }
}
