//! Line input from stdin, read on a background thread so the scheduler loop
//! never blocks on the terminal.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use engine_logging::engine_debug;

pub struct Console {
    lines: Receiver<String>,
}

/// Result of asking the console for its next line without blocking.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Line(String),
    Empty,
    Closed,
}

impl Console {
    /// Start the stdin reader thread.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.send(line).is_err() {
                    break;
                }
            }
            engine_debug!("stdin closed");
        });
        Self::from_receiver(rx)
    }

    pub fn from_receiver(lines: Receiver<String>) -> Self {
        Self { lines }
    }

    pub fn try_line(&self) -> Input {
        match self.lines.try_recv() {
            Ok(line) => Input::Line(line),
            Err(TryRecvError::Empty) => Input::Empty,
            Err(TryRecvError::Disconnected) => Input::Closed,
        }
    }

    /// Wait up to `timeout` for an answer. `None` on timeout or closed input.
    pub fn wait_line(&self, timeout: Duration) -> Option<String> {
        match self.lines.recv_timeout(timeout) {
            Ok(line) => Some(line),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// `y` or `yes`, any case.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
