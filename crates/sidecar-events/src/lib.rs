#![deny(unreachable_pub)]

//! The sidecar's single write path to its stdout protocol (§4.1 Event
//! Emitter). Serialization and the write are performed under one mutex so
//! concurrent workers never interleave partial lines; this never blocks on
//! the consumer beyond the OS pipe buffer.

use std::io::{self, Write};
use std::sync::Mutex;

use sidecar_types::OutputEvent;

/// Serializes [`OutputEvent`]s to newline-delimited JSON under a mutex.
pub struct EventEmitter<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
}

impl EventEmitter<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: Mutex::new(io::stdout()) }
    }
}

impl<W: Write + Send> EventEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { out: Mutex::new(writer) }
    }

    /// Serializes `event` to a single compact JSON line and writes it.
    /// Never panics: a serialization or write failure is logged via
    /// `tracing` and otherwise swallowed, matching the spec's stance that no
    /// internal failure may escape as a Rust error across this boundary.
    pub fn emit(&self, event: &OutputEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize output event");
                return;
            }
        };

        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = writeln!(out, "{line}") {
            tracing::warn!(error = %err, "failed to write event to stdout");
            return;
        }
        let _ = out.flush();
    }
}
