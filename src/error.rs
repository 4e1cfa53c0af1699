//! Typed fault taxonomy and the diagnostics channel.
//!
//! Four categories of things go wrong during a build, with very different
//! propagation rules:
//! - configuration faults are fatal and surfaced to the caller;
//! - file faults (unreadable/unparseable sources) are recoverable - the file
//!   is treated as absent;
//! - resolution faults (call sites no strategy can place) are recoverable -
//!   the call site is dropped;
//! - invariant violations are internal bugs and fatal.
//!
//! Only the fatal categories ever become `Err` values. The recoverable ones
//! are reported through [`Diagnostics`], a thin wrapper over the optional
//! string channel the caller may attach.

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Fatal faults: invalid configuration, or an internal invariant broken.
#[derive(Error, Debug)]
pub enum Fault {
    /// Empty source or target selection, bad bounds, missing root.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A selector that names a file outside the repository root.
    #[error("selector path escapes repository root: {path}")]
    SelectorOutsideRoot { path: PathBuf },

    /// A selector whose file could not be read at all.
    #[error("cannot read selected file {path}: {message}")]
    SelectedFileUnreadable { path: PathBuf, message: String },

    /// Internal bug: an edge or id referencing a node the graph doesn't hold.
    #[error("internal invariant violated: {message}")]
    Invariant { message: String },
}

impl Fault {
    pub fn config(message: impl Into<String>) -> Self {
        Fault::Config {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Fault::Invariant {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Fault>;

/// Verbose diagnostic sink. Clones share the same underlying channel.
///
/// When no sender is attached (or verbose is off) every emit is a no-op, so
/// hot paths can report freely. Send failures are ignored: a dropped receiver
/// just means nobody is listening anymore.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<Sender<String>>,
}

impl Diagnostics {
    /// A sink that discards everything.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// A sink forwarding into the given channel.
    pub fn channel(sender: Sender<String>) -> Self {
        Self { sink: Some(sender) }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Report a recoverable fault. Never fails, never allocates when disabled.
    pub fn emit(&self, message: impl FnOnce() -> String) {
        if let Some(ref sink) = self.sink {
            let _ = sink.send(message());
        }
    }

    /// Report an unreadable or unparseable file.
    pub fn file_fault(&self, path: &str, detail: &str) {
        self.emit(|| format!("skipping file {path}: {detail}"));
    }

    /// Report a call site that no resolution strategy could place.
    pub fn resolution_fault(&self, caller: &str, callee: &str, specifier: Option<&str>) {
        self.emit(|| match specifier {
            Some(spec) => format!("unresolved call {callee} in {caller} (import '{spec}')"),
            None => format!("unresolved call {callee} in {caller}"),
        });
    }
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn disabled_sink_is_silent() {
        let diag = Diagnostics::disabled();
        diag.file_fault("/tmp/a.ts", "no such file");
        assert!(!diag.is_enabled());
    }

    #[test]
    fn channel_sink_forwards_messages() {
        let (tx, rx) = channel();
        let diag = Diagnostics::channel(tx);
        diag.resolution_fault("a.ts::main", "helper", Some("./b"));
        let msg = rx.try_recv().unwrap();
        assert!(msg.contains("helper"));
        assert!(msg.contains("./b"));
    }

    #[test]
    fn dropped_receiver_does_not_panic() {
        let (tx, rx) = channel();
        drop(rx);
        let diag = Diagnostics::channel(tx);
        diag.file_fault("/tmp/a.ts", "gone");
    }

    #[test]
    fn fault_messages() {
        let f = Fault::config("sources are empty");
        assert!(f.to_string().contains("sources are empty"));
        let i = Fault::invariant("edge without node");
        assert!(i.to_string().starts_with("internal invariant"));
    }
}
