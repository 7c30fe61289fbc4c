//! FocusTitleWatcher service: responsibility and boundaries
//!
//! This module is responsible ONLY for turning host window notifications
//! (activation, add, remove, title change) into outbound ActiveWindowSignals,
//! including the retry/poll machinery for windows whose title arrives after
//! activation. It MUST NOT talk to D-Bus or to the compositor directly: the
//! host side is reached through the WindowHost trait and the DelayScheduler,
//! the outbound side is a broadcast channel consumed by the notifier.
//!
//! Contract note: a window activated with a placeholder title produces a
//! Changed signal immediately and a second Changed once the real title is
//! known. Consumers must treat the latest Changed as authoritative.

mod state;
mod watcher;

pub use state::{is_title_unusable, RetryPhase, WatcherInput};
pub use watcher::FocusTitleWatcher;
