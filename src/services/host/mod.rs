//! Host service: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for delivering window
//! state from the host environment: lifecycle/focus/title events pushed into
//! the watcher queue, and point-in-time queries answered from a local mirror.
//! It MUST NOT decide what to emit or when; retry and signal policy belong
//! exclusively to the FocusTitleWatcher.

mod dry_run;
mod kwin;
mod mirror;
mod r#trait;

pub use self::r#trait::{create_host, HostBackendTrait, HostEventSender, WindowHost};
