pub mod host;
pub mod notifier;
pub mod scheduler;
pub mod watcher;

pub use host::{create_host, HostEventSender};
pub use notifier::create_notifier;
pub use scheduler::TokioScheduler;
pub use watcher::FocusTitleWatcher;
