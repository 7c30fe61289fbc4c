pub mod window;

pub use window::{ActiveWindowSignal, HostEvent, SignalKind, WindowId, WindowSnapshot};
