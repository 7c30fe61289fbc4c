mod dbus;
mod dry_run;
mod r#trait;

pub use self::r#trait::{create_notifier, NotifierTrait};
