use crate::error::Result;
use crate::events::ActiveWindowSignal;
use tokio::sync::broadcast;

/// Trait for outbound notifiers that can run in different modes
#[async_trait::async_trait]
pub trait NotifierTrait {
    /// Forward signals from the broadcast channel until it closes
    async fn run(
        self: Box<Self>,
        signals: broadcast::Receiver<ActiveWindowSignal>,
    ) -> Result<()>;
}

/// Factory function to create an appropriate notifier based on the dry_run flag
pub fn create_notifier(dry_run: bool) -> Result<Box<dyn NotifierTrait + Send>> {
    if dry_run {
        Ok(Box::new(super::dry_run::DryRunNotifier::new()))
    } else {
        Ok(Box::new(super::dbus::DbusNotifier::new()))
    }
}
