use crate::error::Result;
use crate::events::ActiveWindowSignal;
use crate::services::notifier::r#trait::NotifierTrait;
use tokio::sync::broadcast;
use tracing::{info, warn};

pub struct DryRunNotifier;

impl DryRunNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl NotifierTrait for DryRunNotifier {
    async fn run(
        self: Box<Self>,
        mut signals: broadcast::Receiver<ActiveWindowSignal>,
    ) -> Result<()> {
        info!("Dry-run режим - сигналы выводятся в журнал вместо D-Bus");

        loop {
            match signals.recv().await {
                Ok(signal) => {
                    info!(
                        "Dry-run сигнал {}: класс='{}', заголовок='{}'",
                        signal.kind.member(),
                        signal.window.class,
                        signal.window.title
                    );
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Dry-run нотификатор отстал, пропущено сигналов: {}", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        Ok(())
    }
}
