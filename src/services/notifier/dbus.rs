use crate::error::Result;
use crate::events::{ActiveWindowSignal, SignalKind};
use crate::services::notifier::r#trait::NotifierTrait;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use zbus::object_server::SignalEmitter;
use zbus::Connection;

// Формат сигналов зафиксирован слушателями: путь, интерфейс и имена
// member'ов менять нельзя
pub const SIGNAL_OBJECT_PATH: &str = "/ActiveWindow";
pub const SIGNAL_INTERFACE: &str = "org.ahkwayland.ActiveWindow";

struct ActiveWindowInterface;

#[zbus::interface(name = "org.ahkwayland.ActiveWindow")]
impl ActiveWindowInterface {
    #[zbus(signal)]
    async fn initial(
        signal_emitter: &SignalEmitter<'_>,
        window_class: &str,
        window_title: &str,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn created(
        signal_emitter: &SignalEmitter<'_>,
        window_class: &str,
        window_title: &str,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn changed(
        signal_emitter: &SignalEmitter<'_>,
        window_class: &str,
        window_title: &str,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn destroyed(
        signal_emitter: &SignalEmitter<'_>,
        window_class: &str,
        window_title: &str,
    ) -> zbus::Result<()>;
}

pub struct DbusNotifier;

impl DbusNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl NotifierTrait for DbusNotifier {
    async fn run(
        self: Box<Self>,
        mut signals: broadcast::Receiver<ActiveWindowSignal>,
    ) -> Result<()> {
        let connection = Connection::session().await?;
        connection
            .object_server()
            .at(SIGNAL_OBJECT_PATH, ActiveWindowInterface)
            .await?;
        let emitter = SignalEmitter::new(&connection, SIGNAL_OBJECT_PATH)?.into_owned();

        info!(
            "D-Bus нотификатор подключён к сессионной шине ({})",
            SIGNAL_INTERFACE
        );

        loop {
            match signals.recv().await {
                Ok(signal) => {
                    debug!("Отправка сигнала: {}", signal);
                    let class = signal.window.class.as_str();
                    let title = signal.window.title.as_str();
                    let result = match signal.kind {
                        SignalKind::Initial => {
                            ActiveWindowInterface::initial(&emitter, class, title).await
                        }
                        SignalKind::Created => {
                            ActiveWindowInterface::created(&emitter, class, title).await
                        }
                        SignalKind::Changed => {
                            ActiveWindowInterface::changed(&emitter, class, title).await
                        }
                        SignalKind::Destroyed => {
                            ActiveWindowInterface::destroyed(&emitter, class, title).await
                        }
                    };

                    // Сигналы не подтверждаются и не повторяются
                    if let Err(e) = result {
                        warn!("Не удалось отправить сигнал {}: {}", signal.kind.member(), e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Нотификатор отстал, пропущено сигналов: {}", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        info!("D-Bus нотификатор завершает работу");
        Ok(())
    }
}
