use crate::config::Config;
use crate::error::Result;
use crate::events::{HostEvent, WindowId, WindowSnapshot};
use crate::services::watcher::WatcherInput;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Запросы к хост-окружению о текущем состоянии окон.
///
/// Наблюдатель знает только этот набор возможностей; откуда берутся ответы
/// (зеркало KWin-моста или таблица эмуляции), решает бэкенд.
#[async_trait::async_trait]
pub trait WindowHost: Send + Sync {
    async fn active_window(&self) -> Option<WindowId>;

    async fn window_class(&self, id: &WindowId) -> Option<String>;

    async fn window_title(&self, id: &WindowId) -> Option<String>;

    /// Все известные хосту окна; используется один раз на старте,
    /// чтобы прогреть кэш снимков
    async fn windows(&self) -> Vec<WindowId>;

    async fn snapshot(&self, id: &WindowId) -> Option<WindowSnapshot> {
        let class = self.window_class(id).await?;
        let title = self.window_title(id).await?;
        Some(WindowSnapshot::new(class, title))
    }
}

/// Trait for host backends that can run in different modes
#[async_trait::async_trait]
pub trait HostBackendTrait {
    /// Run the host backend event pump
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Отправитель событий хоста в очередь наблюдателя
#[derive(Clone)]
pub struct HostEventSender {
    tx: mpsc::UnboundedSender<WatcherInput>,
}

impl HostEventSender {
    pub fn new(tx: mpsc::UnboundedSender<WatcherInput>) -> Self {
        Self { tx }
    }

    pub fn notify(&self, event: HostEvent) {
        let _ = self.tx.send(WatcherInput::Host(event));
    }

    /// Список окон хоста заполнен: пора сообщить стартовое активное окно.
    /// Вызывается бэкендом ровно один раз.
    pub fn notify_initial(&self) {
        let _ = self.tx.send(WatcherInput::EmitInitial);
    }
}

/// Factory function to create an appropriate host backend based on the dry_run flag
pub fn create_host(
    config: Arc<Config>,
    events: HostEventSender,
    dry_run: bool,
) -> Result<(Arc<dyn WindowHost>, Box<dyn HostBackendTrait + Send>)> {
    if dry_run {
        let (host, backend) = super::dry_run::DryRunHost::create(events);
        Ok((host, Box::new(backend)))
    } else {
        let (host, backend) = super::kwin::KwinHost::create(config, events)?;
        Ok((host, Box::new(backend)))
    }
}
