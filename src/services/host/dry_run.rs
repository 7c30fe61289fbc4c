use crate::error::Result;
use crate::events::{HostEvent, WindowId, WindowSnapshot};
use crate::services::host::mirror::{MirrorWindowHost, WindowMirror};
use crate::services::host::r#trait::{HostBackendTrait, HostEventSender, WindowHost};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::time::{interval, sleep, Duration};
use tracing::info;

pub struct DryRunHost {
    mirror: Arc<RwLock<WindowMirror>>,
    events: HostEventSender,
    previous: Option<WindowId>,
}

impl DryRunHost {
    pub fn create(events: HostEventSender) -> (Arc<dyn WindowHost>, Self) {
        let mirror = Arc::new(RwLock::new(WindowMirror::default()));
        let host: Arc<dyn WindowHost> = Arc::new(MirrorWindowHost::new(mirror.clone()));
        (
            host,
            Self {
                mirror,
                events,
                previous: None,
            },
        )
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Dry-run режим - WindowHost работает в режиме эмуляции");

        // Стартовый список пуст, но отчитаться о нём всё равно нужно
        self.events.notify_initial();

        let fake_windows = [
            ("terminal", "Terminal - dry_run"),
            ("browser", "Browser - dry_run"),
            ("editor", "Editor - dry_run"),
            ("game", "Game - dry_run"),
        ];

        let mut cycle = 0usize;
        let mut interval = interval(Duration::from_secs(10));

        loop {
            interval.tick().await;

            let (class, title) = fake_windows[cycle % fake_windows.len()];
            let id = WindowId::new(format!("dry-run-{}", cycle));

            info!("Dry-run: эмулируем появление окна класса '{}'", class);

            // Новое окно появляется с пустым заголовком, как у настоящих
            // клиентов; заголовок доезжает чуть позже и прогоняет
            // наблюдателя через быстрые попытки
            self.mirror
                .write()
                .insert(id.clone(), WindowSnapshot::new(class, ""));
            self.events.notify(HostEvent::Added(id.clone()));

            self.mirror.write().set_active(Some(id.clone()));
            self.events.notify(HostEvent::ActiveChanged);

            sleep(Duration::from_millis(200)).await;

            info!("Dry-run: эмулируем появление заголовка: {}", title);
            self.mirror.write().set_title(&id, title.to_string());
            self.events.notify(HostEvent::TitleChanged(id.clone()));

            if let Some(prev) = self.previous.take() {
                info!("Dry-run: эмулируем закрытие окна {}", prev);
                self.mirror.write().remove(&prev);
                self.events.notify(HostEvent::Removed(prev));
            }
            self.previous = Some(id);

            cycle += 1;
        }
    }
}

#[async_trait::async_trait]
impl HostBackendTrait for DryRunHost {
    async fn run(mut self: Box<Self>) -> Result<()> {
        (*self).run().await
    }
}
