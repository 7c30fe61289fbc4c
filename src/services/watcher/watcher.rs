use crate::config::Config;
use crate::error::Result;
use crate::events::{ActiveWindowSignal, HostEvent, SignalKind, WindowId, WindowSnapshot};
use crate::services::host::WindowHost;
use crate::services::scheduler::DelayScheduler;
use crate::services::watcher::state::{
    fast_retry_delay, is_title_unusable, needs_title_retry, PendingPoll, WatcherInput,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

pub struct FocusTitleWatcher {
    config: Arc<Config>,
    host: Arc<dyn WindowHost>,
    scheduler: Arc<dyn DelayScheduler>,
    signals: broadcast::Sender<ActiveWindowSignal>,
    pending: PendingPoll,
    // последний прочитанный снимок каждого окна; из него берётся
    // полезная нагрузка Destroyed, когда само окно уже недоступно
    known: HashMap<WindowId, WindowSnapshot>,
}

impl FocusTitleWatcher {
    pub fn new(
        config: Arc<Config>,
        host: Arc<dyn WindowHost>,
        scheduler: Arc<dyn DelayScheduler>,
    ) -> Self {
        let (signals, _) = broadcast::channel(config.notify.queue_size);
        Self {
            config,
            host,
            scheduler,
            signals,
            pending: PendingPoll::new(),
            known: HashMap::new(),
        }
    }

    /// Подписка на исходящие сигналы. Опоздавший подписчик прошлых
    /// сигналов не получает.
    pub fn subscribe(&self) -> broadcast::Receiver<ActiveWindowSignal> {
        self.signals.subscribe()
    }

    pub async fn run(mut self, mut inputs: mpsc::UnboundedReceiver<WatcherInput>) -> Result<()> {
        info!("FocusTitleWatcher запущен");

        // Стартовое состояние (EmitInitial) кладёт в очередь хост-бэкенд,
        // когда его список окон заполнен; наблюдатель лишь обрабатывает
        while let Some(input) = inputs.recv().await {
            self.handle_input(input).await;
        }

        info!("FocusTitleWatcher завершает работу");
        Ok(())
    }

    pub async fn handle_input(&mut self, input: WatcherInput) {
        match input {
            WatcherInput::Host(HostEvent::ActiveChanged) => self.on_activated().await,
            WatcherInput::Host(HostEvent::Added(id)) => self.on_window_added(id).await,
            WatcherInput::Host(HostEvent::Removed(id)) => self.on_window_removed(id).await,
            WatcherInput::Host(HostEvent::TitleChanged(id)) => self.on_title_changed(id).await,
            WatcherInput::EmitInitial => self.emit_initial_state().await,
            WatcherInput::RetryTick {
                generation,
                attempt,
            } => self.on_retry_tick(generation, attempt).await,
            WatcherInput::PollTick { generation } => self.on_poll_tick(generation).await,
        }
    }

    async fn on_activated(&mut self) {
        let active = self.host.active_window().await;
        self.pending.prune_inactive(active.as_ref());

        let Some(id) = active else {
            return;
        };
        let Some(snapshot) = self.host.snapshot(&id).await else {
            return;
        };
        self.known.insert(id.clone(), snapshot.clone());

        self.emit(SignalKind::Changed, snapshot.clone());

        if needs_title_retry(&snapshot) {
            debug!(
                "Заголовок окна {} выглядит неполным ({:?}), начинаем дожидание",
                id, snapshot.title
            );
            let generation = self.pending.begin(id);
            self.scheduler.schedule_once(
                fast_retry_delay(self.config.retry.fast_delay(), 1),
                WatcherInput::RetryTick {
                    generation,
                    attempt: 1,
                },
            );
        } else {
            self.pending.clear();
        }
    }

    async fn on_retry_tick(&mut self, generation: u64, attempt: u32) {
        if !self.pending.is_current(generation) {
            return; // тик отменённой последовательности
        }
        let Some(target) = self.pending.target().cloned() else {
            return;
        };

        if self.host.active_window().await.as_ref() != Some(&target) {
            debug!("Окно {} потеряло фокус, дожидание прекращено", target);
            self.pending.abandon(&target);
            return;
        }

        let Some(snapshot) = self.host.snapshot(&target).await else {
            self.pending.abandon(&target);
            return;
        };
        self.known.insert(target.clone(), snapshot.clone());

        if !needs_title_retry(&snapshot) {
            debug!("Заголовок окна {} получен с попытки {}", target, attempt);
            self.emit(SignalKind::Changed, snapshot);
            self.pending.resolve(&target);
            return;
        }

        if attempt >= self.config.retry.fast_attempts {
            debug!(
                "Быстрые попытки для окна {} исчерпаны, переходим на медленный опрос",
                target
            );
            let generation = self.pending.enter_slow_poll();
            self.scheduler.schedule_once(
                self.config.retry.slow_poll_interval(),
                WatcherInput::PollTick { generation },
            );
        } else {
            let next = attempt + 1;
            self.pending.advance_fast(next);
            self.scheduler.schedule_once(
                fast_retry_delay(self.config.retry.fast_delay(), next),
                WatcherInput::RetryTick {
                    generation,
                    attempt: next,
                },
            );
        }
    }

    async fn on_poll_tick(&mut self, generation: u64) {
        if !self.pending.is_current(generation) {
            return;
        }

        let active = self.host.active_window().await;
        self.pending.prune_inactive(active.as_ref());

        let Some(id) = active else {
            self.pending.clear();
            return;
        };
        if !self.pending.polled_contains(&id) {
            // фокус ушёл на окно со здоровым заголовком; опрашивать нечего
            self.pending.clear();
            return;
        }

        let Some(snapshot) = self.host.snapshot(&id).await else {
            self.pending.abandon(&id);
            return;
        };
        self.known.insert(id.clone(), snapshot.clone());

        if !needs_title_retry(&snapshot) {
            debug!("Медленный опрос: заголовок окна {} получен", id);
            self.emit(SignalKind::Changed, snapshot);
            self.pending.resolve(&id);
            return;
        }

        self.scheduler.schedule_once(
            self.config.retry.slow_poll_interval(),
            WatcherInput::PollTick { generation },
        );
    }

    async fn on_window_added(&mut self, id: WindowId) {
        let Some(snapshot) = self.host.snapshot(&id).await else {
            return;
        };
        self.known.insert(id.clone(), snapshot.clone());
        self.emit(SignalKind::Created, snapshot);
    }

    async fn on_title_changed(&mut self, id: WindowId) {
        let Some(snapshot) = self.host.snapshot(&id).await else {
            return;
        };
        self.known.insert(id.clone(), snapshot.clone());

        if self.host.active_window().await.as_ref() != Some(&id) {
            return; // о фоновых окнах не сообщаем
        }

        if self.pending.polled_contains(&id) && !is_title_unusable(&snapshot.title) {
            self.pending.resolve(&id);
        }
        self.emit(SignalKind::Changed, snapshot);
    }

    async fn on_window_removed(&mut self, id: WindowId) {
        self.pending.drop_window(&id);

        let snapshot = self.known.remove(&id).unwrap_or_default();
        self.emit(SignalKind::Destroyed, snapshot);

        // Сразу же сообщаем о новом активном окне, не дожидаясь события хоста
        self.on_activated().await;
    }

    async fn emit_initial_state(&mut self) {
        // Прогреваем кэш снимков: удаление любого из этих окон должно
        // сопровождаться осмысленной полезной нагрузкой Destroyed
        for id in self.host.windows().await {
            if let Some(snapshot) = self.host.snapshot(&id).await {
                self.known.insert(id, snapshot);
            }
        }

        let Some(id) = self.host.active_window().await else {
            return;
        };
        let Some(snapshot) = self.host.snapshot(&id).await else {
            return;
        };
        info!("Стартовое активное окно: {}", snapshot);
        self.emit(SignalKind::Initial, snapshot);
    }

    fn emit(&self, kind: SignalKind, window: WindowSnapshot) {
        let signal = ActiveWindowSignal::new(kind, window);
        debug!("Сигнал: {}", signal);
        // Отсутствие получателей не является ошибкой
        let _ = self.signals.send(signal);
    }
}
