use crate::services::watcher::WatcherInput;
use std::time::Duration;
use tokio::sync::mpsc;

/// Планировщик однократных отложенных срабатываний.
///
/// Наблюдатель никогда не спит сам: все задержки проходят через эту
/// абстракцию и возвращаются в его очередь обычными входными элементами.
/// В тестах планировщик подменяется на очередь с ручным запуском.
pub trait DelayScheduler: Send + Sync {
    fn schedule_once(&self, delay: Duration, input: WatcherInput);
}

/// Боевой планировщик: спит в отдельной задаче и шлёт элемент в очередь
/// наблюдателя. Если наблюдатель уже завершился, результат отправки неважен.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<WatcherInput>,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<WatcherInput>) -> Self {
        Self { tx }
    }
}

impl DelayScheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, input: WatcherInput) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let _ = tx.send(input);
        });
    }
}
