use crate::events::{HostEvent, WindowId, WindowSnapshot};
use std::collections::HashSet;
use std::time::Duration;

/// Элемент входной очереди наблюдателя.
///
/// События хоста и срабатывания таймеров идут через одну очередь, поэтому
/// обрабатываются строго в порядке поступления. Тики таймеров несут номер
/// поколения, зафиксированный при планировании: устаревший тик отбрасывается.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherInput {
    Host(HostEvent),
    EmitInitial,
    RetryTick { generation: u64, attempt: u32 },
    PollTick { generation: u64 },
}

/// Фаза дожидания заголовка активного окна
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPhase {
    Idle,
    FastRetry(u32),
    SlowPoll,
}

/// Заголовок непригоден: пустой или начинается с подчёркивания
/// (так компоситоры помечают ещё не заполненные заголовки)
pub fn is_title_unusable(title: &str) -> bool {
    title.is_empty() || title.starts_with('_')
}

/// Заголовок требует дожидания: непригоден либо совпадает с классом окна
pub fn needs_title_retry(snapshot: &WindowSnapshot) -> bool {
    is_title_unusable(&snapshot.title) || snapshot.title == snapshot.class
}

/// Задержка быстрой попытки `attempt` (нумерация с 1): base, 2*base, 4*base...
///
/// При base = 50мс попытки срабатывают через 50/150/350мс после активации.
pub fn fast_retry_delay(base: Duration, attempt: u32) -> Duration {
    base * (1u32 << (attempt.saturating_sub(1)))
}

/// Состояние дожидания заголовка: единственная цель быстрых попыток плюс
/// множество окон под медленным опросом.
///
/// Инварианты:
/// - `target`, если задан, хранит последнее активированное окно, у которого
///   заголовок ещё подозревается в неполноте; сбрасывается, как только окно
///   теряет фокус, уничтожается или получает пригодный заголовок;
/// - `polled` содержит только окна, которые были активными с непригодным
///   заголовком; членство снимается по тем же причинам.
#[derive(Debug)]
pub struct PendingPoll {
    target: Option<WindowId>,
    polled: HashSet<WindowId>,
    phase: RetryPhase,
    generation: u64,
}

impl PendingPoll {
    pub fn new() -> Self {
        Self {
            target: None,
            polled: HashSet::new(),
            phase: RetryPhase::Idle,
            generation: 0,
        }
    }

    pub fn target(&self) -> Option<&WindowId> {
        self.target.as_ref()
    }

    #[allow(dead_code)]
    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    #[allow(dead_code)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    pub fn polled_contains(&self, id: &WindowId) -> bool {
        self.polled.contains(id)
    }

    /// Начать последовательность быстрых попыток для окна.
    /// Возвращает номер нового поколения для планируемого тика.
    pub fn begin(&mut self, id: WindowId) -> u64 {
        self.polled.insert(id.clone());
        self.target = Some(id);
        self.phase = RetryPhase::FastRetry(1);
        self.generation += 1;
        self.generation
    }

    pub fn advance_fast(&mut self, attempt: u32) {
        self.phase = RetryPhase::FastRetry(attempt);
    }

    /// Перейти от быстрых попыток к медленному опросу.
    /// Поколение сохраняется: это та же логическая последовательность.
    pub fn enter_slow_poll(&mut self) -> u64 {
        self.phase = RetryPhase::SlowPoll;
        self.generation
    }

    /// Заголовок получен: снять окно с опроса и закончить последовательность
    pub fn resolve(&mut self, id: &WindowId) {
        self.polled.remove(id);
        self.clear();
    }

    /// Окно потеряло фокус или исчезло: молча прекратить дожидание
    pub fn abandon(&mut self, id: &WindowId) {
        self.polled.remove(id);
        self.clear();
    }

    /// Сбросить цель без изменения множества опроса
    pub fn clear(&mut self) {
        self.target = None;
        self.phase = RetryPhase::Idle;
        self.generation += 1;
    }

    /// Окно удалено хостом: убрать все следы; вернуть true, если оно было целью
    pub fn drop_window(&mut self, id: &WindowId) -> bool {
        self.polled.remove(id);
        if self.target.as_ref() == Some(id) {
            self.clear();
            true
        } else {
            false
        }
    }

    /// Выкинуть из множества опроса всё, что не является активным окном
    pub fn prune_inactive(&mut self, active: Option<&WindowId>) {
        self.polled.retain(|id| Some(id) == active);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wid(s: &str) -> WindowId {
        WindowId::new(s)
    }

    #[test]
    fn test_unusable_titles() {
        assert!(is_title_unusable(""));
        assert!(is_title_unusable("_x"));
        assert!(is_title_unusable("_NET_WM_pending"));
        assert!(!is_title_unusable("Firefox"));
        assert!(!is_title_unusable(" "));
    }

    #[test]
    fn test_title_equal_to_class_needs_retry() {
        assert!(needs_title_retry(&WindowSnapshot::new("firefox", "firefox")));
        assert!(needs_title_retry(&WindowSnapshot::new("firefox", "")));
        assert!(!needs_title_retry(&WindowSnapshot::new("firefox", "Mozilla Firefox")));
    }

    #[test]
    fn test_fast_retry_delays_double() {
        let base = Duration::from_millis(50);
        assert_eq!(fast_retry_delay(base, 1), Duration::from_millis(50));
        assert_eq!(fast_retry_delay(base, 2), Duration::from_millis(100));
        assert_eq!(fast_retry_delay(base, 3), Duration::from_millis(200));

        // накопительно: 50, 150, 350 мс от активации
        let cumulative: u128 = (1..=3).map(|a| fast_retry_delay(base, a).as_millis()).sum();
        assert_eq!(cumulative, 350);
    }

    #[test]
    fn test_begin_sets_target_and_bumps_generation() {
        let mut pending = PendingPoll::new();
        let g0 = pending.generation();

        let g1 = pending.begin(wid("a"));
        assert!(g1 > g0);
        assert_eq!(pending.target(), Some(&wid("a")));
        assert_eq!(pending.phase(), RetryPhase::FastRetry(1));
        assert!(pending.polled_contains(&wid("a")));
        assert!(pending.is_current(g1));
    }

    #[test]
    fn test_resolve_clears_everything() {
        let mut pending = PendingPoll::new();
        let g = pending.begin(wid("a"));

        pending.resolve(&wid("a"));
        assert_eq!(pending.target(), None);
        assert_eq!(pending.phase(), RetryPhase::Idle);
        assert!(!pending.polled_contains(&wid("a")));
        // тик, запланированный до resolve, теперь устаревший
        assert!(!pending.is_current(g));
    }

    #[test]
    fn test_new_begin_invalidates_previous_sequence() {
        let mut pending = PendingPoll::new();
        let g_a = pending.begin(wid("a"));
        let g_b = pending.begin(wid("b"));

        assert!(!pending.is_current(g_a));
        assert!(pending.is_current(g_b));
        assert_eq!(pending.target(), Some(&wid("b")));
    }

    #[test]
    fn test_slow_poll_keeps_generation() {
        let mut pending = PendingPoll::new();
        let g = pending.begin(wid("a"));
        let g_poll = pending.enter_slow_poll();

        assert_eq!(g, g_poll);
        assert_eq!(pending.phase(), RetryPhase::SlowPoll);
    }

    #[test]
    fn test_drop_window_clears_target_only_for_target() {
        let mut pending = PendingPoll::new();
        pending.begin(wid("a"));

        assert!(!pending.drop_window(&wid("b")));
        assert_eq!(pending.target(), Some(&wid("a")));

        assert!(pending.drop_window(&wid("a")));
        assert_eq!(pending.target(), None);
    }

    #[test]
    fn test_prune_keeps_only_active() {
        let mut pending = PendingPoll::new();
        pending.begin(wid("a"));
        pending.begin(wid("b"));

        pending.prune_inactive(Some(&wid("b")));
        assert!(!pending.polled_contains(&wid("a")));
        assert!(pending.polled_contains(&wid("b")));

        pending.prune_inactive(None);
        assert!(!pending.polled_contains(&wid("b")));
    }
}
