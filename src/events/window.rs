use serde::{Deserialize, Serialize};
use std::fmt;

/// Непрозрачный идентификатор окна, выданный хост-окружением.
///
/// После события удаления окна идентификатор больше не разыменовывается:
/// все снимки состояния берутся из кэша наблюдателя.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[allow(dead_code)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Снимок состояния окна в момент чтения
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub class: String,
    pub title: String,
}

impl WindowSnapshot {
    pub fn new(class: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            title: title.into(),
        }
    }
}

impl fmt::Display for WindowSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.class.is_empty() {
            write!(f, "\"{}\"", self.title)
        } else {
            write!(f, "\"{}\" ({})", self.title, self.class)
        }
    }
}

/// Вид исходящего сигнала
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    Initial,
    Created,
    Changed,
    Destroyed,
}

impl SignalKind {
    /// Имя D-Bus member, под которым сигнал уходит на шину
    pub fn member(self) -> &'static str {
        match self {
            SignalKind::Initial => "Initial",
            SignalKind::Created => "Created",
            SignalKind::Changed => "Changed",
            SignalKind::Destroyed => "Destroyed",
        }
    }
}

/// Исходящее уведомление об активном окне
#[derive(Debug, Clone)]
pub struct ActiveWindowSignal {
    pub kind: SignalKind,
    pub window: WindowSnapshot,
    pub timestamp: std::time::Instant,
}

impl ActiveWindowSignal {
    pub fn new(kind: SignalKind, window: WindowSnapshot) -> Self {
        Self {
            kind,
            window,
            timestamp: std::time::Instant::now(),
        }
    }
}

impl fmt::Display for ActiveWindowSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} ({}ms ago)",
            self.kind,
            self.window,
            self.timestamp.elapsed().as_millis()
        )
    }
}

/// Входящее уведомление от хост-окружения.
///
/// `ActiveChanged` не несёт полезной нагрузки: текущее активное окно
/// запрашивается у хоста в момент обработки.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    ActiveChanged,
    Added(WindowId),
    Removed(WindowId),
    TitleChanged(WindowId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_member_names() {
        assert_eq!(SignalKind::Initial.member(), "Initial");
        assert_eq!(SignalKind::Created.member(), "Created");
        assert_eq!(SignalKind::Changed.member(), "Changed");
        assert_eq!(SignalKind::Destroyed.member(), "Destroyed");
    }

    #[test]
    fn test_snapshot_display() {
        let snap = WindowSnapshot::new("firefox", "Mozilla Firefox");
        assert_eq!(format!("{}", snap), "\"Mozilla Firefox\" (firefox)");

        let bare = WindowSnapshot::new("", "term");
        assert_eq!(format!("{}", bare), "\"term\"");
    }

    #[test]
    fn test_window_id_roundtrip() {
        let id = WindowId::new("{a1b2}");
        assert_eq!(id.as_str(), "{a1b2}");
        assert_eq!(format!("{}", id), "{a1b2}");
    }
}
