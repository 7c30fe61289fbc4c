use crate::events::{WindowId, WindowSnapshot};
use crate::services::host::WindowHost;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Локальное зеркало состояния окон хоста.
///
/// Заполняется бэкендом (обратными вызовами KWin-скрипта либо сценарием
/// эмуляции); все запросы WindowHost отвечаются из зеркала без обращения
/// к компоситору. Запись об окне удаляется до того, как событие удаления
/// уходит наблюдателю, поэтому удалённое окно никогда не разыменовывается.
#[derive(Debug, Default)]
pub struct WindowMirror {
    windows: HashMap<WindowId, WindowSnapshot>,
    active: Option<WindowId>,
}

impl WindowMirror {
    pub fn insert(&mut self, id: WindowId, snapshot: WindowSnapshot) {
        self.windows.insert(id, snapshot);
    }

    pub fn remove(&mut self, id: &WindowId) {
        self.windows.remove(id);
        if self.active.as_ref() == Some(id) {
            self.active = None;
        }
    }

    /// Обновить заголовок; false, если окно зеркалу неизвестно
    pub fn set_title(&mut self, id: &WindowId, title: String) -> bool {
        match self.windows.get_mut(id) {
            Some(snapshot) => {
                snapshot.title = title;
                true
            }
            None => false,
        }
    }

    pub fn set_active(&mut self, id: Option<WindowId>) {
        self.active = id;
    }

    pub fn active(&self) -> Option<&WindowId> {
        self.active.as_ref()
    }

    pub fn get(&self, id: &WindowId) -> Option<&WindowSnapshot> {
        self.windows.get(id)
    }

    pub fn ids(&self) -> Vec<WindowId> {
        self.windows.keys().cloned().collect()
    }
}

/// Запросы WindowHost поверх зеркала
pub struct MirrorWindowHost {
    mirror: Arc<RwLock<WindowMirror>>,
}

impl MirrorWindowHost {
    pub fn new(mirror: Arc<RwLock<WindowMirror>>) -> Self {
        Self { mirror }
    }
}

#[async_trait::async_trait]
impl WindowHost for MirrorWindowHost {
    async fn active_window(&self) -> Option<WindowId> {
        self.mirror.read().active().cloned()
    }

    async fn window_class(&self, id: &WindowId) -> Option<String> {
        self.mirror.read().get(id).map(|s| s.class.clone())
    }

    async fn window_title(&self, id: &WindowId) -> Option<String> {
        self.mirror.read().get(id).map(|s| s.title.clone())
    }

    async fn windows(&self) -> Vec<WindowId> {
        self.mirror.read().ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_clears_active() {
        let mut mirror = WindowMirror::default();
        let id = WindowId::new("w1");
        mirror.insert(id.clone(), WindowSnapshot::new("term", "Term"));
        mirror.set_active(Some(id.clone()));

        mirror.remove(&id);
        assert!(mirror.active().is_none());
        assert!(mirror.get(&id).is_none());
    }

    #[test]
    fn test_set_title_for_unknown_window() {
        let mut mirror = WindowMirror::default();
        assert!(!mirror.set_title(&WindowId::new("ghost"), "x".to_string()));
    }

    #[tokio::test]
    async fn test_mirror_host_queries() {
        let mirror = Arc::new(RwLock::new(WindowMirror::default()));
        let host = MirrorWindowHost::new(mirror.clone());

        let id = WindowId::new("w1");
        {
            let mut m = mirror.write();
            m.insert(id.clone(), WindowSnapshot::new("editor", "a.txt"));
            m.set_active(Some(id.clone()));
        }

        assert_eq!(host.active_window().await, Some(id.clone()));
        assert_eq!(host.window_class(&id).await.as_deref(), Some("editor"));
        assert_eq!(host.window_title(&id).await.as_deref(), Some("a.txt"));
        assert_eq!(
            host.snapshot(&id).await,
            Some(WindowSnapshot::new("editor", "a.txt"))
        );
        assert_eq!(host.windows().await, vec![id]);
    }
}
