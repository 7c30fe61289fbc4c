use crate::config::Config;
use crate::error::{NotifierError, Result};
use crate::events::{HostEvent, WindowId, WindowSnapshot};
use crate::services::host::mirror::{MirrorWindowHost, WindowMirror};
use crate::services::host::r#trait::{HostBackendTrait, HostEventSender, WindowHost};
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use zbus::zvariant::OwnedObjectPath;
use zbus::Connection;

const HOOK_OBJECT_PATH: &str = "/WindowHook";
const HOOK_INTERFACE: &str = "org.ahkwayland.WindowHook";

const KWIN_BUS_NAME: &str = "org.kde.KWin";
const KWIN_SCRIPTING_PATH: &str = "/Scripting";
const KWIN_SCRIPTING_INTERFACE: &str = "org.kde.kwin.Scripting";

/// Объект, в который сгенерированный KWin-скрипт шлёт обратные вызовы.
///
/// Каждый вызов сначала приводит зеркало в актуальное состояние и только
/// потом кладёт событие в очередь наблюдателя: когда наблюдатель возьмётся
/// за событие, запросы уже отражают его.
struct WindowHook {
    mirror: Arc<RwLock<WindowMirror>>,
    events: HostEventSender,
    ready: Mutex<Option<oneshot::Sender<()>>>,
}

#[zbus::interface(name = "org.ahkwayland.WindowHook")]
impl WindowHook {
    /// Окно, существовавшее до загрузки скрипта: только зеркало, без событий
    async fn existing(&self, id: String, class: String, title: String, active: bool) {
        if id.is_empty() {
            return;
        }
        let wid = WindowId::new(id);
        let mut mirror = self.mirror.write();
        mirror.insert(wid.clone(), WindowSnapshot::new(class, title));
        if active {
            mirror.set_active(Some(wid));
        }
    }

    async fn activated(&self, id: String) {
        {
            let mut mirror = self.mirror.write();
            mirror.set_active(if id.is_empty() {
                None
            } else {
                Some(WindowId::new(id))
            });
        }
        self.events.notify(HostEvent::ActiveChanged);
    }

    async fn added(&self, id: String, class: String, title: String) {
        if id.is_empty() {
            return;
        }
        let wid = WindowId::new(id);
        self.mirror
            .write()
            .insert(wid.clone(), WindowSnapshot::new(class, title));
        self.events.notify(HostEvent::Added(wid));
    }

    async fn removed(&self, id: String) {
        if id.is_empty() {
            return;
        }
        let wid = WindowId::new(id);
        self.mirror.write().remove(&wid);
        self.events.notify(HostEvent::Removed(wid));
    }

    async fn title_changed(&self, id: String, title: String) {
        if id.is_empty() {
            return;
        }
        let wid = WindowId::new(id);
        if !self.mirror.write().set_title(&wid, title) {
            return; // окно зеркалу неизвестно
        }
        self.events.notify(HostEvent::TitleChanged(wid));
    }

    /// Скрипт отчитался стартовым списком окон
    async fn ready(&self) {
        if let Some(tx) = self.ready.lock().take() {
            let _ = tx.send(());
        }
    }
}

pub struct KwinHost {
    config: Arc<Config>,
    mirror: Arc<RwLock<WindowMirror>>,
    events: HostEventSender,
    is_kde6: bool,
}

impl KwinHost {
    pub fn create(
        config: Arc<Config>,
        events: HostEventSender,
    ) -> Result<(Arc<dyn WindowHost>, Self)> {
        if config.host.backend.as_str() == "auto" && !looks_like_kde() {
            return Err(NotifierError::ServiceUnavailable(
                "KWin не обнаружен; поддерживается только KDE".to_string(),
            ));
        }

        let is_kde6 = std::env::var("KDE_SESSION_VERSION")
            .map(|v| v == "6")
            .unwrap_or(false);
        info!(
            "Инициализация KWin-моста (KWin {})",
            if is_kde6 { 6 } else { 5 }
        );

        let mirror = Arc::new(RwLock::new(WindowMirror::default()));
        let host: Arc<dyn WindowHost> = Arc::new(MirrorWindowHost::new(mirror.clone()));

        Ok((
            host,
            Self {
                config,
                mirror,
                events,
                is_kde6,
            },
        ))
    }

    pub async fn run(self) -> Result<()> {
        let connection = Connection::session().await?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let hook = WindowHook {
            mirror: self.mirror.clone(),
            events: self.events.clone(),
            ready: Mutex::new(Some(ready_tx)),
        };
        connection.object_server().at(HOOK_OBJECT_PATH, hook).await?;
        connection
            .request_name(self.config.host.bus_name.as_str())
            .await?;

        let script = build_hook_script(self.is_kde6, &self.config.host.bus_name);
        let script_path = hook_script_path();
        std::fs::write(&script_path, script)?;
        let _script_file = ScriptFileGuard {
            path: script_path.clone(),
        };

        let script_object = self.load_script(&connection, &script_path).await?;
        let script_interface = if self.is_kde6 {
            "org.kde.kwin.Script"
        } else {
            KWIN_SCRIPTING_INTERFACE
        };

        connection
            .call_method(
                Some(KWIN_BUS_NAME),
                script_object,
                Some(script_interface),
                "run",
                &(),
            )
            .await?;

        let ready_timeout = Duration::from_millis(self.config.host.ready_timeout_ms);
        match tokio::time::timeout(ready_timeout, ready_rx).await {
            Ok(Ok(())) => info!("KWin-скрипт загружен, стартовый список окон получен"),
            _ => warn!(
                "KWin-скрипт не отчитался за {:?}; продолжаем без стартового списка",
                ready_timeout
            ),
        }

        // Список окон заполнен (или ждать его дальше бессмысленно):
        // наблюдатель может сообщить стартовое активное окно
        self.events.notify_initial();

        info!("KWin-мост слушает события окон");

        // Дальше вся работа идёт обратными вызовами в WindowHook;
        // задача лишь удерживает соединение до остановки сервиса
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn load_script(&self, connection: &Connection, script_path: &PathBuf) -> Result<OwnedObjectPath> {
        let path_arg = script_path.to_string_lossy().to_string();

        // KWin может ещё подниматься: пробуем несколько раз
        let mut scripting_alive = false;
        for _ in 0..5 {
            let result = connection
                .call_method(
                    Some(KWIN_BUS_NAME),
                    KWIN_SCRIPTING_PATH,
                    Some(KWIN_SCRIPTING_INTERFACE),
                    "loadScript",
                    &(path_arg.as_str(),),
                )
                .await;

            if result.is_ok() {
                scripting_alive = true;
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        if !scripting_alive {
            return Err(NotifierError::ServiceUnavailable(
                "KWin Scripting не отвечает на сессионной шине".to_string(),
            ));
        }

        // Снимаем копию скрипта, оставшуюся от прошлого запуска, и грузим заново
        let _ = connection
            .call_method(
                Some(KWIN_BUS_NAME),
                KWIN_SCRIPTING_PATH,
                Some(KWIN_SCRIPTING_INTERFACE),
                "unloadScript",
                &(path_arg.as_str(),),
            )
            .await;

        let reply = connection
            .call_method(
                Some(KWIN_BUS_NAME),
                KWIN_SCRIPTING_PATH,
                Some(KWIN_SCRIPTING_INTERFACE),
                "loadScript",
                &(path_arg.as_str(),),
            )
            .await?;

        let script_num: i32 = reply
            .body()
            .deserialize()
            .map_err(|e| NotifierError::Internal(format!("Ответ loadScript не разобран: {}", e)))?;
        debug!("KWin-скрипт загружен под номером {}", script_num);

        let object_path = if self.is_kde6 {
            format!("/Scripting/Script{}", script_num)
        } else {
            format!("/{}", script_num)
        };
        object_path
            .as_str()
            .try_into()
            .map_err(|e| NotifierError::Internal(format!("Некорректный путь скрипта: {}", e)))
    }
}

#[async_trait::async_trait]
impl HostBackendTrait for KwinHost {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run().await
    }
}

impl Drop for KwinHost {
    fn drop(&mut self) {
        info!("KWin-мост завершает работу");
    }
}

struct ScriptFileGuard {
    path: PathBuf,
}

impl Drop for ScriptFileGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn hook_script_path() -> PathBuf {
    let user = std::env::var("USER").unwrap_or_else(|_| "default".to_string());
    std::env::temp_dir().join(format!("ahk-wayland-notifier-kwin-{}.js", user))
}

fn looks_like_kde() -> bool {
    if let Ok(desktop) = std::env::var("XDG_CURRENT_DESKTOP") {
        if desktop.to_lowercase().contains("kde") {
            return true;
        }
    }

    if std::env::var("KDE_SESSION_VERSION").is_ok() {
        return true;
    }

    if let Ok(output) = Command::new("pgrep").arg("-f").arg("kwin").output() {
        if !output.stdout.is_empty() {
            return true;
        }
    }

    false
}

/// Скрипт, который KWin исполняет у себя: пересылает события окон обратными
/// вызовами в WindowHook и на старте отчитывается существующими окнами
fn build_hook_script(is_kde6: bool, bus_name: &str) -> String {
    let (added, removed, activated, active_prop, list_fn) = if is_kde6 {
        (
            "windowAdded",
            "windowRemoved",
            "windowActivated",
            "activeWindow",
            "windowList",
        )
    } else {
        (
            "clientAdded",
            "clientRemoved",
            "clientActivated",
            "activeClient",
            "clientList",
        )
    };

    format!(
        r#"var service = "{bus}";
var path = "{path}";
var iface = "{iface}";

function wid(client) {{
  return client && client.internalId ? String(client.internalId) : "";
}}

function hookTitle(client) {{
  client.captionChanged.connect(function () {{
    callDBus(service, path, iface, "TitleChanged", wid(client), client.caption || "");
  }});
}}

workspace.{added}.connect(function (client) {{
  if (!client) {{ return; }}
  hookTitle(client);
  callDBus(service, path, iface, "Added", wid(client), client.resourceClass || "", client.caption || "");
}});

workspace.{removed}.connect(function (client) {{
  if (!client) {{ return; }}
  callDBus(service, path, iface, "Removed", wid(client));
}});

workspace.{activated}.connect(function (client) {{
  callDBus(service, path, iface, "Activated", wid(client));
}});

var clients = workspace.{list_fn}();
var active = workspace.{active_prop};
for (var i = 0; i < clients.length; ++i) {{
  var client = clients[i];
  if (!client) {{ continue; }}
  hookTitle(client);
  callDBus(service, path, iface, "Existing", wid(client), client.resourceClass || "", client.caption || "",
           active ? wid(active) === wid(client) : false);
}}
callDBus(service, path, iface, "Ready");
"#,
        bus = bus_name,
        path = HOOK_OBJECT_PATH,
        iface = HOOK_INTERFACE,
        added = added,
        removed = removed,
        activated = activated,
        active_prop = active_prop,
        list_fn = list_fn,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::watcher::WatcherInput;
    use tokio::sync::mpsc;

    #[test]
    fn test_script_uses_kde6_api_names() {
        let script = build_hook_script(true, "org.ahkwayland.Notifier");
        assert!(script.contains("workspace.windowAdded.connect"));
        assert!(script.contains("workspace.windowRemoved.connect"));
        assert!(script.contains("workspace.windowActivated.connect"));
        assert!(script.contains("workspace.windowList()"));
        assert!(script.contains("workspace.activeWindow"));
        assert!(script.contains("\"org.ahkwayland.Notifier\""));
    }

    #[test]
    fn test_script_uses_kde5_api_names() {
        let script = build_hook_script(false, "org.ahkwayland.Notifier");
        assert!(script.contains("workspace.clientAdded.connect"));
        assert!(script.contains("workspace.clientRemoved.connect"));
        assert!(script.contains("workspace.clientActivated.connect"));
        assert!(script.contains("workspace.clientList()"));
        assert!(script.contains("workspace.activeClient"));
    }

    #[test]
    fn test_script_reports_all_hook_members() {
        let script = build_hook_script(true, "org.ahkwayland.Notifier");
        for member in ["Existing", "Activated", "Added", "Removed", "TitleChanged", "Ready"] {
            assert!(script.contains(member), "в скрипте нет вызова {}", member);
        }
    }

    fn hook_setup() -> (
        WindowHook,
        Arc<RwLock<WindowMirror>>,
        mpsc::UnboundedReceiver<WatcherInput>,
        oneshot::Receiver<()>,
    ) {
        let mirror = Arc::new(RwLock::new(WindowMirror::default()));
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let hook = WindowHook {
            mirror: mirror.clone(),
            events: HostEventSender::new(tx),
            ready: Mutex::new(Some(ready_tx)),
        };
        (hook, mirror, rx, ready_rx)
    }

    #[tokio::test]
    async fn test_added_updates_mirror_before_event() {
        let (hook, mirror, mut rx, _ready) = hook_setup();

        hook.added("w1".to_string(), "term".to_string(), "Term".to_string())
            .await;

        assert_eq!(
            mirror.read().get(&WindowId::new("w1")),
            Some(&WindowSnapshot::new("term", "Term"))
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            WatcherInput::Host(HostEvent::Added(WindowId::new("w1")))
        );
    }

    #[tokio::test]
    async fn test_removed_drops_mirror_entry() {
        let (hook, mirror, mut rx, _ready) = hook_setup();

        hook.added("w1".to_string(), "term".to_string(), "Term".to_string())
            .await;
        hook.activated("w1".to_string()).await;
        hook.removed("w1".to_string()).await;

        assert!(mirror.read().get(&WindowId::new("w1")).is_none());
        assert!(mirror.read().active().is_none());

        let _ = rx.try_recv(); // Added
        let _ = rx.try_recv(); // ActiveChanged
        assert_eq!(
            rx.try_recv().unwrap(),
            WatcherInput::Host(HostEvent::Removed(WindowId::new("w1")))
        );
    }

    #[tokio::test]
    async fn test_title_change_for_unknown_window_is_dropped() {
        let (hook, _mirror, mut rx, _ready) = hook_setup();

        hook.title_changed("ghost".to_string(), "Boo".to_string()).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_existing_fills_mirror_silently() {
        let (hook, mirror, mut rx, _ready) = hook_setup();

        hook.existing(
            "w1".to_string(),
            "editor".to_string(),
            "a.txt".to_string(),
            true,
        )
        .await;

        assert_eq!(mirror.read().active(), Some(&WindowId::new("w1")));
        assert!(rx.try_recv().is_err(), "существующие окна не порождают событий");
    }

    #[tokio::test]
    async fn test_ready_fires_once() {
        let (hook, _mirror, _rx, ready_rx) = hook_setup();

        hook.ready().await;
        hook.ready().await; // повторный вызов безвреден
        assert!(ready_rx.await.is_ok());
    }

    #[test]
    fn test_hook_script_path_is_per_user() {
        let path = hook_script_path();
        assert!(path.to_string_lossy().contains("ahk-wayland-notifier-kwin-"));
        assert!(path.to_string_lossy().ends_with(".js"));
    }
}
