use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub notify: NotifyConfig,
    pub host: HostConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            filter: "ahk_wayland_notifier=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Ёмкость внутреннего broadcast-канала сигналов
    pub queue_size: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { queue_size: 64 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// "auto" или "kwin"
    pub backend: String,
    /// Имя сервиса на сессионной шине, на которое KWin-скрипт шлёт обратные вызовы
    pub bus_name: String,
    /// Сколько ждать, пока скрипт отчитается о стартовом списке окон
    pub ready_timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            backend: "auto".to_string(),
            bus_name: "org.ahkwayland.Notifier".to_string(),
            ready_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Число быстрых попыток перечитать заголовок после активации
    pub fast_attempts: u32,
    /// Задержка первой попытки; каждая следующая вдвое длиннее
    pub fast_delay_ms: u64,
    /// Интервал медленного опроса после исчерпания быстрых попыток
    pub slow_poll_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            fast_attempts: 3,
            fast_delay_ms: 50,
            slow_poll_interval_ms: 500,
        }
    }
}

impl RetryConfig {
    pub fn fast_delay(&self) -> Duration {
        Duration::from_millis(self.fast_delay_ms)
    }

    pub fn slow_poll_interval(&self) -> Duration {
        Duration::from_millis(self.slow_poll_interval_ms)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("AWN_"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация канала уведомлений
        if self.notify.queue_size == 0 {
            anyhow::bail!("notify.queue_size должно быть больше 0");
        }

        // Валидация хост-бэкенда
        match self.host.backend.as_str() {
            "auto" | "kwin" => {}
            _ => anyhow::bail!("Неизвестный хост-бэкенд: {}", self.host.backend),
        }

        if !self.host.bus_name.contains('.') {
            anyhow::bail!("host.bus_name не похоже на имя D-Bus сервиса: {}", self.host.bus_name);
        }

        // Валидация таймингов повторных попыток
        if self.retry.fast_attempts == 0 {
            anyhow::bail!("retry.fast_attempts должно быть больше 0");
        }

        if self.retry.fast_delay_ms == 0 {
            anyhow::bail!("retry.fast_delay_ms должно быть больше 0");
        }

        if self.retry.slow_poll_interval_ms == 0 {
            anyhow::bail!("retry.slow_poll_interval_ms должно быть больше 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retry_timings_rejected() {
        let mut config = Config::default();
        config.retry.fast_delay_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.slow_poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.fast_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let mut config = Config::default();
        config.host.backend = "gnome".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_durations() {
        let retry = RetryConfig::default();
        assert_eq!(retry.fast_delay(), Duration::from_millis(50));
        assert_eq!(retry.slow_poll_interval(), Duration::from_millis(500));
    }
}
