use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod config;
mod error;
mod events;
mod services;

use config::Config;
use services::{create_host, create_notifier, FocusTitleWatcher, HostEventSender, TokioScheduler};

#[derive(Parser, Debug)]
#[command(name = "ahk-wayland-notifier")]
#[command(about = "Транслятор событий активного окна в D-Bus сигналы")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "notifier.toml")]
    config: String,

    /// Режим сухого запуска (без реальных действий)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Инициализация системы логирования
    init_tracing(&args.log_level)?;

    info!("Запуск AHK Wayland Notifier v{}", env!("CARGO_PKG_VERSION"));

    // Загрузка конфигурации
    let config = Arc::new(Config::load(&args.config)?);
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - реальные действия отключены");
    }

    // Одна очередь на все входящие наблюдателя: события хоста и таймеры
    // обрабатываются строго в порядке поступления
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let scheduler = Arc::new(TokioScheduler::new(input_tx.clone()));
    let (window_host, host_backend) = create_host(
        config.clone(),
        HostEventSender::new(input_tx),
        args.dry_run,
    )?;
    let watcher = FocusTitleWatcher::new(config.clone(), window_host, scheduler);
    let notifier = create_notifier(args.dry_run)?;
    let signal_rx = watcher.subscribe();

    info!("Все компоненты инициализированы");

    // Запуск всех сервисов параллельно
    let host_handle = tokio::spawn(async move {
        if let Err(e) = host_backend.run().await {
            error!("Ошибка в хост-бэкенде: {}", e);
        }
    });
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watcher.run(input_rx).await {
            error!("Ошибка в FocusTitleWatcher: {}", e);
        }
    });
    let notifier_handle = tokio::spawn(async move {
        if let Err(e) = notifier.run(signal_rx).await {
            error!("Ошибка в нотификаторе: {}", e);
        }
    });

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }

    info!("Завершение работы...");

    // Прерываем задачи; хост-бэкенд убирает временный KWin-скрипт в Drop
    host_handle.abort();
    watcher_handle.abort();
    notifier_handle.abort();

    // Ожидаем завершения задач (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        let _ = host_handle.await;
        let _ = watcher_handle.await;
        let _ = notifier_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("AHK Wayland Notifier завершил работу");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(())
}
