//! Full integration tests covering reloads, file watching and notifications.

use livecfg::prelude::*;
use livecfg::sources::EnvOverlay;
use parking_lot::Mutex;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

fn builder(config_path: &Path) -> ConfigProviderBuilder {
    ConfigProvider::builder()
        .with_app_name("integration")
        .with_config_file(config_path)
        .with_env(EnvOverlay::disabled())
}

fn counter() -> (Notifier, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let listener = notifier(move |_| {
        counted.fetch_add(1, Ordering::SeqCst);
    });
    (listener, calls)
}

async fn wait_for(calls: &AtomicUsize, expected: usize) {
    let reached = timeout(Duration::from_secs(5), async {
        while calls.load(Ordering::SeqCst) < expected {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "listener was not called {expected} time(s)");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_file_change_reloads_value() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("app.toml");
    fs::write(&config_path, "timeout = \"5s\"\n").unwrap();

    let provider = builder(&config_path)
        .with_watch_debounce(Duration::from_millis(100))
        .build();
    let item = Arc::new(ConfigItem::new("timeout", Duration::from_secs(30), "request timeout"));
    let (listener, calls) = counter();
    provider.register_config(item.clone(), [listener]);

    provider.init(&StopFlag::new()).unwrap();
    assert!(provider.is_watching());
    assert_eq!(*item.get(), Duration::from_secs(5));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    sleep(Duration::from_millis(50)).await;
    fs::write(&config_path, "timeout = \"10s\"\n").unwrap();

    wait_for(&calls, 1).await;
    assert_eq!(provider.get_duration("timeout").unwrap(), Duration::from_secs(10));
    assert_eq!(*item.get(), Duration::from_secs(10));

    // No further reloads without further writes.
    sleep(Duration::from_millis(400)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(provider.last_reload_report().unwrap().is_clean());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_rewrite_keeps_last_known_good() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("app.toml");
    fs::write(&config_path, "timeout = \"5s\"\n").unwrap();

    let provider = builder(&config_path)
        .with_watch_debounce(Duration::from_millis(100))
        .build();
    let item = Arc::new(ConfigItem::new("timeout", Duration::from_secs(30), "request timeout"));
    let (listener, calls) = counter();
    provider.register_config(item.clone(), []);
    provider.watch_config_update([listener]);
    provider.init(&StopFlag::new()).unwrap();

    sleep(Duration::from_millis(50)).await;
    fs::write(&config_path, "timeout = = broken\n").unwrap();

    let reported = timeout(Duration::from_secs(5), async {
        while provider.last_reload_report().is_none() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(reported.is_ok());

    let report = provider.last_reload_report().unwrap();
    assert!(report.file_error.is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(*item.get(), Duration::from_secs(5));
    assert_eq!(provider.get_duration("timeout").unwrap(), Duration::from_secs(5));

    // Fixing the file resumes normal reloads.
    fs::write(&config_path, "timeout = \"7s\"\n").unwrap();
    wait_for(&calls, 1).await;
    assert_eq!(*item.get(), Duration::from_secs(7));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_not_armed_for_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let provider = builder(&temp_dir.path().join("absent.toml")).build();
    provider.init(&StopFlag::new()).unwrap();

    assert_eq!(provider.state(), LifecycleState::Ready);
    assert!(!provider.is_watching());
}

#[test]
fn test_manual_reload_order() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("app.toml");
    fs::write(&config_path, "a = 1\nb = 2\n").unwrap();

    let provider = builder(&config_path).with_file_watch(false).build();
    let log = Arc::new(Mutex::new(Vec::new()));

    for key in ["a", "b"] {
        let item = Arc::new(ConfigItem::new(key, 0i64, "counter"));
        let log = Arc::clone(&log);
        provider.register_config(
            item,
            [notifier(move |p: &ConfigProvider| {
                log.lock().push(format!("{}={}", key, p.get_int64(key).unwrap()));
            })],
        );
    }
    let global_log = Arc::clone(&log);
    provider.watch_config_update([
        notifier(move |_| global_log.lock().push("global-1".to_string())),
    ]);
    let global_log = Arc::clone(&log);
    provider.watch_config_update([
        notifier(move |_| global_log.lock().push("global-2".to_string())),
    ]);

    provider.init(&StopFlag::new()).unwrap();
    assert!(log.lock().is_empty());

    fs::write(&config_path, "a = 10\nb = 20\n").unwrap();
    let report = provider.reload();

    assert!(report.is_clean());
    assert_eq!(report.refreshed, 2);
    assert_eq!(*log.lock(), vec!["a=10", "b=20", "global-1", "global-2"]);
}

#[test]
fn test_reload_isolates_failing_value() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("app.toml");
    fs::write(&config_path, "port = 9000\nworkers = 2\n").unwrap();

    let provider = builder(&config_path).with_file_watch(false).build();
    let port = Arc::new(
        ConfigItem::new("port", 8080u16, "listen port").with_validation(|port| {
            if *port < 1024 {
                return Err(ValidationError::invalid_field("port", "must be >= 1024"));
            }
            Ok(())
        }),
    );
    let workers = Arc::new(ConfigItem::new("workers", 1u32, "worker threads"));
    let (port_listener, port_calls) = counter();
    let (workers_listener, workers_calls) = counter();
    let (global_listener, global_calls) = counter();
    provider.register_config(port.clone(), [port_listener]);
    provider.register_config(workers.clone(), [workers_listener]);
    provider.watch_config_update([global_listener]);
    provider.init(&StopFlag::new()).unwrap();
    assert_eq!(*port.get(), 9000);

    fs::write(&config_path, "port = 81\nworkers = 6\n").unwrap();
    let report = provider.reload();

    assert_eq!(report.refreshed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 0);
    assert!(matches!(
        *report.failures[0].error,
        ConfigError::ValidationError(_)
    ));
    assert_eq!(*port.get(), 9000);
    assert_eq!(*workers.get(), 6);
    assert_eq!(port_calls.load(Ordering::SeqCst), 0);
    assert_eq!(workers_calls.load(Ordering::SeqCst), 1);
    assert_eq!(global_calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.last_reload_errors().len(), 1);
}

#[test]
fn test_strict_init_reports_validation_failure() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("app.toml");
    fs::write(&config_path, "port = 80\n").unwrap();

    let provider = builder(&config_path).with_file_watch(false).build();
    let port = Arc::new(
        ConfigItem::new("port", 8080u16, "listen port")
            .with_validation(|port| match *port {
                p if p < 1024 => Err(ValidationError::custom("privileged port")),
                _ => Ok(()),
            }),
    );
    provider.register_config(port.clone(), []);

    let err = provider.init(&StopFlag::new()).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
    assert_eq!(*port.get(), 8080);
}

#[test]
fn test_registration_after_init() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("app.toml");
    fs::write(&config_path, "retries = 5\n").unwrap();

    let provider = builder(&config_path).with_file_watch(false).build();
    provider.init(&StopFlag::new()).unwrap();

    let retries = Arc::new(ConfigItem::new("retries", 3i64, "retry budget"));
    let (listener, calls) = counter();
    provider.register_config(retries.clone(), [listener]);
    assert_eq!(*retries.get(), 3);
    assert_eq!(provider.value_count(), 1);

    provider.reload();
    assert_eq!(*retries.get(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_reads_during_reloads() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("app.toml");
    fs::write(&config_path, "value = 1\n").unwrap();

    let provider = builder(&config_path).with_file_watch(false).build();
    let value = Arc::new(ConfigItem::new("value", 0i64, "shared value"));
    provider.register_config(value.clone(), []);
    provider.init(&StopFlag::new()).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let value = Arc::clone(&value);
            let provider = provider.clone();
            std::thread::spawn(move || {
                for _ in 0..1_000 {
                    let current = *value.get();
                    assert!((1..=2).contains(&current));
                    let raw = provider.get_int64("value").unwrap();
                    assert!((1..=2).contains(&raw));
                }
            })
        })
        .collect();

    fs::write(&config_path, "value = 2\n").unwrap();
    for _ in 0..10 {
        provider.reload();
    }

    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(*value.get(), 2);
}

#[test]
fn test_deleted_file_keeps_last_known_good() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("app.toml");
    fs::write(&config_path, "timeout = \"5s\"\n").unwrap();

    let provider = builder(&config_path).with_file_watch(false).build();
    let item = Arc::new(ConfigItem::new("timeout", Duration::from_secs(30), "request timeout"));
    let (scoped, scoped_calls) = counter();
    let (global, global_calls) = counter();
    provider.register_config(item.clone(), [scoped]);
    provider.watch_config_update([global]);
    provider.init(&StopFlag::new()).unwrap();

    fs::remove_file(&config_path).unwrap();
    let report = provider.reload();

    assert!(!report.is_clean());
    assert_eq!(report.refreshed, 0);
    assert!(report.file_error.as_deref().is_some_and(ConfigError::is_not_found));
    assert_eq!(*item.get(), Duration::from_secs(5));
    assert_eq!(provider.get_duration("timeout").unwrap(), Duration::from_secs(5));
    assert_eq!(scoped_calls.load(Ordering::SeqCst), 0);
    assert_eq!(global_calls.load(Ordering::SeqCst), 0);
    assert_eq!(provider.last_reload_errors().len(), 1);
}
