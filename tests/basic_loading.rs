//! Integration tests for basic configuration loading.

#![allow(unsafe_code)] // For env var manipulation in tests

use livecfg::prelude::*;
use livecfg::sources::EnvOverlay;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn builder(config_path: &Path) -> ConfigProviderBuilder {
    ConfigProvider::builder()
        .with_app_name("basic")
        .with_config_file(config_path)
        .with_env(EnvOverlay::disabled())
        .with_file_watch(false)
}

#[test]
fn test_default_before_file() {
    let temp_dir = TempDir::new().unwrap();
    let provider = builder(&temp_dir.path().join("missing.toml")).build();

    let timeout = Arc::new(ConfigItem::new("timeout", Duration::from_secs(30), "request timeout"));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    provider.register_config(
        timeout.clone(),
        [notifier(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })],
    );

    provider.init(&StopFlag::new()).unwrap();

    assert_eq!(provider.state(), LifecycleState::Ready);
    assert_eq!(provider.get_duration("timeout").unwrap(), Duration::from_secs(30));
    assert_eq!(*timeout.get(), Duration::from_secs(30));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(!provider.is_watching());
}

#[test]
fn test_file_overrides_default() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(
        temp_dir.path(),
        "app.toml",
        r#"
timeout = "5s"

[server]
host = "0.0.0.0"
port = 9090
"#,
    );
    let provider = builder(&config_path).build();

    let timeout = Arc::new(ConfigItem::new("timeout", Duration::from_secs(30), "request timeout"));
    let port = Arc::new(ConfigItem::new("server.port", 8080u16, "listen port"));
    provider.register_config(timeout.clone(), []);
    provider.register_config(port.clone(), []);

    provider.init(&StopFlag::new()).unwrap();

    assert_eq!(*timeout.get(), Duration::from_secs(5));
    assert_eq!(*port.get(), 9090);
    assert_eq!(provider.get_string("server.host").unwrap(), "0.0.0.0");
}

#[test]
fn test_yaml_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(
        temp_dir.path(),
        "app.yaml",
        r#"
server:
  port: 8080
  tags: [edge, canary]
"#,
    );
    let provider = builder(&config_path).build();
    provider.init(&StopFlag::new()).unwrap();

    assert_eq!(provider.get_uint16("server.port").unwrap(), 8080);
    assert_eq!(
        provider.get_string_slice("server.tags").unwrap(),
        vec!["edge", "canary"]
    );
}

#[test]
fn test_env_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), "app.toml", "[server]\nport = 9090\n");
    let provider = builder(&config_path)
        .with_env(EnvOverlay::from_vars([("SERVER_PORT", "7070")]))
        .build();
    let port = Arc::new(ConfigItem::new("server.port", 8080u16, "listen port"));
    provider.register_config(port.clone(), []);

    provider.init(&StopFlag::new()).unwrap();

    assert_eq!(*port.get(), 7070);
}

#[test]
fn test_process_env_with_prefix() {
    unsafe {
        std::env::set_var("LIVECFG_BASIC_DATABASE_POOL", "24");
    }

    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), "app.toml", "[database]\npool = 4\n");
    let provider = ConfigProvider::builder()
        .with_app_name("basic")
        .with_config_file(&config_path)
        .with_env_prefix("LIVECFG_BASIC")
        .with_file_watch(false)
        .build();
    provider.init(&StopFlag::new()).unwrap();

    assert_eq!(provider.get_uint32("database.pool").unwrap(), 24);

    unsafe {
        std::env::remove_var("LIVECFG_BASIC_DATABASE_POOL");
    }
}

#[test]
fn test_override_beats_env() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), "app.toml", "level = \"info\"\n");
    let provider = builder(&config_path)
        .with_env(EnvOverlay::from_vars([("LEVEL", "warn")]))
        .with_override("level", "debug")
        .build();
    provider.init(&StopFlag::new()).unwrap();

    assert_eq!(provider.get_string("level").unwrap(), "debug");
}

#[test]
fn test_dump_mode_short_circuits() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), "app.toml", "timeout = \"5s\"\n");
    let dump_dir = TempDir::new().unwrap();
    let provider = builder(&config_path)
        .with_dump_config(true)
        .with_dump_dir(dump_dir.path())
        .build();

    let timeout = Arc::new(ConfigItem::new("timeout", Duration::from_secs(30), "request timeout"));
    provider.register_config(timeout.clone(), []);

    let stopper = StopFlag::new();
    provider.init(&stopper).unwrap();

    assert!(stopper.is_stopped());
    assert_eq!(provider.state(), LifecycleState::DumpAndExit);
    assert!(!provider.is_watching());
    // Nothing was refreshed from the file.
    assert_eq!(*timeout.get(), Duration::from_secs(30));

    let dumped = fs::read_to_string(dump_dir.path().join("dump_basic.toml")).unwrap();
    let parsed: toml::Table = toml::from_str(&dumped).unwrap();
    assert_eq!(parsed["timeout"].as_str(), Some("30s"));
    assert_eq!(parsed["dump_config"].as_bool(), Some(true));
}

#[test]
fn test_parse_error_fails_init() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), "app.toml", "timeout = = \"5s\"\n");
    let provider = builder(&config_path).build();

    let err = provider.init(&StopFlag::new()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
    assert_eq!(provider.state(), LifecycleState::Failed);
}

#[test]
fn test_strict_init_aggregates_refresh_errors() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(
        temp_dir.path(),
        "app.toml",
        "timeout = \"soon\"\nworkers = \"many\"\n",
    );
    let provider = builder(&config_path).build();
    let timeout = Arc::new(ConfigItem::new("timeout", Duration::from_secs(30), "request timeout"));
    let workers = Arc::new(ConfigItem::new("workers", 4u32, "worker threads"));
    provider.register_config(timeout.clone(), []);
    provider.register_config(workers.clone(), []);

    let err = provider.init(&StopFlag::new()).unwrap_err();
    match err {
        ConfigError::Multiple(errors) => assert_eq!(errors.len(), 2),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(provider.state(), LifecycleState::Failed);
    assert_eq!(*timeout.get(), Duration::from_secs(30));
}

#[test]
fn test_relaxed_init_discards_refresh_errors() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), "app.toml", "workers = \"many\"\n");
    let provider = builder(&config_path)
        .with_cast_policy(CastPolicy::Relaxed)
        .build();
    let workers = Arc::new(ConfigItem::new("workers", 4u32, "worker threads"));
    provider.register_config(workers.clone(), []);

    provider.init(&StopFlag::new()).unwrap();

    assert_eq!(provider.state(), LifecycleState::Ready);
    // Relaxed casts produce the zero value.
    assert_eq!(*workers.get(), 0);
}

#[test]
fn test_double_init_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let provider = builder(&temp_dir.path().join("missing.toml")).build();
    provider.init(&StopFlag::new()).unwrap();

    assert!(matches!(
        provider.init(&StopFlag::new()),
        Err(ConfigError::AlreadyInitialized)
    ));
}

#[test]
fn test_all_settings_resolves_layers() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = write_config(temp_dir.path(), "app.toml", "[server]\nport = 9090\n");
    let provider = builder(&config_path)
        .with_override("server.host", "example.org")
        .build();
    provider.set_default("server.port", "listen port", 8080i64);
    provider.init(&StopFlag::new()).unwrap();

    let settings = provider.all_settings();
    let server = settings["server"].clone().into_table().unwrap();
    assert_eq!(server["port"].clone().into_int().unwrap(), 9090);
    assert_eq!(server["host"].clone().into_string().unwrap(), "example.org");
}
