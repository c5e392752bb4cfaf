//! Tests for config loading from files and the environment

use cliprelay::config::Config;
use serial_test::serial;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

const ENV_VARS: &[&str] = &[
    "TWITCH_CLIENT_ID",
    "TWITCH_CLIENT_SECRET",
    "SOCIAL_ACCESS_TOKEN",
    "CLIPRELAY_ROOT",
    "CLIPRELAY_HTTP_TIMEOUT",
    "CLIPRELAY_LOG_LEVEL",
    "CLIPRELAY_LOG_FORMAT",
    "CLIPRELAY_SOURCES",
];

fn clear_env() {
    for var in ENV_VARS {
        std::env::remove_var(var);
    }
}

#[test]
fn test_config_file_exists() {
    let config_path = Path::new("config.toml");
    assert!(
        config_path.exists(),
        "config.toml should exist in project root"
    );
}

#[test]
#[serial]
fn test_sample_config_is_valid() {
    clear_env();
    let config = Config::load(Path::new("config.toml")).expect("sample config should load");
    assert!(!config.sources.is_empty());
    assert!(config.storage.shared_ledger);
}

#[test]
#[serial]
fn test_env_overrides_file() {
    clear_env();
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[http]
timeout_secs = 30

[upstream]
client_id = "from-file"

[[sources]]
name = "xqc"
"#
    )
    .unwrap();

    std::env::set_var("TWITCH_CLIENT_ID", "from-env");
    std::env::set_var("TWITCH_CLIENT_SECRET", "secret");
    std::env::set_var("CLIPRELAY_HTTP_TIMEOUT", "90");
    std::env::set_var("CLIPRELAY_ROOT", "/var/lib/cliprelay");

    let config = Config::load(file.path()).unwrap();
    clear_env();

    assert_eq!(config.upstream.client_id, "from-env");
    assert_eq!(config.upstream.client_secret, "secret");
    assert_eq!(config.http.timeout_secs, 90);
    assert_eq!(config.storage.root, Path::new("/var/lib/cliprelay"));
    assert_eq!(config.missing_credentials(), vec!["SOCIAL_ACCESS_TOKEN"]);
}

#[test]
#[serial]
fn test_sources_from_env() {
    clear_env();
    std::env::set_var("CLIPRELAY_SOURCES", "xqc, shroud,,xqc");

    let config = Config::from_env().unwrap();
    clear_env();

    let names: Vec<_> = config.sources.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["xqc", "shroud"]);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_bad_timeout_env_is_rejected() {
    clear_env();
    std::env::set_var("CLIPRELAY_HTTP_TIMEOUT", "soon");

    let result = Config::from_env();
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_missing_file_uses_env_sources() {
    clear_env();
    std::env::set_var("CLIPRELAY_SOURCES", "xqc");

    let config = Config::load(Path::new("/nonexistent/cliprelay.toml")).unwrap();
    clear_env();

    assert_eq!(config.sources.len(), 1);
    assert_eq!(config.sources[0].max_candidates, 1);
}
