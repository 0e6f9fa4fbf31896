//! Integration tests for the relay-sync binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// A command with a scrubbed environment rooted in `dir`
fn relay_sync(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("relay-sync").unwrap();
    cmd.env_clear()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env("RUST_LOG", "info");
    cmd
}

#[test]
fn test_missing_settings_exit_with_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("synced_posts.db");

    relay_sync(&temp_dir)
        .env("DATABASE_NAME", &db_path)
        .arg("--run-once")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("MASTODON_USER_ID"))
        .stderr(predicate::str::contains("MASTODON_ACCESS_TOKEN"))
        .stderr(predicate::str::contains("TELEGRAM_BOT_TOKEN"))
        .stderr(predicate::str::contains("TELEGRAM_CHANNEL_IDS"))
        .stdout(predicate::str::contains("Missing required settings").not());

    assert!(!db_path.exists(), "ledger must not be created on config errors");
}

#[test]
fn test_invalid_cursor_exits_with_input_error() {
    let temp_dir = TempDir::new().unwrap();

    relay_sync(&temp_dir)
        .args(["--run-once", "--last-synced-post-time", "yesterday"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("YYYY-MM-DD HH:MM:SS"));
}

#[test]
fn test_zero_poll_interval_is_rejected() {
    let temp_dir = TempDir::new().unwrap();

    relay_sync(&temp_dir)
        .env("MASTODON_USER_ID", "109000000000000001")
        .env("MASTODON_ACCESS_TOKEN", "masto-token")
        .env("TELEGRAM_BOT_TOKEN", "123:ABC")
        .env("TELEGRAM_CHANNEL_IDS", "@relay")
        .env("DATABASE_NAME", temp_dir.path().join("synced_posts.db"))
        .env("POLLING_INTERVAL", "0")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("POLLING_INTERVAL"));
}

#[test]
fn test_one_shot_fetch_failure_echoes_cursor() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("ledger").join("synced_posts.db");

    relay_sync(&temp_dir)
        .env("MASTODON_USER_ID", "109000000000000001")
        .env("MASTODON_ACCESS_TOKEN", "masto-token")
        // Nothing listens on the discard port, so the fetch fails fast
        .env("MASTODON_INSTANCE_URL", "http://127.0.0.1:9")
        .env("TELEGRAM_BOT_TOKEN", "123:ABC")
        .env("TELEGRAM_CHANNEL_IDS", "@relay")
        .env("DATABASE_NAME", &db_path)
        .args(["--run-once", "--last-synced-post-time", "2025-03-01 12:00:00"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "LAST_SYNCED_POST_TIME=2025-03-01 12:00:00",
        ));

    assert!(db_path.exists());
}

#[test]
fn test_one_shot_without_cursor_prints_default() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("synced_posts.db");

    relay_sync(&temp_dir)
        .env("MASTODON_USER_ID", "109000000000000001")
        .env("MASTODON_ACCESS_TOKEN", "masto-token")
        .env("MASTODON_INSTANCE_URL", "http://127.0.0.1:9")
        .env("TELEGRAM_BOT_TOKEN", "123:ABC")
        .env("TELEGRAM_CHANNEL_IDS", "@relay")
        .env("DATABASE_NAME", &db_path)
        .arg("--run-once")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "LAST_SYNCED_POST_TIME=2000-01-01 12:00:00",
        ));
}
