use std::sync::Arc;
use taskboard_core::db::migrations::{current_user_version, latest_version};
use taskboard_core::{AppConfig, AppContext, ConfigError, LocalIdentityProvider};

#[test]
fn load_reads_validates_and_opens_a_persistent_store() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("taskboard.db");
    let config_path = dir.path().join("taskboard.json");
    std::fs::write(
        &config_path,
        serde_json::json!({
            "backend": {
                "apiKey": "AIza-test",
                "authDomain": "todo.example.com",
                "projectId": "todo-app",
                "storageBucket": "todo-app.appspot.com",
                "messagingSenderId": "1234",
                "appId": "1:1234:web:abcd"
            },
            "database_path": db_path,
            "log_level": "warn"
        })
        .to_string(),
    )
    .unwrap();

    let config = AppConfig::load(&config_path).unwrap();
    assert_eq!(config.backend.auth_domain, "todo.example.com");
    assert_eq!(config.log_level(), "warn");

    let ctx = AppContext::open(&config, Arc::new(LocalIdentityProvider::new())).unwrap();
    assert_eq!(
        current_user_version(ctx.connection()).unwrap(),
        latest_version()
    );
    assert!(db_path.exists());
}

#[test]
fn load_rejects_template_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("taskboard.json");
    std::fs::write(
        &config_path,
        r#"{"backend":{"apiKey":"k","projectId":"YOUR_PROJECT_ID"}}"#,
    )
    .unwrap();

    let err = AppConfig::load(&config_path).unwrap_err();
    assert!(matches!(err, ConfigError::PlaceholderValue("backend.projectId")));
}

#[test]
fn load_reports_missing_and_malformed_files() {
    let dir = tempfile::tempdir().unwrap();

    let missing = AppConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io(_)));

    let broken_path = dir.path().join("broken.json");
    std::fs::write(&broken_path, "{ not json").unwrap();
    let broken = AppConfig::load(&broken_path).unwrap_err();
    assert!(matches!(broken, ConfigError::Parse(_)));
}
