//! Tests for configuration module.

use super::*;

#[test_log::test]
fn test_defaults_from_empty_document() {
    tracing::debug!("Loading settings from an empty document");

    let settings = Settings::from_toml_str("").expect("defaults should load");
    assert_eq!(settings.expansion.for_each_limit, DEFAULT_FOR_EACH_LIMIT);
    assert_eq!(settings.logging.level, DEFAULT_LOG_LEVEL);
}

#[test]
fn test_toml_overrides_limit() {
    let settings = Settings::from_toml_str(
        r#"
        [expansion]
        for_each_limit = 25

        [logging]
        level = "info"
        "#,
    )
    .expect("settings should load");

    assert_eq!(settings.expansion.for_each_limit, 25);
    assert_eq!(settings.logging.level, "info");
}

#[test]
fn test_zero_limit_is_rejected() {
    let result = Settings::from_toml_str(
        r"
        [expansion]
        for_each_limit = 0
        ",
    );
    assert!(result.is_err());
}

#[test]
fn test_blank_log_level_is_rejected() {
    let settings = Settings {
        expansion: ExpansionConfig::default(),
        logging: LoggingConfig {
            level: "  ".to_string(),
        },
    };

    assert!(matches!(
        settings.validate(),
        Err(CoreError::ConfigError(_))
    ));
}

#[test]
fn test_expansion_config_default() {
    let config = ExpansionConfig::default();
    let copied = config;
    assert_eq!(copied.for_each_limit, DEFAULT_FOR_EACH_LIMIT);
    assert!(format!("{config:?}").contains("ExpansionConfig"));
}
