#[cfg(test)]
mod tests {
    use serial_test::serial;

    use crate::config::{
        AppConfig, BootstrapAdmin, DEFAULT_DATABASE_URL, MAX_SESSION_TTL_HOURS,
    };
    use crate::env::env_files;

    const VARS: [&str; 8] = [
        "DATABASE_URL",
        "SESSION_TTL_HOURS",
        "SESSION_CLEANUP_INTERVAL_SECS",
        "OTEL_EXPORTER_OTLP_ENDPOINT",
        "HONEYCOMB_API_KEY",
        "BOOTSTRAP_ADMIN_EMAIL",
        "BOOTSTRAP_ADMIN_PASSWORD",
        "BOOTSTRAP_ADMIN_NAME",
    ];

    /// Every config variable unset, then `set` applied on top.
    fn with_env<F: FnOnce()>(set: &[(&str, &str)], f: F) {
        let vars: Vec<(&str, Option<&str>)> = VARS
            .iter()
            .map(|name| {
                let value = set.iter().find(|(k, _)| k == name).map(|(_, v)| *v);
                (*name, value)
            })
            .collect();

        temp_env::with_vars(vars, f);
    }

    #[test]
    #[serial]
    fn test_defaults() {
        with_env(&[], || {
            let config = AppConfig::from_env().unwrap();
            assert_eq!(config, AppConfig::default());
            assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
            assert_eq!(config.session_ttl_hours, 12);
            assert_eq!(config.session_cleanup_interval_secs, 3600);
            assert!(config.bootstrap_admin.is_none());
        });
    }

    #[test]
    #[serial]
    fn test_overrides() {
        with_env(
            &[
                ("DATABASE_URL", "sqlite::memory:"),
                ("SESSION_TTL_HOURS", "24"),
                ("SESSION_CLEANUP_INTERVAL_SECS", "60"),
                ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
                ("BOOTSTRAP_ADMIN_EMAIL", "head@school.test"),
                ("BOOTSTRAP_ADMIN_PASSWORD", "changeme123"),
            ],
            || {
                let config = AppConfig::from_env().unwrap();
                assert_eq!(config.database_url, "sqlite::memory:");
                assert_eq!(config.session_ttl_hours, 24);
                assert_eq!(config.session_cleanup_interval_secs, 60);
                assert_eq!(config.otlp_endpoint.as_deref(), Some("http://localhost:4317"));
                assert_eq!(config.honeycomb_api_key, None);
                assert_eq!(
                    config.bootstrap_admin,
                    Some(BootstrapAdmin {
                        email: "head@school.test".to_string(),
                        password: "changeme123".to_string(),
                        name: "Administrator".to_string(),
                    })
                );
            },
        );
    }

    #[test]
    #[serial]
    fn test_invalid_numbers_rejected() {
        with_env(&[("SESSION_TTL_HOURS", "twelve")], || {
            let err = AppConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("SESSION_TTL_HOURS"));
        });

        with_env(&[("SESSION_CLEANUP_INTERVAL_SECS", "0")], || {
            assert!(AppConfig::from_env().is_err());
        });

        with_env(&[("SESSION_TTL_HOURS", "-3")], || {
            assert!(AppConfig::from_env().is_err());
        });

        with_env(&[("SESSION_TTL_HOURS", "9223372036854775807")], || {
            let err = AppConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("must be at most"));
        });

        with_env(&[("SESSION_CLEANUP_INTERVAL_SECS", "18446744073709551615")], || {
            assert!(AppConfig::from_env().is_err());
        });

        let max = MAX_SESSION_TTL_HOURS.to_string();
        with_env(&[("SESSION_TTL_HOURS", max.as_str())], || {
            let config = AppConfig::from_env().unwrap();
            assert_eq!(config.session_ttl_hours, MAX_SESSION_TTL_HOURS);
        });
    }

    #[test]
    #[serial]
    fn test_bootstrap_email_without_password_rejected() {
        with_env(&[("BOOTSTRAP_ADMIN_EMAIL", "head@school.test")], || {
            assert!(AppConfig::from_env().is_err());
        });
    }

    #[test]
    #[serial]
    fn test_blank_values_fall_back_to_defaults() {
        with_env(&[("DATABASE_URL", "  "), ("SESSION_TTL_HOURS", "")], || {
            let config = AppConfig::from_env().unwrap();
            assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
            assert_eq!(config.session_ttl_hours, 12);
        });
    }

    #[test]
    fn test_env_file_order() {
        assert_eq!(
            env_files("production"),
            ["config/common.env", "config/prod.env", ".secrets.env"]
        );
        assert_eq!(
            env_files("development"),
            ["config/common.env", "config/dev.env", ".secrets.env"]
        );
    }
}
