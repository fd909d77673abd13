#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::error::{ErrorKind, Result};
    use crate::journal::StreamOptions;
    use std::time::Duration;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.recent_log_lines, 100);
        assert_eq!(config.backfill_entries, 100);
        assert_eq!(config.write_deadline_secs, 10);
        assert_eq!(config.follow_poll_millis, 1000);
        assert_eq!(config.journal_backend, JournalBackend::Journalctl);
        assert_eq!(config.journalctl_path, std::path::PathBuf::from("journalctl"));
        assert_eq!(
            config.tunnel_config_path,
            std::path::PathBuf::from("/etc/cloudflared/config.yml")
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = Config {
            recent_log_lines: 20,
            journal_backend: JournalBackend::SdJournal,
            ..Config::default()
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("sd-journal"));
        assert!(yaml.contains("recent_log_lines: 20"));

        let deserialized: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let config: Config = serde_yaml::from_str("backfill_entries: 25\n").unwrap();
        assert_eq!(config.backfill_entries, 25);
        assert_eq!(config.write_deadline_secs, 10);
        assert_eq!(config.journal_backend, JournalBackend::Journalctl);
    }

    #[test]
    fn test_config_default_path() {
        let path = Config::default_path();
        assert!(path.is_ok());

        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("tunnelkeeper"));
        assert!(path.to_string_lossy().ends_with("config.yaml"));
    }

    #[test]
    fn test_config_load_missing() -> Result<()> {
        let config = Config::load(Some("/nonexistent/config.yaml".into()))?;
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn test_config_load_from_file() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            "follow_poll_millis: 250\njournalctl_path: /usr/local/bin/journalctl\n",
        )?;

        let loaded_config = Config::load(Some(config_path))?;

        assert_eq!(loaded_config.follow_poll_millis, 250);
        assert_eq!(
            loaded_config.journalctl_path,
            std::path::PathBuf::from("/usr/local/bin/journalctl")
        );
        assert_eq!(loaded_config.backfill_entries, 100);
        Ok(())
    }

    #[test]
    fn test_config_load_rejects_bad_yaml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "journal_backend: carrier-pigeon\n").unwrap();

        let err = Config::load(Some(config_path)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_config_load_rejects_zero_deadline() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "write_deadline_secs: 0\n").unwrap();

        let err = Config::load(Some(config_path)).unwrap_err();
        assert!(err.to_string().contains("write_deadline_secs"));
    }

    #[test]
    fn test_stream_options_from_config() {
        let config = Config {
            backfill_entries: 10,
            write_deadline_secs: 3,
            follow_poll_millis: 250,
            ..Config::default()
        };

        let options = StreamOptions::from(&config);
        assert_eq!(options.backfill, 10);
        assert_eq!(options.write_deadline, Duration::from_secs(3));
        assert_eq!(options.poll_interval, Duration::from_millis(250));
    }
}
