//! Path resolution: `CEREBRIC_CONFIG_DIR` / `CEREBRIC_LOG_DIR` /
//! `CEREBRIC_DATA_DIR` override the XDG defaults resolved via `directories`.

use std::path::PathBuf;

const APP_NAME: &str = "cerebric";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

pub fn config_dir() -> PathBuf {
    std::env::var("CEREBRIC_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            project_dirs()
                .map(|dirs| dirs.config_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".cerebric/config"))
        })
}

pub fn log_dir() -> PathBuf {
    std::env::var("CEREBRIC_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            project_dirs()
                .map(|dirs| dirs.cache_dir().join("logs"))
                .unwrap_or_else(|| PathBuf::from(".cerebric/logs"))
        })
}

pub fn data_dir() -> PathBuf {
    std::env::var("CEREBRIC_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            project_dirs()
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".cerebric/data"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_config_dir_env_override() {
        std::env::set_var("CEREBRIC_CONFIG_DIR", "/tmp/cerebric-test-config");
        assert_eq!(config_dir(), PathBuf::from("/tmp/cerebric-test-config"));
        std::env::remove_var("CEREBRIC_CONFIG_DIR");
    }

    #[test]
    #[serial]
    fn test_data_dir_env_override() {
        std::env::set_var("CEREBRIC_DATA_DIR", "/tmp/cerebric-test-data");
        assert_eq!(data_dir(), PathBuf::from("/tmp/cerebric-test-data"));
        std::env::remove_var("CEREBRIC_DATA_DIR");
    }

    #[test]
    #[serial]
    fn test_log_dir_falls_back_without_env() {
        std::env::remove_var("CEREBRIC_LOG_DIR");
        // Just assert it resolves to something non-empty; exact path is
        // platform-dependent via `directories`.
        assert!(!log_dir().as_os_str().is_empty());
    }
}
