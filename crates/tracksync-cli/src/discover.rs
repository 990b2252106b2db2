use std::path::{Path, PathBuf};
use tracksync_core::config::CONFIG_FILE;

/// Resolve the config file path.
///
/// Priority:
/// 1. `--config` flag / `TRACKSYNC_CONFIG` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `tracksync.yaml`
/// 3. Fall back to `cwd/tracksync.yaml`
pub fn resolve_config(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd).unwrap_or_else(|| cwd.join(CONFIG_FILE))
}

pub fn find_upward(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
}

/// Resolve `path` against the directory holding the config file.
pub fn relative_to_config(config_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.yaml");
        assert_eq!(resolve_config(Some(&path)), path);
    }

    #[test]
    fn finds_config_in_ancestor() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "source: {}\n").unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_upward(&nested), Some(dir.path().join(CONFIG_FILE)));
    }

    #[test]
    fn directory_named_like_config_is_ignored() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(CONFIG_FILE)).unwrap();
        assert_ne!(find_upward(dir.path()), Some(dir.path().join(CONFIG_FILE)));
    }

    #[test]
    fn relative_log_dir_sits_next_to_config() {
        let config = Path::new("/srv/tracksync/tracksync.yaml");
        assert_eq!(
            relative_to_config(config, Path::new("logs")),
            PathBuf::from("/srv/tracksync/logs")
        );
        assert_eq!(
            relative_to_config(config, Path::new("/var/log/ts")),
            PathBuf::from("/var/log/ts")
        );
    }
}
