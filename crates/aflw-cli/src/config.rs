/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite database file name, relative to the dataset root (default: aflw.sqlite).
    pub db_file: String,
    /// Image subdirectory under the dataset root (default: flickr).
    pub image_dir: String,
    /// Side file listing image paths that could not be resolved.
    pub not_found_file: String,
    /// Statistics sidecar written by `stats` unless `--output` is given.
    pub stats_file: String,
}

impl Config {
    /// Load configuration from `AFLW_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        Self {
            db_file: var("AFLW_DB_FILE", "aflw.sqlite"),
            image_dir: var("AFLW_IMAGE_DIR", "flickr"),
            not_found_file: var("AFLW_NOT_FOUND_FILE", "not_found_images_aflw.txt"),
            stats_file: var("AFLW_STATS_FILE", "aflw_statistics.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.db_file, "aflw.sqlite");
        assert_eq!(config.image_dir, "flickr");
        assert_eq!(config.not_found_file, "not_found_images_aflw.txt");
        assert_eq!(config.stats_file, "aflw_statistics.json");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [("AFLW_IMAGE_DIR", "images"), ("AFLW_DB_FILE", "faces.db")]
            .into_iter()
            .collect();
        let config = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.image_dir, "images");
        assert_eq!(config.db_file, "faces.db");
        assert_eq!(config.stats_file, "aflw_statistics.json");
    }
}
