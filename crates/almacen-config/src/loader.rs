use std::path::{Path, PathBuf};

use almacen_common::{Error, Result};

use crate::model::AppConfig;

/// Loads `AppConfig` from disk.
///
/// An explicitly supplied path must exist and parse. The default path is
/// optional: if nothing is there, built-in defaults apply.
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        match path {
            Some(p) => Self::read_file(p),
            None => {
                let default = Self::default_path();
                if default.is_file() {
                    Self::read_file(&default)
                } else {
                    Ok(AppConfig::default())
                }
            }
        }
    }

    /// `~/.almacen/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".almacen")
            .join("config.toml")
    }

    fn read_file(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
data_dir = "/tmp/almacen-test"

[database]
filename = "tienda.db"

[logging]
level = "debug"
json = true
"#
        )
        .unwrap();

        let config = ConfigLoader::load(Some(file.path())).unwrap();
        assert_eq!(config.database.filename, "tienda.db");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/almacen-test/tienda.db")
        );
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"").unwrap();

        let config = ConfigLoader::load(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.database.filename, "inventario.db");
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let result = ConfigLoader::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database\nfilename = ").unwrap();

        let result = ConfigLoader::load(Some(file.path()));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
