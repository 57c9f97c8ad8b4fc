use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("schema query failed: {0}")]
    SchemaQuery(String),

    #[error("migration registry error: {0}")]
    Registry(String),

    #[error("migration {name} failed: {cause}")]
    MigrationFailed { name: String, cause: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad toml".into());
        assert_eq!(e.to_string(), "configuration error: bad toml");

        let e = Error::SchemaQuery("no such table: productos".into());
        assert_eq!(e.to_string(), "schema query failed: no such table: productos");

        let e = Error::Other("misc".into());
        assert_eq!(e.to_string(), "misc");
    }

    #[test]
    fn migration_failed_names_the_migration() {
        let e = Error::MigrationFailed {
            name: "003_productos_offline_tracking".into(),
            cause: "disk I/O error".into(),
        };
        assert_eq!(
            e.to_string(),
            "migration 003_productos_offline_tracking failed: disk I/O error"
        );
    }
}
