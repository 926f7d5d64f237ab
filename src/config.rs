//! Configuration constants and the pipeline configuration loader
//!
//! The loader reads a small sectioned key/value file (`dwh.cfg` by default) and
//! lets every key be supplied or overridden from the environment. The result is
//! an explicit [`PipelineConfig`] value that is handed to whatever needs it.

use ini::{Ini, ParseOption};
use sqlx::postgres::PgSslMode;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::io::StorageUri;
use crate::sql::literal::{AwsRegion, IamRole};
use crate::sql::load::{JsonPathRule, StagingSources};

// ============================================================================
// Connection Configuration
// ============================================================================

/// Upper bound on establishing the warehouse connection
///
/// Connecting covers TLS negotiation and authentication. A cluster that does not
/// answer within this window is reported as a connection error before any
/// statement runs.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(45);

/// Default Redshift port
pub const DEFAULT_PORT: u16 = 5439;

// ============================================================================
// Source Configuration
// ============================================================================

/// Region used by the bulk loader when `[S3] REGION` is absent
pub const DEFAULT_REGION: &str = "us-west-2";

pub const DEFAULT_CONFIG_PATH: &str = "dwh.cfg";

/// Prefix for environment overrides: `DWH_<SECTION>_<KEY>`
pub const ENV_PREFIX: &str = "DWH";

// ============================================================================
// Loaded Configuration
// ============================================================================

/// Everything a pipeline run needs, resolved and validated
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub cluster: ClusterConfig,
    pub sources: StagingSources,
}

/// Warehouse connection settings from the `[CLUSTER]` section
#[derive(Clone)]
pub struct ClusterConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: PgSslMode,
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

impl ClusterConfig {
    /// `host:port/database`, for log lines and error messages
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl PipelineConfig {
    /// Load configuration from `path`, with overrides from the process environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |name| std::env::var(name).ok())
    }

    /// Load configuration from `path`, resolving overrides through `env`
    ///
    /// A missing file is tolerated: every key may come from the environment, and
    /// the first key found in neither place is reported as missing.
    pub fn load_with_env(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using environment only");
                String::new()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let file = parse_sections(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let values = ConfigValues { file, env: &env };
        Self::from_values(&values)
    }

    fn from_values(values: &ConfigValues<'_>) -> Result<Self, ConfigError> {
        let port = match values.get("CLUSTER", "DB_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                key: "CLUSTER.DB_PORT".to_string(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let ssl_mode = match values.get("CLUSTER", "SSL_MODE") {
            Some(raw) => PgSslMode::from_str(&raw).map_err(|e| ConfigError::Invalid {
                key: "CLUSTER.SSL_MODE".to_string(),
                reason: e.to_string(),
            })?,
            None => PgSslMode::default(),
        };

        let cluster = ClusterConfig {
            host: values.require("CLUSTER", "HOST")?,
            port,
            database: values.require("CLUSTER", "DB_NAME")?,
            username: values.require("CLUSTER", "DB_USER")?,
            password: values.require("CLUSTER", "DB_PASSWORD")?,
            ssl_mode,
        };

        let region = values
            .get("S3", "REGION")
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let sources = StagingSources {
            log_data: values.parse_with("S3", "LOG_DATA", StorageUri::parse)?,
            log_jsonpath: values.parse_with("S3", "LOG_JSONPATH", JsonPathRule::parse)?,
            song_data: values.parse_with("S3", "SONG_DATA", StorageUri::parse)?,
            iam_role: values.parse_with("IAM_ROLE", "ARN", IamRole::parse)?,
            region: AwsRegion::parse(&region).map_err(|e| ConfigError::Invalid {
                key: "S3.REGION".to_string(),
                reason: e.to_string(),
            })?,
        };

        Ok(Self { cluster, sources })
    }
}

/// Section -> key -> value, all names upper-cased
type Sections = HashMap<String, HashMap<String, String>>;

/// Parse the file body into upper-cased sections
///
/// The body is INI: `KEY = value` or `KEY: value` lines under `[SECTION]`
/// headers, with `;` and `#` comment lines. Values may be wrapped in single or
/// double quotes, which are removed, so `DB_PORT = 5439` and `DB_PORT = '5439'`
/// read the same.
fn parse_sections(contents: &str) -> Result<Sections, ini::ParseError> {
    let options = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..Default::default()
    };
    let parsed = Ini::load_from_str_opt(contents, options)?;
    let mut sections = Sections::new();

    for (section, properties) in parsed.iter() {
        let Some(section) = section else {
            for (key, _) in properties.iter() {
                tracing::warn!(%key, "ignoring config key outside a section");
            }
            continue;
        };

        let keys = sections.entry(section.trim().to_uppercase()).or_default();
        for (key, value) in properties.iter() {
            keys.insert(key.trim().to_uppercase(), unquote(value.trim()).to_string());
        }
    }

    Ok(sections)
}

/// Strip one pair of matching surrounding quotes
fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// File values layered under environment overrides
struct ConfigValues<'a> {
    file: Sections,
    env: &'a dyn Fn(&str) -> Option<String>,
}

impl ConfigValues<'_> {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        let env_name = format!("{ENV_PREFIX}_{section}_{key}");
        (self.env)(&env_name)
            .or_else(|| {
                self.file
                    .get(section)
                    .and_then(|keys| keys.get(key))
                    .cloned()
            })
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn require(&self, section: &str, key: &str) -> Result<String, ConfigError> {
        self.get(section, key).ok_or_else(|| ConfigError::Missing {
            section: section.to_string(),
            key: key.to_string(),
        })
    }

    fn parse_with<T>(
        &self,
        section: &str,
        key: &str,
        parse: impl Fn(&str) -> anyhow::Result<T>,
    ) -> Result<T, ConfigError> {
        let raw = self.require(section, key)?;
        parse(&raw).map_err(|e| ConfigError::Invalid {
            key: format!("{section}.{key}"),
            reason: format!("{e:#}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL_CONFIG: &str = r#"
[CLUSTER]
HOST = 'dwhcluster.abc123.us-west-2.redshift.amazonaws.com'
DB_NAME = 'dwh'
DB_USER = 'dwhuser'
DB_PASSWORD = 'Passw0rd'
DB_PORT = 5439

[IAM_ROLE]
ARN = 'arn:aws:iam::123456789012:role/dwhRole'

[S3]
LOG_DATA = 's3://udacity-dend/log_data'
LOG_JSONPATH = 's3://udacity-dend/log_json_path.json'
SONG_DATA = 's3://udacity-dend/song_data'
"#;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(FULL_CONFIG);
        let config = PipelineConfig::load_with_env(file.path(), no_env).unwrap();

        assert_eq!(
            config.cluster.host,
            "dwhcluster.abc123.us-west-2.redshift.amazonaws.com"
        );
        assert_eq!(config.cluster.port, 5439);
        assert_eq!(config.cluster.database, "dwh");
        assert_eq!(config.cluster.username, "dwhuser");
        assert_eq!(config.sources.log_data.to_string(), "s3://udacity-dend/log_data");
        assert_eq!(config.sources.song_data.to_string(), "s3://udacity-dend/song_data");
        assert_eq!(
            config.sources.iam_role.as_str(),
            "arn:aws:iam::123456789012:role/dwhRole"
        );
        assert_eq!(config.sources.region.as_str(), DEFAULT_REGION);
        assert!(matches!(
            config.sources.log_jsonpath,
            JsonPathRule::Mapping(_)
        ));
    }

    #[test]
    fn test_section_and_key_names_are_case_insensitive() {
        let contents = FULL_CONFIG
            .replace("[CLUSTER]", "[cluster]")
            .replace("DB_NAME", "db_name");
        let file = write_config(&contents);
        let config = PipelineConfig::load_with_env(file.path(), no_env).unwrap();
        assert_eq!(config.cluster.database, "dwh");
    }

    #[test]
    fn test_missing_key_is_reported() {
        let contents = FULL_CONFIG.replace("SONG_DATA = 's3://udacity-dend/song_data'", "");
        let file = write_config(&contents);
        let err = PipelineConfig::load_with_env(file.path(), no_env).unwrap_err();
        match err {
            ConfigError::Missing { section, key } => {
                assert_eq!(section, "S3");
                assert_eq!(key, "SONG_DATA");
            }
            other => panic!("Expected missing key error, got {other:?}"),
        }
    }

    #[test]
    fn test_env_overrides_file_value() {
        let file = write_config(FULL_CONFIG);
        let env = |name: &str| match name {
            "DWH_CLUSTER_DB_PASSWORD" => Some("from-env".to_string()),
            "DWH_S3_REGION" => Some("eu-central-1".to_string()),
            _ => None,
        };
        let config = PipelineConfig::load_with_env(file.path(), env).unwrap();
        assert_eq!(config.cluster.password, "from-env");
        assert_eq!(config.sources.region.as_str(), "eu-central-1");
    }

    #[test]
    fn test_missing_file_uses_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.cfg");
        let env = |name: &str| {
            let value = match name {
                "DWH_CLUSTER_HOST" => "localhost",
                "DWH_CLUSTER_DB_NAME" => "dwh",
                "DWH_CLUSTER_DB_USER" => "dwhuser",
                "DWH_CLUSTER_DB_PASSWORD" => "secret",
                "DWH_CLUSTER_DB_PORT" => "5440",
                "DWH_IAM_ROLE_ARN" => "arn:aws:iam::123456789012:role/dwhRole",
                "DWH_S3_LOG_DATA" => "s3://bucket/log_data",
                "DWH_S3_LOG_JSONPATH" => "auto",
                "DWH_S3_SONG_DATA" => "s3://bucket/song_data",
                _ => return None,
            };
            Some(value.to_string())
        };
        let config = PipelineConfig::load_with_env(&path, env).unwrap();
        assert_eq!(config.cluster.port, 5440);
        assert!(matches!(config.sources.log_jsonpath, JsonPathRule::Auto));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases = [
            ("ARN = 'arn:aws:iam::123456789012:role/dwhRole'", "ARN = 'not-an-arn'", "IAM_ROLE.ARN"),
            ("DB_PORT = 5439", "DB_PORT = 'abc'", "CLUSTER.DB_PORT"),
            (
                "LOG_DATA = 's3://udacity-dend/log_data'",
                "LOG_DATA = \"s3://udacity-dend/log'data\"",
                "S3.LOG_DATA",
            ),
            (
                "SONG_DATA = 's3://udacity-dend/song_data'",
                "SONG_DATA = 'https://example.com/song_data'",
                "S3.SONG_DATA",
            ),
        ];

        for (original, replacement, expected_key) in cases {
            let file = write_config(&FULL_CONFIG.replace(original, replacement));
            let err = PipelineConfig::load_with_env(file.path(), no_env).unwrap_err();
            match err {
                ConfigError::Invalid { key, .. } => assert_eq!(key, expected_key),
                other => panic!("Expected invalid value for {expected_key}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unparseable_file_is_a_parse_error() {
        let file = write_config("[CLUSTER");
        let err = PipelineConfig::load_with_env(file.path(), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_plain_ini_config() {
        let contents = "\
; written by the cluster setup notebook
[CLUSTER]
HOST=dwhcluster.abc123.us-west-2.redshift.amazonaws.com
DB_NAME=dwh
DB_USER=dwhuser
DB_PASSWORD=Passw0rd
DB_PORT=5439

[IAM_ROLE]
ARN=arn:aws:iam::123456789012:role/dwhRole

[S3]
LOG_DATA=s3://udacity-dend/log_data
LOG_JSONPATH=s3://udacity-dend/log_json_path.json
SONG_DATA=s3://udacity-dend/song_data
";
        let file = write_config(contents);
        let config = PipelineConfig::load_with_env(file.path(), no_env).unwrap();

        assert_eq!(
            config.cluster.host,
            "dwhcluster.abc123.us-west-2.redshift.amazonaws.com"
        );
        assert_eq!(config.cluster.password, "Passw0rd");
        assert_eq!(config.cluster.port, 5439);
        assert_eq!(
            config.sources.iam_role.as_str(),
            "arn:aws:iam::123456789012:role/dwhRole"
        );
        assert_eq!(config.sources.log_data.to_string(), "s3://udacity-dend/log_data");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'dwh'"), "dwh");
        assert_eq!(unquote("\"dwh\""), "dwh");
        assert_eq!(unquote("dwh"), "dwh");
        assert_eq!(unquote("'dwh\""), "'dwh\"");
        assert_eq!(unquote("it's"), "it's");
    }

    #[test]
    fn test_debug_redacts_password() {
        let file = write_config(FULL_CONFIG);
        let config = PipelineConfig::load_with_env(file.path(), no_env).unwrap();
        let rendered = format!("{:?}", config.cluster);
        assert!(!rendered.contains("Passw0rd"));
        assert!(rendered.contains("<redacted>"));
    }
}
