use anyhow::{bail, Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::application::filter::FilterOrder;

/// Environment variables look like `SNAPDIFF__DB__PASSWORD`.
pub const ENV_PREFIX: &str = "SNAPDIFF";

const DRIVERS: &[&str] = &["postgres", "mysql", "mariadb", "sqlite"];

/// Everything but the RFC 3986 unreserved characters is escaped in userinfo.
const USERINFO_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub db: DbConfig,
    #[serde(default)]
    pub diff: DiffConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    /// Database driver: "postgres" (default), "mysql", "mariadb", or "sqlite".
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default = "default_host")]
    pub host: String,
    /// Defaults to the driver's standard port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Database name, or the file path for SQLite.
    pub dbname: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Schema that qualifies every table reference.
    #[serde(default)]
    pub tenant: Option<String>,
}

fn default_driver() -> String {
    "postgres".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiffConfig {
    #[serde(default = "enabled")]
    pub filter: bool,
    #[serde(default = "enabled")]
    pub summarize: bool,
    #[serde(default)]
    pub filter_order: FilterOrder,
    /// Restrict the run to these tables; empty means all base tables.
    #[serde(default)]
    pub tables: Vec<String>,
    #[serde(default)]
    pub order_by: Option<String>,
}

fn enabled() -> bool {
    true
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            filter: true,
            summarize: true,
            filter_order: FilterOrder::default(),
            tables: Vec::new(),
            order_by: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub timings: bool,
}

fn default_format() -> String {
    "json".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            timings: false,
        }
    }
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub driver: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub tenant: Option<String>,
    pub filter: Option<bool>,
    pub summarize: Option<bool>,
    pub filter_order: Option<FilterOrder>,
    pub tables: Option<Vec<String>>,
    pub order_by: Option<String>,
    pub format: Option<String>,
    pub timings: Option<bool>,
}

impl ConfigOverrides {
    fn apply(&self, builder: ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>> {
        Ok(builder
            .set_override_option("db.driver", self.driver.clone())?
            .set_override_option("db.host", self.host.clone())?
            .set_override_option("db.port", self.port.map(i64::from))?
            .set_override_option("db.dbname", self.dbname.clone())?
            .set_override_option("db.user", self.user.clone())?
            .set_override_option("db.password", self.password.clone())?
            .set_override_option("db.tenant", self.tenant.clone())?
            .set_override_option("diff.filter", self.filter)?
            .set_override_option("diff.summarize", self.summarize)?
            .set_override_option("diff.filter_order", self.filter_order.map(|o| o.as_str()))?
            .set_override_option("diff.tables", self.tables.clone())?
            .set_override_option("diff.order_by", self.order_by.clone())?
            .set_override_option("output.format", self.format.clone())?
            .set_override_option("output.timings", self.timings)?)
    }
}

/// `<config dir>/snapdiff/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("snapdiff").join("config.toml"))
}

impl DbConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(match self.driver.as_str() {
            "mysql" | "mariadb" => 3306,
            _ => 5432,
        })
    }

    /// Build a sqlx-compatible connection URL from this config. User and
    /// password are percent-encoded.
    pub fn url(&self) -> String {
        let user = utf8_percent_encode(&self.user, USERINFO_ENCODE_SET);
        let password = utf8_percent_encode(&self.password, USERINFO_ENCODE_SET);
        match self.driver.as_str() {
            "mysql" | "mariadb" => format!(
                "mysql://{}:{}@{}:{}/{}",
                user,
                password,
                self.host,
                self.port(),
                self.dbname
            ),
            "sqlite" => format!("sqlite://{}", self.dbname),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                user,
                password,
                self.host,
                self.port(),
                self.dbname
            ),
        }
    }
}

impl AppConfig {
    /// Load defaults, then the TOML file, then `SNAPDIFF__*` environment
    /// variables, then `overrides`.
    ///
    /// An explicit `path` must exist; without one the per-user default file
    /// is read if present.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let (file, required) = match path {
            Some(p) => (Some(p.to_path_buf()), true),
            None => (default_config_path(), false),
        };
        Self::build(file.as_deref(), required, env_source(), overrides)
    }

    fn build(
        file: Option<&Path>,
        required: bool,
        env: Environment,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(p) = file {
            builder = builder.add_source(
                File::from(p)
                    .format(FileFormat::Toml)
                    .required(required),
            );
        }
        builder = overrides.apply(builder.add_source(env))?;

        let cfg: AppConfig = builder
            .build()
            .with_context(|| "Failed to read configuration")?
            .try_deserialize()
            .with_context(|| "Invalid configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !DRIVERS.contains(&self.db.driver.as_str()) {
            bail!(
                "Unknown driver: {} (expected one of {})",
                self.db.driver,
                DRIVERS.join(", ")
            );
        }
        if self.db.dbname.trim().is_empty() {
            bail!("No database name configured");
        }
        Ok(())
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("diff.tables")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env_source().source(Some(map))
    }

    fn toml_file(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn defaults_apply_when_only_dbname_is_given() {
        let overrides = ConfigOverrides {
            dbname: Some("shop".into()),
            ..Default::default()
        };
        let cfg = AppConfig::build(None, false, env(&[]), &overrides).unwrap();
        assert_eq!(cfg.db.driver, "postgres");
        assert_eq!(cfg.db.host, "localhost");
        assert_eq!(cfg.db.port(), 5432);
        assert!(cfg.diff.filter);
        assert!(cfg.diff.summarize);
        assert_eq!(cfg.diff.filter_order, FilterOrder::BeforeSummarize);
        assert!(cfg.diff.tables.is_empty());
        assert_eq!(cfg.output.format, "json");
    }

    #[test]
    fn file_then_env_then_overrides() {
        let file = toml_file(
            r#"
            [db]
            driver = "mysql"
            dbname = "from_file"
            user = "file_user"
            tenant = "acme"

            [diff]
            summarize = false
            tables = ["Users", "Orders"]
            "#,
        );
        let overrides = ConfigOverrides {
            user: Some("cli_user".into()),
            filter: Some(false),
            ..Default::default()
        };
        let cfg = AppConfig::build(
            Some(file.path()),
            true,
            env(&[
                ("SNAPDIFF__DB__DBNAME", "from_env"),
                ("SNAPDIFF__DB__USER", "env_user"),
                ("SNAPDIFF__DIFF__ORDER_BY", "Id"),
            ]),
            &overrides,
        )
        .unwrap();

        assert_eq!(cfg.db.driver, "mysql");
        assert_eq!(cfg.db.port(), 3306);
        assert_eq!(cfg.db.dbname, "from_env");
        assert_eq!(cfg.db.user, "cli_user");
        assert_eq!(cfg.db.tenant.as_deref(), Some("acme"));
        assert!(!cfg.diff.filter);
        assert!(!cfg.diff.summarize);
        assert_eq!(cfg.diff.tables, vec!["Users", "Orders"]);
        assert_eq!(cfg.diff.order_by.as_deref(), Some("Id"));
    }

    #[test]
    fn env_tables_are_comma_separated() {
        let cfg = AppConfig::build(
            None,
            false,
            env(&[
                ("SNAPDIFF__DB__DBNAME", "shop"),
                ("SNAPDIFF__DIFF__TABLES", "Users,Orders"),
                ("SNAPDIFF__DIFF__FILTER", "false"),
            ]),
            &ConfigOverrides::default(),
        )
        .unwrap();
        assert_eq!(cfg.diff.tables, vec!["Users", "Orders"]);
        assert!(!cfg.diff.filter);
    }

    #[test]
    fn filter_order_override() {
        let overrides = ConfigOverrides {
            dbname: Some("shop".into()),
            filter_order: Some(FilterOrder::AfterSummarize),
            port: Some(6543),
            ..Default::default()
        };
        let cfg = AppConfig::build(None, false, env(&[]), &overrides).unwrap();
        assert_eq!(cfg.diff.filter_order, FilterOrder::AfterSummarize);
        assert_eq!(cfg.db.port(), 6543);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let missing = Path::new("/definitely/not/here/snapdiff.toml");
        let overrides = ConfigOverrides {
            dbname: Some("shop".into()),
            ..Default::default()
        };
        assert!(AppConfig::build(Some(missing), true, env(&[]), &overrides).is_err());
        assert!(AppConfig::build(Some(missing), false, env(&[]), &overrides).is_ok());
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let overrides = ConfigOverrides {
            dbname: Some("shop".into()),
            driver: Some("oracle".into()),
            ..Default::default()
        };
        let err = AppConfig::build(None, false, env(&[]), &overrides).unwrap_err();
        assert!(err.to_string().contains("Unknown driver"));
    }

    #[test]
    fn missing_dbname_is_rejected() {
        assert!(AppConfig::build(None, false, env(&[]), &ConfigOverrides::default()).is_err());
    }

    #[test]
    fn urls_per_driver() {
        let mut db = DbConfig {
            driver: "postgres".into(),
            host: "db".into(),
            port: None,
            dbname: "shop".into(),
            user: "u".into(),
            password: "p".into(),
            tenant: None,
        };
        assert_eq!(db.url(), "postgres://u:p@db:5432/shop");
        db.driver = "mariadb".into();
        assert_eq!(db.url(), "mysql://u:p@db:3306/shop");
        db.driver = "sqlite".into();
        db.dbname = "/tmp/shop.db".into();
        assert_eq!(db.url(), "sqlite:///tmp/shop.db");
    }

    #[test]
    fn url_escapes_credentials() {
        let db = DbConfig {
            driver: "postgres".into(),
            host: "db".into(),
            port: None,
            dbname: "shop".into(),
            user: "ops@corp".into(),
            password: "p@ss:w/rd#1 ok".into(),
            tenant: None,
        };
        assert_eq!(
            db.url(),
            "postgres://ops%40corp:p%40ss%3Aw%2Frd%231%20ok@db:5432/shop"
        );

        let plain = DbConfig {
            user: "app_user-1.x~".into(),
            password: "secret".into(),
            ..db
        };
        assert_eq!(plain.url(), "postgres://app_user-1.x~:secret@db:5432/shop");
    }
}
