use anyhow::{anyhow, Context as _, Result};
use serenity::all::UserId;
use std::path::{Path, PathBuf};

const CONFIG_PATH_REL_HOME: &str = ".config/oscbot/config.toml";
const CONFIG_PATH_ENV: &str = "OSCBOT_CONFIG";

/// #d14136
pub const DEFAULT_COLOR: u32 = 13713718;
pub const DEFAULT_COMMAND_PREFIX: &str = ";";
pub const LOG_FILE_NAME: &str = "discord.log";

/// Bot configuration.  Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    /// Accent color used for non-error embeds
    pub color: u32,
    pub command_prefix: String,
    /// Explicit owner.  If unset, the application owner is looked up at startup.
    pub owner_id: Option<UserId>,
    /// Directory containing the `exts` folder
    pub extension_root: PathBuf,
    pub log_file: PathBuf,
    pub database_url: Option<String>,
}

/// On-disk form.  Every field may be overridden from the environment.
#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    general: General,
    database: Database,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct General {
    discord_token: Option<String>,
    color: Option<u32>,
    command_prefix: Option<String>,
    owner_id: Option<u64>,
    extension_root: Option<PathBuf>,
    log_file: Option<PathBuf>,
}

#[derive(Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct Database {
    url: Option<String>,
}

impl Config {
    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        dirs::home_dir()
            .map(|p| p.join(CONFIG_PATH_REL_HOME))
            .ok_or(anyhow!("Could not find home directory"))
    }

    /// Load `.env`, the optional configuration file, then environment overrides.
    pub async fn load() -> Result<Self> {
        // A missing .env is fine; the variables may come from the real environment.
        let _ = dotenvy::dotenv_override();

        let path = Self::config_path()?;
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(anyhow!(
                    "Could not read configuration at `{}`: {}",
                    path.to_string_lossy(),
                    e
                ))
            }
        };

        Self::from_sources(contents.as_deref(), |key| std::env::var(key).ok()).with_context(
            || format!("Invalid configuration (file `{}`)", path.to_string_lossy()),
        )
    }

    /// Merge a TOML document with environment lookups.  Environment wins.
    pub fn from_sources(
        file: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file: ConfigFile = match file {
            Some(contents) => toml::from_str(contents)
                .map_err(|e| anyhow!("Could not parse configuration: {}", e))?,
            None => ConfigFile::default(),
        };
        let General {
            discord_token,
            color,
            command_prefix,
            owner_id,
            extension_root,
            log_file,
        } = file.general;

        let discord_token = env("MAIN_TOKEN")
            .or(discord_token)
            .ok_or(anyhow!("Missing Discord token (`MAIN_TOKEN`)"))?;

        let color = match env("BOT_COLOR") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|e| anyhow!("Invalid `BOT_COLOR` `{}`: {}", raw, e))?,
            None => color.unwrap_or(DEFAULT_COLOR),
        };

        let command_prefix = env("COMMAND_PREFIX")
            .or(command_prefix)
            .unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.to_owned());

        let owner_id = match env("OWNER_ID") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|e| anyhow!("Invalid `OWNER_ID` `{}`: {}", raw, e))?,
            ),
            None => owner_id,
        }
        .filter(|id| *id != 0)
        .map(UserId::new);

        let extension_root = env("DIRECTORY_OF_FILE")
            .map(PathBuf::from)
            .or(extension_root)
            .unwrap_or_else(|| PathBuf::from("."));

        let log_file = env("LOG_FILE_PATH")
            .map(PathBuf::from)
            .or(log_file)
            .unwrap_or_else(|| default_log_file(&extension_root));

        let database_url = database_url(&env).or(file.database.url);

        Ok(Self {
            discord_token,
            color,
            command_prefix,
            owner_id,
            extension_root,
            log_file,
            database_url,
        })
    }
}

fn default_log_file(extension_root: &Path) -> PathBuf {
    extension_root.join(LOG_FILE_NAME)
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "true" | "True" | "TRUE" | "t" | "T" | "1")
}

/// Inside docker the database is the `db` service; elsewhere `DB_URL` is used as given.
fn database_url(env: &impl Fn(&str) -> Option<String>) -> Option<String> {
    if env("DOCKER_MODE").is_some_and(|v| is_truthy(&v)) {
        let password = env("POSTGRES_PASSWORD").unwrap_or_default();
        return Some(format!("postgres://postgres:{}@db:5432/postgres", password));
    }

    env("DB_URL")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_only() {
        let cfg = Config::from_sources(
            None,
            env_from(&[("MAIN_TOKEN", "abc"), ("BOT_COLOR", "255")]),
        )
        .unwrap();

        assert_eq!(cfg.discord_token, "abc");
        assert_eq!(cfg.color, 255);
        assert_eq!(cfg.command_prefix, DEFAULT_COMMAND_PREFIX);
        assert_eq!(cfg.owner_id, None);
        assert_eq!(cfg.log_file, PathBuf::from("./discord.log"));
        assert_eq!(cfg.database_url, None);
    }

    #[test]
    fn env_overrides_file() {
        let file = r#"
            [general]
            discord_token = "from-file"
            color = 1
            command_prefix = "!"
            owner_id = 42
            extension_root = "/srv/oscbot"
        "#;
        let cfg = Config::from_sources(Some(file), env_from(&[("MAIN_TOKEN", "from-env")]))
            .unwrap();

        assert_eq!(cfg.discord_token, "from-env");
        assert_eq!(cfg.color, 1);
        assert_eq!(cfg.command_prefix, "!");
        assert_eq!(cfg.owner_id, Some(UserId::new(42)));
        assert_eq!(cfg.log_file, PathBuf::from("/srv/oscbot/discord.log"));
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(Config::from_sources(None, env_from(&[])).is_err());
    }

    #[test]
    fn bad_color_is_an_error() {
        let env = env_from(&[("MAIN_TOKEN", "abc"), ("BOT_COLOR", "#d14136")]);
        assert!(Config::from_sources(None, env).is_err());
    }

    #[test]
    fn docker_database_url() {
        let env = env_from(&[
            ("DOCKER_MODE", "T"),
            ("POSTGRES_PASSWORD", "hunter2"),
            ("DB_URL", "postgres://elsewhere"),
        ]);
        assert_eq!(
            database_url(&env).as_deref(),
            Some("postgres://postgres:hunter2@db:5432/postgres")
        );
    }

    #[test]
    fn plain_database_url() {
        let env = env_from(&[("DOCKER_MODE", "no"), ("DB_URL", "postgres://elsewhere")]);
        assert_eq!(database_url(&env).as_deref(), Some("postgres://elsewhere"));
    }
}
