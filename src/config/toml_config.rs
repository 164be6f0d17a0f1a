use crate::adapters::auth::SHOWDOWN_ACTION_URL;
use crate::adapters::websocket::SHOWDOWN_WEBSOCKET_URL;
use crate::config::{RewardConfig, DEFAULT_FORMAT, DEFAULT_TEAM};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EnvError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub battle: BattleConfig,
    pub auth: AuthConfig,
    pub reward: RewardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub url: String,
    pub action_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: SHOWDOWN_WEBSOCKET_URL.to_string(),
            action_url: SHOWDOWN_ACTION_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    pub format: String,
    pub team: String,
    pub timer: bool,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            team: DEFAULT_TEAM.to_string(),
            timer: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// `guest`, `register`, or a credentials file path.
    pub mode: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: "guest".to_string(),
        }
    }
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EnvError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EnvError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SHOWDOWN_AUTH})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EnvError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if self.auth.mode.contains("${") {
            return Err(EnvError::MissingConfigError {
                field: format!("auth.mode ({})", self.auth.mode),
            });
        }
        super::validate_provider(self)?;
        self.reward.validate()
    }
}

impl ConfigProvider for TomlConfig {
    fn server_url(&self) -> &str {
        &self.server.url
    }

    fn action_url(&self) -> &str {
        &self.server.action_url
    }

    fn battle_format(&self) -> &str {
        &self.battle.format
    }

    fn team(&self) -> &str {
        &self.battle.team
    }

    fn auth(&self) -> &str {
        &self.auth.mode
    }

    fn timer(&self) -> bool {
        self.battle.timer
    }
}
