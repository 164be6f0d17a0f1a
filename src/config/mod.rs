pub mod toml_config;

use crate::adapters::auth::{AuthMode, SHOWDOWN_ACTION_URL};
use crate::adapters::websocket::SHOWDOWN_WEBSOCKET_URL;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FORMAT: &str = "gen7randombattle";
pub const DEFAULT_TEAM: &str = "null";

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "pokebattle-env")]
#[command(about = "Play Pokémon Showdown battles through a Gym-style environment")]
pub struct CliConfig {
    #[arg(long, default_value = SHOWDOWN_WEBSOCKET_URL)]
    pub server_url: String,

    #[arg(long, default_value = SHOWDOWN_ACTION_URL)]
    pub action_url: String,

    #[arg(long, default_value = DEFAULT_FORMAT)]
    pub format: String,

    #[arg(long, default_value = DEFAULT_TEAM, help = "Packed team, or null for random formats")]
    pub team: String,

    #[arg(
        long,
        default_value = "guest",
        help = "guest, register, or a path to a username/password file"
    )]
    pub auth: String,

    #[arg(long, help = "Do not turn the battle timer on")]
    pub no_timer: bool,

    #[arg(long, default_value = "1")]
    pub episodes: usize,

    #[arg(long, help = "Seed for the random agent")]
    pub seed: Option<u64>,

    #[arg(long, help = "TOML config file; overrides the connection flags")]
    pub config: Option<String>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn server_url(&self) -> &str {
        &self.server_url
    }

    fn action_url(&self) -> &str {
        &self.action_url
    }

    fn battle_format(&self) -> &str {
        &self.format
    }

    fn team(&self) -> &str {
        &self.team
    }

    fn auth(&self) -> &str {
        &self.auth
    }

    fn timer(&self) -> bool {
        !self.no_timer
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_positive_number("episodes", self.episodes, 1)?;
        if let Some(path) = &self.config {
            validation::validate_path("config", path)?;
        }
        validate_provider(self)
    }
}

fn validate_provider<C: ConfigProvider + ?Sized>(config: &C) -> Result<()> {
    validation::validate_websocket_url("server_url", config.server_url())?;
    validation::validate_http_url("action_url", config.action_url())?;
    validation::validate_format_id("format", config.battle_format())?;
    if let AuthMode::File(path) = AuthMode::parse(config.auth()) {
        validation::validate_path("auth", &path.to_string_lossy())?;
    }
    Ok(())
}

/// Terminal rewards and optional per-step shaping on health changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub win: f32,
    pub loss: f32,
    pub tie: f32,
    /// Weight on the opponent's lost health fraction since the last step.
    pub damage_dealt: f32,
    /// Weight on our own lost health fraction since the last step (usually negative).
    pub damage_taken: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            win: 1.0,
            loss: -1.0,
            tie: 0.0,
            damage_dealt: 0.0,
            damage_taken: 0.0,
        }
    }
}

impl Validate for RewardConfig {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("reward.win", self.win),
            ("reward.loss", self.loss),
            ("reward.tie", self.tie),
            ("reward.damage_dealt", self.damage_dealt),
            ("reward.damage_taken", self.damage_taken),
        ] {
            validation::validate_range(field, value, -1000.0, 1000.0)?;
        }
        Ok(())
    }
}

/// Everything the Showdown simulator needs, resolved from CLI flags or a TOML file.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    pub server_url: String,
    pub action_url: String,
    pub format: String,
    pub team: String,
    pub auth: AuthMode,
    pub timer: bool,
}

impl SimulatorConfig {
    pub fn from_provider<C: ConfigProvider + ?Sized>(config: &C) -> Result<Self> {
        validate_provider(config)?;
        Ok(Self {
            server_url: config.server_url().to_string(),
            action_url: config.action_url().to_string(),
            format: config.battle_format().to_string(),
            team: config.team().to_string(),
            auth: AuthMode::parse(config.auth()),
            timer: config.timer(),
        })
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            server_url: SHOWDOWN_WEBSOCKET_URL.to_string(),
            action_url: SHOWDOWN_ACTION_URL.to_string(),
            format: DEFAULT_FORMAT.to_string(),
            team: DEFAULT_TEAM.to_string(),
            auth: AuthMode::Guest,
            timer: true,
        }
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let config = CliConfig::parse_from(["pokebattle-env"]);
        assert_eq!(config.server_url, SHOWDOWN_WEBSOCKET_URL);
        assert_eq!(config.format, "gen7randombattle");
        assert_eq!(config.episodes, 1);
        assert!(config.validate().is_ok());

        let sim = SimulatorConfig::from_provider(&config).unwrap();
        assert_eq!(sim, SimulatorConfig::default());
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        let config = CliConfig::parse_from(["pokebattle-env", "--server-url", "https://x.org"]);
        assert!(config.validate().is_err());

        let config = CliConfig::parse_from(["pokebattle-env", "--episodes", "0"]);
        assert!(config.validate().is_err());

        let config = CliConfig::parse_from(["pokebattle-env", "--format", "Gen 7"]);
        assert!(SimulatorConfig::from_provider(&config).is_err());
    }

    #[test]
    fn test_cli_auth_and_timer() {
        let config = CliConfig::parse_from([
            "pokebattle-env",
            "--auth",
            "creds/auth.txt",
            "--no-timer",
        ]);
        let sim = SimulatorConfig::from_provider(&config).unwrap();
        assert_eq!(sim.auth, AuthMode::File("creds/auth.txt".into()));
        assert!(!sim.timer);
    }

    #[test]
    fn test_reward_validation() {
        assert!(RewardConfig::default().validate().is_ok());
        let reward = RewardConfig {
            win: 5000.0,
            ..RewardConfig::default()
        };
        assert!(reward.validate().is_err());
    }
}
