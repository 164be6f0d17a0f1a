pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::{toml_config::TomlConfig, RewardConfig, SimulatorConfig};
pub use crate::core::{env::BattleEnv, simulator::ShowdownSimulator, tracker::BattleTracker};
pub use domain::model::{Action, BattleOutcome, GameState, RenderMode, Step};
pub use domain::ports::{BattleSimulator, Environment};
pub use utils::error::{EnvError, Result};
