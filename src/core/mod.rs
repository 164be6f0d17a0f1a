pub mod env;
pub mod protocol;
pub mod simulator;
pub mod tracker;

pub use crate::domain::model::{Action, BattleOutcome, GameState, RenderMode, Step, StepInfo};
pub use crate::domain::ports::{Authenticator, BattleSimulator, ConfigProvider, Connection, Environment};
pub use crate::utils::error::Result;
