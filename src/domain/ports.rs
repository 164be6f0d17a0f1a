use crate::domain::model::{GameState, RenderMode, Step};
use crate::utils::error::Result;
use async_trait::async_trait;

/// A text-frame duplex link to a simulator server.
#[async_trait]
pub trait Connection: Send {
    async fn send(&mut self, message: &str) -> Result<()>;
    async fn recv(&mut self) -> Result<String>;
    async fn close(&mut self) -> Result<()>;
}

/// Exchanges a challenge string for a signed assertion on the login server.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn register(&self, challstr: &str, username: &str, password: &str) -> Result<String>;
    async fn login(&self, challstr: &str, username: &str, password: &str) -> Result<String>;
    async fn guest(&self, challstr: &str, username: &str) -> Result<String>;
}

pub trait ConfigProvider: Send + Sync {
    fn server_url(&self) -> &str;
    fn action_url(&self) -> &str;
    fn battle_format(&self) -> &str;
    fn team(&self) -> &str;
    fn auth(&self) -> &str;
    fn timer(&self) -> bool;
}

/// Battle state shared by every simulator backend, plus the commands an agent can issue.
#[async_trait]
pub trait BattleSimulator: Send {
    fn state(&self) -> &GameState;
    fn room_id(&self) -> Option<&str>;

    async fn attack(&mut self, slot: usize) -> Result<()>;
    async fn switch(&mut self, slot: usize) -> Result<()>;
    /// Reads server output until the next decision is due or the battle ends.
    async fn update_state(&mut self) -> Result<()>;
    /// Reason the server refused the last choice, if it did.
    fn take_rejection(&mut self) -> Option<String>;
    /// Leaves the current battle (forfeiting if needed) and starts a new one.
    async fn reset(&mut self) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Gym-style environment contract.
#[async_trait]
pub trait Environment: Send {
    type Observation: Send;
    type Action: Send;

    fn action_space(&self) -> usize;
    fn observation_size(&self) -> usize;

    async fn reset(&mut self) -> Result<Self::Observation>;
    async fn step(&mut self, action: Self::Action) -> Result<Step<Self::Observation>>;
    fn render(&self, mode: RenderMode) -> Result<String>;
    async fn close(&mut self) -> Result<()>;
}
