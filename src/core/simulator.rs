use crate::adapters::auth::{AuthMode, Credentials, ShowdownAuthenticator};
use crate::adapters::websocket::WsConnection;
use crate::config::SimulatorConfig;
use crate::core::protocol;
use crate::core::tracker::BattleTracker;
use crate::domain::model::{to_id, Action, BattleOutcome, GameState};
use crate::domain::ports::{Authenticator, BattleSimulator, Connection};
use crate::utils::error::{EnvError, Result};
use crate::utils::token;
use async_trait::async_trait;

/// Showdown backend: one logged-in websocket session playing one battle at a time.
pub struct ShowdownSimulator<C: Connection> {
    connection: C,
    config: SimulatorConfig,
    tracker: BattleTracker,
    password: Option<String>,
}

impl ShowdownSimulator<WsConnection> {
    /// Connects to the configured server and logs in.
    pub async fn connect(config: SimulatorConfig) -> Result<Self> {
        tracing::info!("Using Showdown backend at {}", config.server_url);
        let connection = WsConnection::connect(&config.server_url).await?;
        let authenticator = ShowdownAuthenticator::new(config.action_url.clone());
        Self::with_connection(config, connection, &authenticator).await
    }
}

impl<C: Connection> ShowdownSimulator<C> {
    /// Logs in over an already open connection.
    pub async fn with_connection<A: Authenticator>(
        config: SimulatorConfig,
        mut connection: C,
        authenticator: &A,
    ) -> Result<Self> {
        let challstr = loop {
            let frame = connection.recv().await?;
            if let Some(challstr) = protocol::challstr(&frame) {
                break challstr.to_string();
            }
        };

        let (username, password, assertion) = match &config.auth {
            AuthMode::Register => {
                let username = token::generate_username();
                let password = token::generate_password();
                let assertion = authenticator.register(&challstr, &username, &password).await?;
                (username, Some(password), assertion)
            }
            AuthMode::File(path) => {
                let credentials = Credentials::from_file(path)?;
                let assertion = authenticator
                    .login(&challstr, &credentials.username, &credentials.password)
                    .await?;
                (credentials.username, None, assertion)
            }
            AuthMode::Guest => {
                let username = token::generate_username();
                let assertion = authenticator.guest(&challstr, &username).await?;
                (username, None, assertion)
            }
        };

        connection
            .send(&format!("|/trn {},0,{}", username, assertion))
            .await?;
        wait_for_login(&mut connection, &username).await?;

        match &password {
            Some(password) => tracing::info!("Using username {} with password {}", username, password),
            None => tracing::info!("Using username {}", username),
        }

        connection.send(&format!("|/utm {}", config.team)).await?;

        Ok(Self {
            connection,
            config,
            tracker: BattleTracker::new(username),
            password,
        })
    }

    pub fn username(&self) -> &str {
        self.tracker.username()
    }

    /// Password of a freshly registered account, if one was created.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn opponent(&self) -> &str {
        self.tracker.opponent_name()
    }

    async fn send_to_room(&mut self, command: &str) -> Result<()> {
        let room = self
            .tracker
            .room_id()
            .ok_or_else(|| EnvError::protocol("no active battle room; call reset first"))?
            .to_string();
        self.connection.send(&format!("{}|{}", room, command)).await
    }

    /// Reads until the first decision of a new battle. A popup before the
    /// battle room opens means the server refused the search.
    async fn wait_for_battle(&mut self) -> Result<()> {
        loop {
            let frame = self.connection.recv().await?;
            if self.tracker.room_id().is_none() {
                if let Some(message) = protocol::popup(&frame) {
                    return Err(EnvError::protocol(format!("search rejected: {}", message)));
                }
            }
            if self.tracker.process(&frame)? {
                return Ok(());
            }
        }
    }

    async fn leave_room(&mut self) -> Result<()> {
        let Some(room) = self.tracker.room_id().map(str::to_string) else {
            return Ok(());
        };
        self.connection.send(&format!("|/leave {}", room)).await?;
        while !self.tracker.is_closed() {
            let frame = self.connection.recv().await?;
            self.tracker.process(&frame)?;
        }
        tracing::debug!("Left room {}", room);
        Ok(())
    }
}

/// Waits for the `updateuser` frame confirming we are logged in under `username`.
async fn wait_for_login<C: Connection>(connection: &mut C, username: &str) -> Result<()> {
    let user_id = to_id(username);
    loop {
        let frame = connection.recv().await?;
        for line in frame.lines() {
            let info = protocol::fields(line);
            if info.len() >= 4 && info[1] == "updateuser" && to_id(info[2]) == user_id && info[3] == "1" {
                return Ok(());
            }
            if info.len() >= 3 && info[1] == "nametaken" {
                return Err(EnvError::auth(format!("name {} rejected: {}", info[2], info[3..].join("|"))));
            }
        }
        if let Some(message) = protocol::popup(&frame) {
            return Err(EnvError::auth(message));
        }
        tracing::debug!("Waiting for login: {}", frame);
    }
}

#[async_trait]
impl<C: Connection> BattleSimulator for ShowdownSimulator<C> {
    fn state(&self) -> &GameState {
        self.tracker.state()
    }

    fn room_id(&self) -> Option<&str> {
        self.tracker.room_id()
    }

    async fn attack(&mut self, slot: usize) -> Result<()> {
        self.send_to_room(&Action::Attack(slot).command()).await
    }

    async fn switch(&mut self, slot: usize) -> Result<()> {
        self.send_to_room(&Action::Switch(slot).command()).await
    }

    async fn update_state(&mut self) -> Result<()> {
        loop {
            let frame = self.connection.recv().await?;
            if self.tracker.process(&frame)? {
                return Ok(());
            }
        }
    }

    fn take_rejection(&mut self) -> Option<String> {
        self.tracker.take_error()
    }

    async fn reset(&mut self) -> Result<()> {
        if self.tracker.state().outcome == BattleOutcome::Ongoing {
            tracing::info!("Forfeiting unfinished battle");
            self.send_to_room("/forfeit").await?;
        }
        self.leave_room().await?;
        self.tracker.reset_battle();

        tracing::info!("Searching for a {} battle", self.config.format);
        self.connection
            .send(&format!("|/search {}", self.config.format))
            .await?;
        self.wait_for_battle().await?;
        tracing::info!("Playing against {}", self.tracker.opponent_name());

        if self.config.timer {
            self.send_to_room("/timer on").await?;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.connection.close().await
    }
}
