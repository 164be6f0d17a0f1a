use crate::config::RewardConfig;
use crate::domain::model::{
    Action, BattleOutcome, GameState, Move, Pokemon, RenderMode, Step, StepInfo, Trainer, ACTION_COUNT,
    MOVE_SLOTS, TEAM_SIZE,
};
use crate::domain::ports::{BattleSimulator, Environment};
use crate::utils::error::{EnvError, Result};
use async_trait::async_trait;
use std::fmt::Write;

pub const WEATHERS: [&str; 4] = ["RainDance", "SunnyDay", "Sandstorm", "Hail"];
pub const STATUSES: [&str; 6] = ["brn", "par", "slp", "frz", "psn", "tox"];
/// health fraction, unknown, fainted, one flag per status
pub const POKEMON_FEATURES: usize = 3 + STATUSES.len();
/// known, pp, disabled
pub const MOVE_FEATURES: usize = 3;
pub const OBSERVATION_SIZE: usize = 1
    + WEATHERS.len()
    + 2 * TEAM_SIZE * POKEMON_FEATURES
    + MOVE_SLOTS * MOVE_FEATURES
    + ACTION_COUNT;

const MAX_TURNS: f32 = 100.0;
const MAX_PP: f32 = 64.0;
const BROWSER_URL: &str = "https://play.pokemonshowdown.com";

/// Remaining pp relative to the move's max pp. A locked move reports neither.
fn pp_fraction(m: &Move) -> f32 {
    match (m.pp, m.max_pp) {
        (Some(pp), Some(max_pp)) if max_pp > 0 => pp as f32 / max_pp as f32,
        (Some(pp), _) => (pp as f32).min(MAX_PP) / MAX_PP,
        (None, _) => 1.0,
    }
}

fn push_pokemon(observation: &mut Vec<f32>, pokemon: &Pokemon) {
    observation.push(pokemon.health_fraction());
    observation.push(if pokemon.unknown { 1.0 } else { 0.0 });
    observation.push(if pokemon.is_fainted() { 1.0 } else { 0.0 });
    for status in STATUSES {
        observation.push(if pokemon.has_condition(status) { 1.0 } else { 0.0 });
    }
}

fn push_trainer(observation: &mut Vec<f32>, trainer: &Trainer) {
    for slot in 0..TEAM_SIZE {
        match trainer.pokemon.get(slot) {
            Some(pokemon) => push_pokemon(observation, pokemon),
            None => push_pokemon(observation, &Pokemon::default()),
        }
    }
}

/// Flattens a game state into a fixed-length feature vector of `OBSERVATION_SIZE`.
pub fn observe(state: &GameState) -> Vec<f32> {
    let mut observation = Vec::with_capacity(OBSERVATION_SIZE);

    observation.push((state.turn as f32).min(MAX_TURNS) / MAX_TURNS);
    for weather in WEATHERS {
        observation.push(if state.weather.as_deref() == Some(weather) { 1.0 } else { 0.0 });
    }

    push_trainer(&mut observation, &state.player);
    push_trainer(&mut observation, &state.opponent);

    let moves = &state.player.active().moves;
    for slot in 0..MOVE_SLOTS {
        match moves.get(slot) {
            Some(m) => {
                observation.push(1.0);
                observation.push(pp_fraction(m));
                observation.push(if m.disabled { 1.0 } else { 0.0 });
            }
            None => observation.extend([0.0; MOVE_FEATURES]),
        }
    }

    observation.extend(state.action_mask().iter().map(|&valid| if valid { 1.0 } else { 0.0 }));

    debug_assert_eq!(observation.len(), OBSERVATION_SIZE);
    observation
}

/// Text view of the battle for `RenderMode::Ansi`.
pub fn render_text(state: &GameState) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Turn {} [{}]{}",
        state.turn,
        state.outcome,
        state
            .weather
            .as_deref()
            .map(|w| format!(" weather: {}", w))
            .unwrap_or_default()
    );

    for (label, trainer) in [("You", &state.player), ("Foe", &state.opponent)] {
        let _ = writeln!(out, "{} ({}):", label, trainer.name);
        for (slot, pokemon) in trainer.pokemon.iter().enumerate() {
            let marker = if slot == 0 { '*' } else { ' ' };
            let _ = writeln!(
                out,
                " {} {:<14} {:>5.1}% {}",
                marker,
                pokemon.display_name(),
                pokemon.health_fraction() * 100.0,
                pokemon.conditions.join(",")
            );
        }
    }

    let moves: Vec<String> = state
        .player
        .active()
        .moves
        .iter()
        .map(|m| {
            let name = if m.name.is_empty() { &m.id } else { &m.name };
            if m.disabled {
                format!("({})", name)
            } else {
                name.to_string()
            }
        })
        .collect();
    let _ = writeln!(out, "Moves: {}", moves.join(" | "));
    out
}

/// Gym-style environment over any [`BattleSimulator`].
pub struct BattleEnv<S: BattleSimulator> {
    simulator: S,
    reward: RewardConfig,
    player_health: f32,
    opponent_health: f32,
}

impl<S: BattleSimulator> BattleEnv<S> {
    pub fn new(simulator: S, reward: RewardConfig) -> Self {
        Self {
            simulator,
            reward,
            player_health: TEAM_SIZE as f32,
            opponent_health: TEAM_SIZE as f32,
        }
    }

    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    pub fn state(&self) -> &GameState {
        self.simulator.state()
    }

    pub fn valid_actions(&self) -> Vec<usize> {
        self.state()
            .valid_actions()
            .iter()
            .map(Action::index)
            .collect()
    }

    fn remember_health(&mut self) {
        let state = self.simulator.state();
        self.player_health = state.player.total_health();
        self.opponent_health = state.opponent.total_health();
    }

    fn compute_reward(&self) -> f32 {
        let state = self.simulator.state();
        let terminal = match state.outcome {
            BattleOutcome::Win => self.reward.win,
            BattleOutcome::Loss => self.reward.loss,
            BattleOutcome::Tie => self.reward.tie,
            BattleOutcome::Init | BattleOutcome::Ongoing => 0.0,
        };
        let dealt = self.opponent_health - state.opponent.total_health();
        let taken = self.player_health - state.player.total_health();
        terminal + self.reward.damage_dealt * dealt + self.reward.damage_taken * taken
    }
}

#[async_trait]
impl<S: BattleSimulator> Environment for BattleEnv<S> {
    type Observation = Vec<f32>;
    type Action = usize;

    fn action_space(&self) -> usize {
        ACTION_COUNT
    }

    fn observation_size(&self) -> usize {
        OBSERVATION_SIZE
    }

    async fn reset(&mut self) -> Result<Vec<f32>> {
        self.simulator.reset().await?;
        self.remember_health();
        Ok(observe(self.simulator.state()))
    }

    async fn step(&mut self, action: usize) -> Result<Step<Vec<f32>>> {
        let parsed = Action::from_index(action).ok_or_else(|| EnvError::InvalidAction {
            action,
            reason: format!("action space is 0..{}", ACTION_COUNT),
        })?;

        let state = self.simulator.state();
        if state.is_over() {
            return Err(EnvError::InvalidAction {
                action,
                reason: "battle is over; call reset".to_string(),
            });
        }
        if !state.is_valid(parsed) {
            return Err(EnvError::InvalidAction {
                action,
                reason: format!("valid actions are {:?}", self.valid_actions()),
            });
        }

        tracing::debug!("Turn {}: {:?}", state.turn, parsed);
        match parsed {
            Action::Attack(slot) => self.simulator.attack(slot).await?,
            Action::Switch(slot) => self.simulator.switch(slot).await?,
        }
        self.simulator.update_state().await?;

        if let Some(reason) = self.simulator.take_rejection() {
            return Err(EnvError::InvalidAction { action, reason });
        }

        let reward = self.compute_reward();
        self.remember_health();

        let state = self.simulator.state();
        Ok(Step {
            observation: observe(state),
            reward,
            done: state.is_over(),
            info: StepInfo {
                turn: state.turn,
                outcome: state.outcome,
                forfeited: state.forfeited,
            },
        })
    }

    fn render(&self, mode: RenderMode) -> Result<String> {
        match mode {
            RenderMode::Human => Err(EnvError::Unsupported {
                message: match self.simulator.room_id() {
                    Some(room) => format!("open {}/{} in a browser", BROWSER_URL, room),
                    None => format!("open {} in a browser", BROWSER_URL),
                },
            }),
            RenderMode::Ansi => Ok(render_text(self.simulator.state())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.simulator.close().await
    }
}
