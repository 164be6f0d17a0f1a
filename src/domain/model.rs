use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const TEAM_SIZE: usize = 6;
pub const MOVE_SLOTS: usize = 4;
pub const ACTION_COUNT: usize = MOVE_SLOTS + TEAM_SIZE;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Move {
    pub id: String,
    pub name: String,
    pub pp: Option<u32>,
    pub max_pp: Option<u32>,
    pub disabled: bool,
}

impl Move {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: to_id(&name),
            name,
            ..Self::default()
        }
    }

    /// 比對 id 或顯示名稱（對手的招式只會以名稱出現）
    pub fn matches(&self, key: &str) -> bool {
        let key_id = to_id(key);
        (!self.id.is_empty() && self.id == key_id) || (!self.name.is_empty() && self.name == key)
    }
}

/// Showdown ids: lowercase with everything but letters and digits removed.
pub fn to_id(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    #[default]
    Genderless,
}

impl Gender {
    pub fn from_details(details: &str) -> Self {
        if details.contains(", M") {
            Gender::Male
        } else if details.contains(", F") {
            Gender::Female
        } else {
            Gender::Genderless
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pokemon {
    pub name: String,
    pub species: String,
    pub gender: Gender,
    pub health: f32,
    pub max_health: f32,
    pub conditions: Vec<String>,
    pub moves: Vec<Move>,
    pub stats: BTreeMap<String, u32>,
    pub item: String,
    pub ability: String,
    pub unknown: bool,
    pub trapped: bool,
}

impl Default for Pokemon {
    fn default() -> Self {
        Self {
            name: String::new(),
            species: String::new(),
            gender: Gender::Genderless,
            health: 100.0,
            max_health: 100.0,
            conditions: Vec::new(),
            moves: Vec::new(),
            stats: BTreeMap::new(),
            item: String::new(),
            ability: String::new(),
            unknown: true,
            trapped: false,
        }
    }
}

impl Pokemon {
    pub fn health_fraction(&self) -> f32 {
        if self.max_health <= 0.0 {
            return 0.0;
        }
        (self.health / self.max_health).clamp(0.0, 1.0)
    }

    pub fn is_fainted(&self) -> bool {
        !self.unknown && (self.health <= 0.0 || self.has_condition("fnt"))
    }

    pub fn has_condition(&self, condition: &str) -> bool {
        self.conditions.iter().any(|c| c == condition)
    }

    pub fn add_condition(&mut self, condition: &str) {
        if !self.has_condition(condition) {
            self.conditions.push(condition.to_string());
        }
    }

    pub fn remove_condition(&mut self, condition: &str) {
        self.conditions.retain(|c| c != condition);
    }

    pub fn find_move(&self, key: &str) -> Option<&Move> {
        self.moves.iter().find(|m| m.matches(key))
    }

    pub fn display_name(&self) -> &str {
        if self.unknown {
            "???"
        } else if !self.name.is_empty() {
            &self.name
        } else {
            &self.species
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trainer {
    pub name: String,
    pub pokemon: Vec<Pokemon>,
}

impl Default for Trainer {
    fn default() -> Self {
        Self {
            name: String::new(),
            pokemon: vec![Pokemon::default(); TEAM_SIZE],
        }
    }
}

impl Trainer {
    /// Index 0 is always the Pokémon on the field.
    pub fn active(&self) -> &Pokemon {
        &self.pokemon[0]
    }

    pub fn active_mut(&mut self) -> &mut Pokemon {
        &mut self.pokemon[0]
    }

    pub fn position(&self, name: &str, species: &str) -> Option<usize> {
        self.pokemon.iter().position(|p| {
            !p.unknown && ((!species.is_empty() && p.species == species) || p.name == name)
        })
    }

    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.pokemon.iter().position(|p| !p.unknown && p.name == name)
    }

    pub fn first_unknown(&self) -> Option<usize> {
        self.pokemon.iter().position(|p| p.unknown)
    }

    /// Swaps the Pokémon at `index` onto the field, the way the server
    /// reorders a side on a switch.
    pub fn swap_to_front(&mut self, index: usize) {
        if index < self.pokemon.len() {
            self.pokemon.swap(0, index);
        }
    }

    /// Sum of health fractions, the quantity reward shaping compares between steps.
    pub fn total_health(&self) -> f32 {
        self.pokemon.iter().map(Pokemon::health_fraction).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleOutcome {
    #[default]
    Init,
    Ongoing,
    Win,
    Loss,
    Tie,
}

impl BattleOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BattleOutcome::Win | BattleOutcome::Loss | BattleOutcome::Tie)
    }
}

impl fmt::Display for BattleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BattleOutcome::Init => "init",
            BattleOutcome::Ongoing => "ongoing",
            BattleOutcome::Win => "win",
            BattleOutcome::Loss => "loss",
            BattleOutcome::Tie => "tie",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Attack(usize),
    Switch(usize),
}

impl Action {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            i if i < MOVE_SLOTS => Some(Action::Attack(i)),
            i if i < ACTION_COUNT => Some(Action::Switch(i - MOVE_SLOTS)),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        match *self {
            Action::Attack(slot) => slot,
            Action::Switch(slot) => MOVE_SLOTS + slot,
        }
    }

    /// Choice command as the server expects it; slots are 1-based on the wire.
    pub fn command(&self) -> String {
        match *self {
            Action::Attack(slot) => format!("/move {}", slot + 1),
            Action::Switch(slot) => format!("/switch {}", slot + 1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub player: Trainer,
    pub opponent: Trainer,
    pub turn: u32,
    pub outcome: BattleOutcome,
    pub forfeited: bool,
    pub weather: Option<String>,
    pub force_switch: bool,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_terminal()
    }

    pub fn valid_actions(&self) -> Vec<Action> {
        let mut actions = Vec::new();
        let active = self.player.active();

        if !self.force_switch {
            if active.moves.is_empty() {
                // no request seen yet; the first slot always exists
                actions.push(Action::Attack(0));
            } else {
                actions.extend(
                    active
                        .moves
                        .iter()
                        .take(MOVE_SLOTS)
                        .enumerate()
                        .filter(|(_, m)| !m.disabled)
                        .map(|(slot, _)| Action::Attack(slot)),
                );
            }
        }

        if self.force_switch || !active.trapped {
            actions.extend(
                self.player
                    .pokemon
                    .iter()
                    .enumerate()
                    .skip(1)
                    .filter(|(_, p)| !p.unknown && !p.is_fainted())
                    .map(|(slot, _)| Action::Switch(slot)),
            );
        }

        actions
    }

    pub fn action_mask(&self) -> [bool; ACTION_COUNT] {
        let mut mask = [false; ACTION_COUNT];
        for action in self.valid_actions() {
            mask[action.index()] = true;
        }
        mask
    }

    pub fn is_valid(&self, action: Action) -> bool {
        self.valid_actions().contains(&action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Watch in the browser client; the environment cannot draw it itself.
    Human,
    Ansi,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    pub turn: u32,
    pub outcome: BattleOutcome,
    pub forfeited: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step<O> {
    pub observation: O,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}
