//! Parsing helpers for the Showdown text protocol.
//!
//! A server frame is an optional `>ROOMID` header line followed by message
//! lines of the form `|TYPE|arg|arg...`. Battle requests arrive as
//! `|request|{json}` and describe our own side in full.

use crate::domain::model::{Gender, GameState, Move};
use crate::utils::error::{EnvError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const CHALLSTR_PREFIX: &str = "|challstr|";

/// Room a frame belongs to, taken from its `>ROOMID` header.
pub fn room_id(frame: &str) -> Option<&str> {
    let first = frame.lines().next()?;
    first.strip_prefix('>').map(str::trim)
}

/// Challenge string of a `|challstr|` line. It contains `|` itself, so it
/// runs to the end of that line.
pub fn challstr(frame: &str) -> Option<&str> {
    frame
        .lines()
        .find_map(|line| line.strip_prefix(CHALLSTR_PREFIX))
        .map(str::trim_end)
}

/// Text of a global `|popup|` line, the way the server refuses a command
/// such as `/trn` or `/search`. Battle-room frames never carry one.
pub fn popup(frame: &str) -> Option<String> {
    if room_id(frame).is_some() {
        return None;
    }
    frame
        .lines()
        .find_map(|line| line.strip_prefix("|popup|"))
        .map(|message| message.replace("||", " "))
}

/// Splits a message line into its `|`-separated fields. Index 1 is the type.
pub fn fields(line: &str) -> Vec<&str> {
    line.split('|').collect()
}

/// `"87/100 par"` → `(87.0, Some(100.0), Some("par"))`, `"0 fnt"` → `(0.0, None, Some("fnt"))`.
pub fn parse_health_status(value: &str) -> Result<(f32, Option<f32>, Option<String>)> {
    let (health, condition) = match value.split_once(' ') {
        Some((health, condition)) => (health, Some(condition.trim().to_string())),
        None => (value, None),
    };

    let (current, max) = match health.split_once('/') {
        Some((current, max)) => (current, Some(max)),
        None => (health, None),
    };

    let parse = |s: &str| {
        s.trim()
            .parse::<f32>()
            .map_err(|_| EnvError::protocol(format!("invalid health value '{}'", value)))
    };

    let max = match max {
        Some(max) => Some(parse(max)?),
        None => None,
    };
    Ok((parse(current)?, max, condition.filter(|c| !c.is_empty())))
}

/// `"Pikachu, L88, M"` → `("Pikachu", Male)`.
pub fn parse_pokemon_details(details: &str) -> (String, Gender) {
    let species = details.split(',').next().unwrap_or_default().trim().to_string();
    (species, Gender::from_details(details))
}

/// `"p2a: Pikachu"` → `("p2", "Pikachu")`. The position letter is dropped.
pub fn parse_ident(ident: &str) -> Result<(&str, &str)> {
    let (side, name) = ident
        .split_once(':')
        .ok_or_else(|| EnvError::protocol(format!("invalid pokemon ident '{}'", ident)))?;
    let side = side.get(..2).unwrap_or(side);
    Ok((side, name.trim_start()))
}

/// Requests report hidden power with its base power appended, e.g. `hiddenpowerfire60`.
pub fn sanitize_hidden_power(move_id: &str) -> &str {
    if move_id.starts_with("hiddenpower") && move_id.ends_with("60") {
        &move_id[..move_id.len() - 2]
    } else {
        move_id
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Disabled {
    Flag(bool),
    Source(String),
}

impl Default for Disabled {
    fn default() -> Self {
        Disabled::Flag(false)
    }
}

impl Disabled {
    pub fn is_disabled(&self) -> bool {
        match self {
            Disabled::Flag(flag) => *flag,
            Disabled::Source(source) => !source.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoveRequest {
    pub id: String,
    #[serde(rename = "move", default)]
    pub name: String,
    pub pp: Option<u32>,
    pub maxpp: Option<u32>,
    #[serde(default)]
    pub disabled: Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRequest {
    #[serde(default)]
    pub moves: Vec<MoveRequest>,
    #[serde(default)]
    pub trapped: bool,
    #[serde(default)]
    pub maybe_trapped: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidePokemon {
    pub ident: String,
    pub details: String,
    pub condition: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub stats: BTreeMap<String, u32>,
    #[serde(default)]
    pub moves: Vec<String>,
    #[serde(default)]
    pub item: String,
    pub ability: Option<String>,
    pub base_ability: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SideRequest {
    #[serde(default)]
    pub pokemon: Vec<SidePokemon>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRequest {
    #[serde(default)]
    pub active: Vec<ActiveRequest>,
    pub side: Option<SideRequest>,
    #[serde(default)]
    pub force_switch: Vec<bool>,
    #[serde(default)]
    pub wait: bool,
}

impl BattleRequest {
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn is_force_switch(&self) -> bool {
        self.force_switch.first().copied().unwrap_or(false)
    }
}

/// Writes our own side from a request into the game state.
///
/// Team order follows the request, which always lists the active Pokémon
/// first, so switch slots line up with `/switch N`.
pub fn apply_request(request: &BattleRequest, state: &mut GameState) -> Result<()> {
    if let Some(active) = request.active.first() {
        let st_active = state.player.active_mut();
        st_active.trapped = active.trapped || active.maybe_trapped;
        // a Pokémon locked into a move gets a single entry without pp
        st_active.moves = active
            .moves
            .iter()
            .map(|m| Move {
                id: sanitize_hidden_power(&m.id).to_string(),
                name: m.name.clone(),
                pp: m.pp,
                max_pp: m.maxpp,
                disabled: m.disabled.is_disabled() || m.pp == Some(0),
            })
            .collect();
    }

    let Some(side) = &request.side else {
        return Ok(());
    };

    for (slot, pokemon) in side.pokemon.iter().enumerate() {
        let Some(st_pokemon) = state.player.pokemon.get_mut(slot) else {
            tracing::warn!("Request lists more than {} pokemon, ignoring {}", slot, pokemon.ident);
            break;
        };

        let (_, name) = parse_ident(&pokemon.ident)?;
        let (species, gender) = parse_pokemon_details(&pokemon.details);
        let (health, max_health, status) = parse_health_status(&pokemon.condition)?;

        st_pokemon.name = name.to_string();
        st_pokemon.species = species;
        st_pokemon.gender = gender;
        st_pokemon.health = health;
        if let Some(max_health) = max_health {
            st_pokemon.max_health = max_health;
        }
        st_pokemon.conditions = status.into_iter().collect();
        st_pokemon.stats = pokemon.stats.clone();
        st_pokemon.item = pokemon.item.clone();
        st_pokemon.ability = pokemon
            .ability
            .clone()
            .or_else(|| pokemon.base_ability.clone())
            .unwrap_or_default();
        st_pokemon.unknown = false;

        if slot == 0 && request.active.is_empty() {
            st_pokemon.trapped = false;
        }
        if !pokemon.active {
            st_pokemon.trapped = false;
            let known = pokemon
                .moves
                .iter()
                .all(|id| st_pokemon.find_move(sanitize_hidden_power(id)).is_some());
            if !known || st_pokemon.moves.len() != pokemon.moves.len() {
                st_pokemon.moves = pokemon
                    .moves
                    .iter()
                    .map(|id| Move::with_id(sanitize_hidden_power(id)))
                    .collect();
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &str = r#"{"active":[{"moves":[{"move":"Thunderbolt","id":"thunderbolt","pp":24,"maxpp":24,"target":"normal","disabled":false},{"move":"Hidden Power Ice","id":"hiddenpowerice60","pp":24,"maxpp":24,"target":"normal","disabled":false},{"move":"Surf","id":"surf","pp":0,"maxpp":24,"target":"normal","disabled":false},{"move":"Protect","id":"protect","pp":16,"maxpp":16,"target":"self","disabled":"Taunt"}]}],"side":{"name":"agent","id":"p1","pokemon":[{"ident":"p1: Pikachu","details":"Pikachu, L88, M","condition":"211/250 par","active":true,"stats":{"atk":180,"def":120,"spa":170,"spd":150,"spe":250},"moves":["thunderbolt","hiddenpowerice60","surf","protect"],"baseAbility":"static","item":"lightball","pokeball":"pokeball","ability":"static"},{"ident":"p1: Snorlax","details":"Snorlax, L80, F","condition":"400/400","active":false,"stats":{"atk":250,"def":150,"spa":150,"spd":230,"spe":80},"moves":["bodyslam","rest","sleeptalk","curse"],"baseAbility":"thickfat","item":"leftovers","pokeball":"pokeball"}]},"rqid":3}"#;

    #[test]
    fn test_room_id_and_challstr() {
        assert_eq!(room_id(">battle-gen7randombattle-42\n|init|battle"), Some("battle-gen7randombattle-42"));
        assert_eq!(room_id("|updateuser| agent|1|1"), None);
        assert_eq!(challstr("|challstr|4|abcdef"), Some("4|abcdef"));
        assert_eq!(challstr("|updateuser|x"), None);
        assert_eq!(
            challstr("|challstr|4|abcdef\n|updatesearch|{\"searching\":[]}"),
            Some("4|abcdef")
        );
    }

    #[test]
    fn test_popup() {
        assert_eq!(
            popup("|popup|Your team was rejected for the following reasons:||- Pikachu is banned."),
            Some("Your team was rejected for the following reasons: - Pikachu is banned.".to_string())
        );
        assert_eq!(popup(">battle-gen7randombattle-1\n|popup|hi"), None);
        assert_eq!(popup("|updateuser| agent|1|1"), None);
    }

    #[test]
    fn test_parse_health_status() {
        assert_eq!(
            parse_health_status("87/100 par").unwrap(),
            (87.0, Some(100.0), Some("par".to_string()))
        );
        assert_eq!(
            parse_health_status("0 fnt").unwrap(),
            (0.0, None, Some("fnt".to_string()))
        );
        assert_eq!(parse_health_status("250/250").unwrap(), (250.0, Some(250.0), None));
        assert!(parse_health_status("lots/100").is_err());
    }

    #[test]
    fn test_parse_details_and_ident() {
        assert_eq!(
            parse_pokemon_details("Pikachu, L88, M"),
            ("Pikachu".to_string(), Gender::Male)
        );
        assert_eq!(
            parse_pokemon_details("Magnezone, L84"),
            ("Magnezone".to_string(), Gender::Genderless)
        );
        assert_eq!(parse_ident("p2a: Mr. Mime").unwrap(), ("p2", "Mr. Mime"));
        assert!(parse_ident("garbage").is_err());
    }

    #[test]
    fn test_sanitize_hidden_power() {
        assert_eq!(sanitize_hidden_power("hiddenpowerfire60"), "hiddenpowerfire");
        assert_eq!(sanitize_hidden_power("hiddenpowerfire"), "hiddenpowerfire");
        assert_eq!(sanitize_hidden_power("thunderbolt"), "thunderbolt");
    }

    #[test]
    fn test_apply_request_fills_own_side() {
        let request = BattleRequest::parse(REQUEST).unwrap();
        let mut state = GameState::new();
        apply_request(&request, &mut state).unwrap();

        let active = state.player.active();
        assert_eq!(active.name, "Pikachu");
        assert_eq!(active.gender, Gender::Male);
        assert_eq!(active.health, 211.0);
        assert_eq!(active.max_health, 250.0);
        assert_eq!(active.conditions, vec!["par".to_string()]);
        assert_eq!(active.ability, "static");
        assert_eq!(active.stats.get("spe"), Some(&250));
        assert!(!active.unknown);

        let ids: Vec<&str> = active.moves.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["thunderbolt", "hiddenpowerice", "surf", "protect"]);
        assert!(!active.moves[0].disabled);
        assert_eq!(active.moves[0].max_pp, Some(24));
        assert!(active.moves[2].disabled, "no pp left");
        assert!(active.moves[3].disabled, "disabled by source string");

        let bench = &state.player.pokemon[1];
        assert_eq!(bench.species, "Snorlax");
        assert_eq!(bench.ability, "thickfat");
        assert_eq!(bench.moves.len(), 4);
        assert!(state.player.pokemon[2].unknown);
    }

    #[test]
    fn test_locked_move_request() {
        let json = r#"{"active":[{"moves":[{"move":"Outrage","id":"outrage"}],"trapped":true}],"side":{"name":"agent","id":"p1","pokemon":[]}}"#;
        let request = BattleRequest::parse(json).unwrap();
        let mut state = GameState::new();
        apply_request(&request, &mut state).unwrap();

        let active = state.player.active();
        assert!(active.trapped);
        assert_eq!(active.moves.len(), 1);
        assert_eq!(active.moves[0].pp, None);
        assert!(!active.moves[0].disabled);
    }

    #[test]
    fn test_maybe_trapped_request() {
        let json = r#"{"active":[{"moves":[{"move":"Surf","id":"surf","pp":24,"maxpp":24}],"maybeTrapped":true}],"side":{"pokemon":[]}}"#;
        let request = BattleRequest::parse(json).unwrap();
        let mut state = GameState::new();
        apply_request(&request, &mut state).unwrap();
        assert!(state.player.active().trapped);
    }

    #[test]
    fn test_force_switch_and_wait_flags() {
        let request = BattleRequest::parse(r#"{"forceSwitch":[true],"side":{"pokemon":[]},"noCancel":true}"#).unwrap();
        assert!(request.is_force_switch());
        let request = BattleRequest::parse(r#"{"wait":true,"side":{"pokemon":[]}}"#).unwrap();
        assert!(request.wait);
        assert!(!request.is_force_switch());
    }
}
