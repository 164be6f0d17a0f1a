use crate::core::protocol::{self, apply_request, parse_health_status, parse_ident, BattleRequest};
use crate::domain::model::{BattleOutcome, GameState, Move, Pokemon};
use crate::utils::error::{EnvError, Result};

/// Follows one battle room and keeps a [`GameState`] in sync with it.
#[derive(Debug, Clone)]
pub struct BattleTracker {
    username: String,
    room_id: Option<String>,
    player_side: Option<String>,
    opponent_side: Option<String>,
    state: GameState,
    last_error: Option<String>,
    closed: bool,
    /// Set once a request described our side; its order then wins over switch lines.
    requested: bool,
}

impl BattleTracker {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            room_id: None,
            player_side: None,
            opponent_side: None,
            state: GameState::new(),
            last_error: None,
            closed: false,
            requested: false,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn opponent_name(&self) -> &str {
        &self.state.opponent.name
    }

    /// Server rejection of our last choice, cleared once read.
    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// True after the server sent `deinit` for the battle room.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Forgets the current room so the next `init` starts a fresh episode.
    pub fn reset_battle(&mut self) {
        self.room_id = None;
        self.player_side = None;
        self.opponent_side = None;
        self.state = GameState::new();
        self.last_error = None;
        self.closed = false;
        self.requested = false;
    }

    /// Applies one server frame. Returns true when the agent has to act
    /// next or the battle is over.
    pub fn process(&mut self, frame: &str) -> Result<bool> {
        if self.room_id.is_none() && frame.contains("|init|battle") {
            if let Some(room) = protocol::room_id(frame) {
                tracing::info!("Joined battle room {}", room);
                self.room_id = Some(room.to_string());
            }
        }

        let Some(room) = self.room_id.as_deref() else {
            return Ok(false);
        };
        if protocol::room_id(frame) != Some(room) {
            return Ok(false);
        }
        tracing::trace!("{}", frame);

        let mut end = false;
        for line in frame.lines().skip(1) {
            let info = protocol::fields(line);
            if info.len() < 2 {
                continue;
            }
            end |= self.process_line(line, &info)?;
        }
        Ok(end)
    }

    fn process_line(&mut self, line: &str, info: &[&str]) -> Result<bool> {
        match info[1] {
            "player" if info.len() >= 4 => {
                if info[3] == self.username {
                    self.player_side = Some(info[2].to_string());
                    self.state.player.name = info[3].to_string();
                } else if !info[3].is_empty() {
                    tracing::info!("Playing against {}", info[3]);
                    self.opponent_side = Some(info[2].to_string());
                    self.state.opponent.name = info[3].to_string();
                }
            }
            "win" => {
                let winner = line.strip_prefix("|win|").unwrap_or_default();
                self.state.outcome = if winner == self.state.player.name {
                    BattleOutcome::Win
                } else {
                    BattleOutcome::Loss
                };
                tracing::info!("Battle finished: {} (winner {})", self.state.outcome, winner);
                return Ok(true);
            }
            "tie" => {
                self.state.outcome = BattleOutcome::Tie;
                tracing::info!("Battle finished in a tie");
                return Ok(true);
            }
            "turn" if info.len() >= 3 => {
                self.state.turn = info[2]
                    .parse()
                    .map_err(|_| EnvError::protocol(format!("invalid turn '{}'", info[2])))?;
                if self.state.turn == 1 {
                    self.state.outcome = BattleOutcome::Ongoing;
                }
                return Ok(true);
            }
            "request" => {
                let json = line.strip_prefix("|request|").unwrap_or_default();
                if json.is_empty() {
                    return Ok(false);
                }
                let request = BattleRequest::parse(json)?;
                if request.wait {
                    return Ok(false);
                }
                apply_request(&request, &mut self.state)?;
                self.requested |= request.side.is_some();
                if request.is_force_switch() {
                    self.state.force_switch = true;
                    return Ok(true);
                }
                self.state.force_switch = false;
            }
            "move" if info.len() >= 4 => {
                if self.is_opponent(info[2]) {
                    let active = self.state.opponent.active_mut();
                    if active.find_move(info[3]).is_none() {
                        active.moves.push(Move::with_name(info[3]));
                    }
                }
            }
            "switch" | "drag" if info.len() >= 5 => self.apply_switch(info)?,
            "-damage" | "-heal" if info.len() >= 4 => {
                if self.is_opponent(info[2]) {
                    let (health, max_health, condition) = parse_health_status(info[3])?;
                    if let Some(target) = self.opponent_pokemon(info[2])? {
                        target.health = health;
                        if let Some(max_health) = max_health {
                            target.max_health = max_health;
                        }
                        if let Some(condition) = condition {
                            target.add_condition(&condition);
                        }
                    }
                }
            }
            "-status" if info.len() >= 4 => {
                if self.is_opponent(info[2]) {
                    if let Some(target) = self.opponent_pokemon(info[2])? {
                        target.add_condition(info[3]);
                    }
                }
            }
            "-curestatus" if info.len() >= 4 => {
                if self.is_opponent(info[2]) {
                    if let Some(target) = self.opponent_pokemon(info[2])? {
                        target.remove_condition(info[3]);
                    }
                }
            }
            "faint" if info.len() >= 3 => {
                if self.is_opponent(info[2]) {
                    if let Some(target) = self.opponent_pokemon(info[2])? {
                        target.health = 0.0;
                        target.add_condition("fnt");
                    }
                }
            }
            "-weather" if info.len() >= 3 => {
                self.state.weather = match info[2] {
                    "none" | "" => None,
                    weather => Some(weather.to_string()),
                };
            }
            "-message" if info.len() >= 3 => {
                if info[2].contains("lost due to inactivity.") || info[2].contains("forfeited.") {
                    self.state.forfeited = true;
                }
            }
            "error" if info.len() >= 3 => {
                tracing::warn!("Server rejected choice: {}", info[2]);
                if info[2].starts_with("[Invalid choice]") || info[2].starts_with("[Unavailable choice]") {
                    self.last_error = Some(info[2].to_string());
                    return Ok(true);
                }
            }
            "deinit" => {
                self.closed = true;
            }
            _ => {}
        }
        Ok(false)
    }

    fn is_opponent(&self, ident: &str) -> bool {
        self.opponent_side
            .as_deref()
            .is_some_and(|side| ident.starts_with(side))
    }

    fn opponent_pokemon(&mut self, ident: &str) -> Result<Option<&mut Pokemon>> {
        let (_, name) = parse_ident(ident)?;
        match self.state.opponent.position_by_name(name) {
            Some(index) => Ok(Some(&mut self.state.opponent.pokemon[index])),
            None => {
                tracing::warn!("Unknown opponent pokemon {}", name);
                Ok(None)
            }
        }
    }

    fn apply_switch(&mut self, info: &[&str]) -> Result<()> {
        let (_, name) = parse_ident(info[2])?;
        let (species, gender) = protocol::parse_pokemon_details(info[3]);

        if self.is_opponent(info[2]) {
            let (health, max_health, status) = parse_health_status(info[4])?;
            let opponent = &mut self.state.opponent;
            let index = match opponent.position(name, &species).or_else(|| opponent.first_unknown()) {
                Some(index) => index,
                None => {
                    return Err(EnvError::protocol(format!(
                        "opponent switched in {} but all six slots are already known",
                        name
                    )))
                }
            };

            let switched_in = &mut opponent.pokemon[index];
            switched_in.unknown = false;
            switched_in.name = name.to_string();
            switched_in.species = species;
            switched_in.gender = gender;
            switched_in.health = health;
            switched_in.max_health = max_health.unwrap_or(100.0);
            if let Some(status) = status {
                switched_in.add_condition(&status);
            }
            opponent.swap_to_front(index);
        } else if !self.requested {
            let player = &mut self.state.player;
            if let Some(index) = player.position(name, &species) {
                player.swap_to_front(index);
            } else if player.active().unknown {
                // before the first request our own team is still blank
                let active = player.active_mut();
                active.unknown = false;
                active.name = name.to_string();
                active.species = species;
                active.gender = gender;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOM: &str = "battle-gen7randombattle-1";

    fn frame(lines: &[&str]) -> String {
        let mut frame = format!(">{}\n", ROOM);
        frame.push_str(&lines.join("\n"));
        frame
    }

    fn started_tracker() -> BattleTracker {
        let mut tracker = BattleTracker::new("agent");
        tracker
            .process(&frame(&[
                "|init|battle",
                "|title|agent vs. rival",
                "|player|p1|agent|1|",
                "|player|p2|rival|2|",
                "|switch|p2a: Starmie|Starmie|100/100",
            ]))
            .unwrap();
        tracker
    }

    #[test]
    fn test_init_captures_room_and_players() {
        let tracker = started_tracker();
        assert_eq!(tracker.room_id(), Some(ROOM));
        assert_eq!(tracker.state().player.name, "agent");
        assert_eq!(tracker.opponent_name(), "rival");
        assert_eq!(tracker.state().opponent.active().species, "Starmie");
        assert!(!tracker.state().opponent.active().unknown);
    }

    #[test]
    fn test_frames_for_other_rooms_are_ignored() {
        let mut tracker = started_tracker();
        let end = tracker
            .process(">battle-gen7randombattle-2\n|turn|5")
            .unwrap();
        assert!(!end);
        assert_eq!(tracker.state().turn, 0);
        assert!(!tracker.process("|updateuser| agent|1|1").unwrap());
    }

    #[test]
    fn test_turn_ends_and_starts_battle() {
        let mut tracker = started_tracker();
        assert!(tracker.process(&frame(&["|", "|turn|1"])).unwrap());
        assert_eq!(tracker.state().outcome, BattleOutcome::Ongoing);
        assert!(tracker.process(&frame(&["|turn|2"])).unwrap());
        assert_eq!(tracker.state().turn, 2);
    }

    #[test]
    fn test_opponent_switch_reveals_and_reorders() {
        let mut tracker = started_tracker();
        tracker
            .process(&frame(&[
                "|switch|p2a: Gengar|Gengar, L82, F|64/100 brn",
                "|switch|p2a: Starmie|Starmie|100/100",
            ]))
            .unwrap();
        let opponent = &tracker.state().opponent;
        assert_eq!(opponent.active().name, "Starmie");
        assert_eq!(opponent.pokemon[1].name, "Gengar");
        assert_eq!(opponent.pokemon[1].gender, crate::domain::model::Gender::Female);
        assert_eq!(opponent.pokemon[1].health, 64.0);
        assert!(opponent.pokemon[1].has_condition("brn"));
        assert_eq!(opponent.pokemon.iter().filter(|p| p.unknown).count(), 4);
    }

    #[test]
    fn test_opponent_move_damage_status() {
        let mut tracker = started_tracker();
        tracker
            .process(&frame(&[
                "|move|p2a: Starmie|Scald|p1a: Pikachu",
                "|move|p2a: Starmie|Scald|p1a: Pikachu",
                "|-damage|p2a: Starmie|55/100",
                "|-status|p2a: Starmie|par",
                "|-heal|p2a: Starmie|61/100 par|[from] item: Leftovers",
            ]))
            .unwrap();
        let starmie = tracker.state().opponent.active();
        assert_eq!(starmie.moves.len(), 1);
        assert_eq!(starmie.moves[0].name, "Scald");
        assert_eq!(starmie.health, 61.0);
        assert!(starmie.has_condition("par"));

        tracker
            .process(&frame(&["|-curestatus|p2a: Starmie|par|[msg]"]))
            .unwrap();
        assert!(!tracker.state().opponent.active().has_condition("par"));
    }

    #[test]
    fn test_own_damage_does_not_touch_opponent() {
        let mut tracker = started_tracker();
        tracker
            .process(&frame(&["|-damage|p1a: Pikachu|10/250"]))
            .unwrap();
        assert_eq!(tracker.state().opponent.active().health, 100.0);
    }

    #[test]
    fn test_faint_and_weather() {
        let mut tracker = started_tracker();
        tracker
            .process(&frame(&["|-weather|RainDance", "|faint|p2a: Starmie"]))
            .unwrap();
        assert_eq!(tracker.state().weather.as_deref(), Some("RainDance"));
        assert!(tracker.state().opponent.active().is_fainted());
        tracker.process(&frame(&["|-weather|none"])).unwrap();
        assert_eq!(tracker.state().weather, None);
    }

    #[test]
    fn test_win_loss_and_tie() {
        let mut tracker = started_tracker();
        assert!(tracker.process(&frame(&["|win|agent"])).unwrap());
        assert_eq!(tracker.state().outcome, BattleOutcome::Win);

        let mut tracker = started_tracker();
        assert!(tracker
            .process(&frame(&["|-message|agent forfeited.", "|win|rival"]))
            .unwrap());
        assert_eq!(tracker.state().outcome, BattleOutcome::Loss);
        assert!(tracker.state().forfeited);

        let mut tracker = started_tracker();
        assert!(tracker.process(&frame(&["|tie"])).unwrap());
        assert_eq!(tracker.state().outcome, BattleOutcome::Tie);
    }

    #[test]
    fn test_force_switch_request_ends_read() {
        let mut tracker = started_tracker();
        let request = r#"|request|{"forceSwitch":[true],"side":{"name":"agent","id":"p1","pokemon":[{"ident":"p1: Pikachu","details":"Pikachu, L88, M","condition":"0 fnt","active":true,"stats":{},"moves":["thunderbolt"],"item":""},{"ident":"p1: Snorlax","details":"Snorlax, L80, F","condition":"400/400","active":false,"stats":{},"moves":["bodyslam"],"item":"leftovers"}]}}"#;
        assert!(tracker.process(&frame(&[request])).unwrap());
        let state = tracker.state();
        assert!(state.force_switch);
        assert!(state.player.active().is_fainted());
        assert_eq!(
            state.valid_actions(),
            vec![crate::domain::model::Action::Switch(1)]
        );
    }

    #[test]
    fn test_wait_request_is_ignored() {
        let mut tracker = started_tracker();
        assert!(!tracker
            .process(&frame(&[r#"|request|{"wait":true,"side":{"pokemon":[]}}"#]))
            .unwrap());
        assert!(!tracker.process(&frame(&["|request|"])).unwrap());
    }

    #[test]
    fn test_invalid_choice_error() {
        let mut tracker = started_tracker();
        assert!(tracker
            .process(&frame(&["|error|[Invalid choice] Can't move: Pikachu's Protect is disabled"]))
            .unwrap());
        assert!(tracker.take_error().is_some());
        assert!(tracker.take_error().is_none());
    }

    #[test]
    fn test_reset_battle() {
        let mut tracker = started_tracker();
        tracker.process(&frame(&["|deinit"])).unwrap();
        assert!(tracker.is_closed());
        tracker.reset_battle();
        assert_eq!(tracker.room_id(), None);
        assert!(!tracker.is_closed());
        assert!(tracker.state().opponent.active().unknown);
    }

    fn team_request(names: &[&str]) -> String {
        let pokemon: Vec<String> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                format!(
                    r#"{{"ident":"p1: {0}","details":"{0}, L80","condition":"100/100","active":{1},"stats":{{}},"moves":["tackle"],"item":""}}"#,
                    name,
                    i == 0
                )
            })
            .collect();
        format!(
            r#"|request|{{"active":[{{"moves":[{{"move":"Tackle","id":"tackle","pp":35,"maxpp":35}}]}}],"side":{{"pokemon":[{}]}}}}"#,
            pokemon.join(",")
        )
    }

    fn player_order(tracker: &BattleTracker) -> Vec<&str> {
        tracker.state().player.pokemon[..4]
            .iter()
            .map(|p| p.name.as_str())
            .collect()
    }

    #[test]
    fn test_own_switch_and_drag_keep_request_order() {
        let mut tracker = started_tracker();
        tracker
            .process(&frame(&[&team_request(&["Pikachu", "Abra", "Bulbasaur", "Gengar"])]))
            .unwrap();
        tracker
            .process(&frame(&[&team_request(&["Bulbasaur", "Abra", "Gengar", "Pikachu"])]))
            .unwrap();
        assert!(tracker
            .process(&frame(&[
                "|",
                "|switch|p1a: Gengar|Gengar, L80|100/100",
                "|move|p2a: Starmie|Roar|p1a: Gengar",
                "|drag|p1a: Bulbasaur|Bulbasaur, L80|100/100",
                "|turn|2",
            ]))
            .unwrap());

        assert_eq!(player_order(&tracker), vec!["Bulbasaur", "Abra", "Gengar", "Pikachu"]);
        assert_eq!(
            crate::domain::model::Action::Switch(2).command(),
            "/switch 3"
        );
        assert_eq!(tracker.state().player.pokemon[2].name, "Gengar");
    }

    #[test]
    fn test_own_switch_before_first_request_fills_active() {
        let mut tracker = started_tracker();
        tracker
            .process(&frame(&["|switch|p1a: Pikachu|Pikachu, L88, M|100/100"]))
            .unwrap();
        let active = tracker.state().player.active();
        assert_eq!(active.name, "Pikachu");
        assert!(!active.unknown);
    }

    #[test]
    fn test_opponent_drag_swaps_into_active_slot() {
        let mut tracker = started_tracker();
        tracker
            .process(&frame(&[
                "|switch|p2a: Gengar|Gengar, L82, F|100/100",
                "|drag|p2a: Snorlax|Snorlax, L80|90/100",
            ]))
            .unwrap();
        let opponent = &tracker.state().opponent;
        assert_eq!(opponent.active().name, "Snorlax");
        assert_eq!(opponent.active().health, 90.0);
        assert_eq!(opponent.pokemon[1].name, "Starmie");
        assert_eq!(opponent.pokemon[2].name, "Gengar");
    }

    #[test]
    fn test_opponent_overflow_is_protocol_error() {
        let mut tracker = started_tracker();
        let lines: Vec<String> = ["Gengar", "Snorlax", "Abra", "Tauros", "Chansey"]
            .iter()
            .map(|name| format!("|switch|p2a: {0}|{0}|100/100", name))
            .collect();
        let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
        tracker.process(&frame(&lines)).unwrap();
        assert!(tracker.state().opponent.first_unknown().is_none());

        let result = tracker.process(&frame(&["|switch|p2a: Zoroark|Zoroark|100/100"]));
        assert!(matches!(result, Err(EnvError::ProtocolError { .. })));
    }

    #[test]
    fn test_unavailable_choice_error() {
        let mut tracker = started_tracker();
        assert!(tracker
            .process(&frame(&["|error|[Unavailable choice] Can't switch: The active Pokémon is trapped"]))
            .unwrap());
        assert!(tracker
            .take_error()
            .is_some_and(|e| e.starts_with("[Unavailable choice]")));

        assert!(!tracker
            .process(&frame(&["|error|[Something else] not a choice problem"]))
            .unwrap());
        assert!(tracker.take_error().is_none());
    }

    #[test]
    fn test_maybe_trapped_request_blocks_switches() {
        let mut tracker = started_tracker();
        let request = team_request(&["Pikachu", "Abra"])
            .replace(r#"}]}],"side""#, r#"}],"maybeTrapped":true}],"side""#);
        tracker.process(&frame(&[&request])).unwrap();
        assert!(tracker.state().player.active().trapped);
        assert_eq!(
            tracker.state().valid_actions(),
            vec![crate::domain::model::Action::Attack(0)]
        );
    }

    #[test]
    fn test_inactivity_loss_marks_forfeit() {
        let mut tracker = started_tracker();
        assert!(tracker
            .process(&frame(&[
                "|-message|agent lost due to inactivity.",
                "|win|rival",
            ]))
            .unwrap());
        assert!(tracker.state().forfeited);
        assert_eq!(tracker.state().outcome, BattleOutcome::Loss);
    }
}
