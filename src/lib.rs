pub mod commentary;
pub mod config;
pub mod game;
pub mod log;

use gloo_timers::future::TimeoutFuture;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::{Function, Promise};

pub use commentary::{CommentaryConfig, CommentaryError};
pub use config::{ConfigError, MatchConfig};
pub use game::{
    AssemblyAction, BattleSession, CellConfig, GameEvent, GamePhase, GameState, MatchView,
    NodeId, PlayCardAction, RuleEngine, RuleError, SessionUpdate, Side, Team, Trilingual,
    WiringAction,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn to_js_error<E: serde::Serialize>(error: E) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn side(index: u8) -> Result<Side, JsValue> {
    Side::from_index(index).ok_or_else(|| to_js_error(RuleError::UnknownTeam { index }))
}

fn update_json(outcome: Result<SessionUpdate, RuleError>) -> Result<String, JsValue> {
    let update = outcome.map_err(to_js_error)?;
    serde_json::to_string(&update).map_err(serde_to_js_error)
}

/// Browser handle on one battle session. Intents return the resulting
/// `SessionUpdate` as JSON and throw the serialized `RuleError` on misuse.
#[wasm_bindgen]
pub struct GameEngine {
    session: BattleSession,
    commentary: CommentaryConfig,
}

#[wasm_bindgen]
impl GameEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<GameEngine, JsValue> {
        let config = match config_json {
            Some(json) => MatchConfig::from_json(&json).map_err(to_js_error)?,
            None => MatchConfig::default(),
        };
        Ok(GameEngine {
            session: BattleSession::new(config),
            commentary: CommentaryConfig::default(),
        })
    }

    /// Full state JSON. Throws `InvalidPhase` while meter readings are hidden.
    pub fn state_json(&self) -> Result<String, JsValue> {
        let state = self.session.revealed_state().map_err(to_js_error)?;
        serde_json::to_string(state).map_err(serde_to_js_error)
    }

    pub fn view_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.view()).map_err(serde_to_js_error)
    }

    pub fn instruction_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.instruction()).map_err(serde_to_js_error)
    }

    pub fn start_game(&mut self, team_a: &str, team_b: &str) -> Result<String, JsValue> {
        update_json(self.session.start_game(team_a, team_b))
    }

    pub fn reveal_hand(&mut self, team: u8) -> Result<String, JsValue> {
        let team = side(team)?;
        update_json(self.session.reveal_hand(team))
    }

    pub fn draw(&mut self, team: u8) -> Result<String, JsValue> {
        let team = side(team)?;
        update_json(self.session.draw(team))
    }

    pub fn stage_assembly_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: AssemblyAction =
            serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        update_json(self.session.stage_assembly(action))
    }

    pub fn submit_assembly_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: AssemblyAction =
            serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        update_json(self.session.submit_assembly(action))
    }

    pub fn update_wiring_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: WiringAction = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        update_json(self.session.update_wiring(action))
    }

    /// `from` and `to` are terminal names such as `"v_pos"` or `"c1_L"`.
    pub fn connect(&mut self, team: u8, from: JsValue, to: JsValue) -> Result<String, JsValue> {
        let team = side(team)?;
        let from: NodeId = from_value(from).map_err(JsValue::from)?;
        let to: NodeId = from_value(to).map_err(JsValue::from)?;
        update_json(self.session.connect(team, from, to))
    }

    pub fn disconnect(&mut self, team: u8, from: JsValue, to: JsValue) -> Result<String, JsValue> {
        let team = side(team)?;
        let from: NodeId = from_value(from).map_err(JsValue::from)?;
        let to: NodeId = from_value(to).map_err(JsValue::from)?;
        update_json(self.session.disconnect(team, from, to))
    }

    pub fn confirm_wiring(&mut self, team: u8) -> Result<String, JsValue> {
        let team = side(team)?;
        update_json(self.session.confirm_wiring(team))
    }

    pub fn draw_chance_cards(&mut self) -> Result<String, JsValue> {
        update_json(self.session.draw_chance_cards())
    }

    pub fn play_card_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: PlayCardAction =
            serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        update_json(self.session.play_card(action))
    }

    pub fn skip(&mut self) -> Result<String, JsValue> {
        update_json(self.session.skip())
    }

    pub fn next_round(&mut self) -> Result<String, JsValue> {
        update_json(self.session.next_round())
    }

    pub fn tick(&mut self, seconds: u32) -> Result<String, JsValue> {
        update_json(self.session.tick(seconds))
    }

    pub fn expire(&mut self, epoch: u32) -> Result<String, JsValue> {
        update_json(self.session.expire(epoch))
    }

    pub fn reset(&mut self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.reset()).map_err(serde_to_js_error)
    }

    /// Resolves with the epoch the current countdown was armed under once it
    /// runs out, or with `null` when the phase is untimed. Feed the value to
    /// `expire`.
    pub fn wait_for_deadline(&self) -> Promise {
        let clock = self.session.state().clock.clone();
        future_to_promise(async move {
            match clock.remaining {
                Some(seconds) => {
                    TimeoutFuture::new(seconds.saturating_mul(1000)).await;
                    Ok(JsValue::from(clock.epoch))
                }
                None => Ok(JsValue::NULL),
            }
        })
    }

    /// Calls `callback` with every update after it is applied.
    pub fn subscribe(&mut self, callback: Function) {
        self.session.subscribe(move |update: &SessionUpdate| {
            let payload = match to_value(update) {
                Ok(payload) => payload,
                Err(error) => {
                    log::warn_line(&format!("[voltage-duel] update not sent: {error}"));
                    return;
                }
            };
            if let Err(error) = callback.call1(&JsValue::NULL, &payload) {
                log::warn_line(&format!("[voltage-duel] subscriber threw: {error:?}"));
            }
        });
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.commentary = self.commentary.clone().with_api_key(api_key);
    }

    /// Resolves with a `{zh, en, ja}` instruction, falling back to the local
    /// table when the service cannot be reached.
    pub fn generate_commentary(&self, last_action: String) -> Promise {
        let config = self.commentary.clone();
        let state = self.session.state();
        let teams = state.teams.clone();
        let phase = state.phase;
        let active_team = state.active_team_name();
        future_to_promise(async move {
            let text = commentary::generate_commentary(
                &config,
                &teams,
                &last_action,
                phase,
                active_team.as_deref(),
            )
            .await;
            to_value(&text).map_err(JsValue::from)
        })
    }
}

/// Solves a single team's circuit without a session.
#[wasm_bindgen(js_name = "solveCircuit")]
pub fn solve_circuit(team: JsValue) -> Result<f64, JsValue> {
    let team: Team = from_value(team).map_err(JsValue::from)?;
    Ok(game::solve(&team))
}

/// Per-cell and total working for a team's current circuit.
#[wasm_bindgen(js_name = "explainCircuit")]
pub fn explain_circuit(team: JsValue) -> Result<JsValue, JsValue> {
    let team: Team = from_value(team).map_err(JsValue::from)?;
    let log = game::explain(&team.cell1, &team.cell2, game::solve(&team));
    to_value(&log).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "phaseInstruction")]
pub fn phase_instruction(phase: JsValue, active_team: Option<String>) -> Result<JsValue, JsValue> {
    let phase: GamePhase = from_value(phase).map_err(JsValue::from)?;
    to_value(&game::phase_instruction(phase, active_team.as_deref())).map_err(JsValue::from)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
