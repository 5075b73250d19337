//! The single match object the UI talks to: intents in, updates out.

use serde::{Deserialize, Serialize};

use super::circuit::{explain, CalculationLog, ConnectionType, NodeId, Wire};
use super::chemistry::Metal;
use super::effects::ChanceCard;
use super::instructions::{phase_instruction, Trilingual};
use super::rules::{AssemblyAction, PlayCardAction, RuleEngine, RuleError, WiringAction};
use super::state::{
    BattleSummary, CellConfig, GameEvent, GamePhase, GameState, HistorySnapshot, Side, Team,
    TeamStatus,
};
use crate::config::MatchConfig;
use crate::log::{log_line, warn_line};

/// Total meter reading as the players are allowed to see it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum VoltageReading {
    Hidden,
    Volts { value: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellView {
    #[serde(flatten)]
    pub config: CellConfig,
    pub voltage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub snapshot: HistorySnapshot,
    pub calculation: CalculationLog,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamView {
    pub id: Side,
    pub name: String,
    pub hand: Vec<Metal>,
    pub cells: [CellView; 2],
    pub wires: Vec<Wire>,
    pub chance_hand: Vec<ChanceCard>,
    pub voltage: VoltageReading,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<ConnectionType>,
    pub wins: u32,
    pub status: TeamStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BattleSummary>,
    pub history: Vec<HistoryEntry>,
}

impl TeamView {
    fn of(team: &Team, revealed: bool) -> Self {
        let cell = |config: &CellConfig| CellView {
            config: config.clone(),
            voltage: config.voltage(),
        };
        let (voltage, connection_type, summary, history) = if revealed {
            let history = team
                .history
                .iter()
                .map(|snapshot| HistoryEntry {
                    calculation: explain(&snapshot.cell1, &snapshot.cell2, snapshot.total_voltage),
                    snapshot: snapshot.clone(),
                })
                .collect();
            (
                VoltageReading::Volts {
                    value: team.total_voltage,
                },
                Some(team.connection_type),
                Some(team.summary.clone()),
                history,
            )
        } else {
            (VoltageReading::Hidden, None, None, Vec::new())
        };

        Self {
            id: team.id,
            name: team.name.clone(),
            hand: team.hand.clone(),
            cells: [cell(&team.cell1), cell(&team.cell2)],
            wires: team.wires.clone(),
            chance_hand: team.chance_hand.clone(),
            voltage,
            connection_type,
            wins: team.wins,
            status: team.status,
            summary,
            history,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchView {
    pub phase: GamePhase,
    pub round: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_left: Option<u32>,
    pub clock_epoch: u32,
    pub revision: u64,
    pub teams: [TeamView; 2],
}

impl MatchView {
    pub fn of(state: &GameState) -> Self {
        let revealed = state.phase.reveals_voltage();
        Self {
            phase: state.phase,
            round: state.round,
            active_team: state.active_team_name(),
            seconds_left: state.clock.remaining,
            clock_epoch: state.clock.epoch,
            revision: state.revision,
            teams: [
                TeamView::of(&state.teams[0], revealed),
                TeamView::of(&state.teams[1], revealed),
            ],
        }
    }
}

/// Everything the UI needs after one intent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionUpdate {
    pub view: MatchView,
    pub instruction: Trilingual,
    pub events: Vec<GameEvent>,
}

type Subscriber = Box<dyn FnMut(&SessionUpdate)>;

pub struct BattleSession {
    state: GameState,
    engine: RuleEngine,
    subscribers: Vec<Subscriber>,
}

impl BattleSession {
    pub fn new(config: MatchConfig) -> Self {
        Self {
            state: GameState::new(),
            engine: RuleEngine::new(config),
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// The raw state, meter readings included, only while they may be shown.
    pub fn revealed_state(&self) -> Result<&GameState, RuleError> {
        if self.state.phase.reveals_voltage() {
            Ok(&self.state)
        } else {
            Err(RuleError::InvalidPhase {
                actual: self.state.phase,
            })
        }
    }

    pub fn config(&self) -> &MatchConfig {
        self.engine.config()
    }

    pub fn view(&self) -> MatchView {
        MatchView::of(&self.state)
    }

    pub fn instruction(&self) -> Trilingual {
        phase_instruction(self.state.phase, self.state.active_team_name().as_deref())
    }

    /// Registers a callback run after every state change.
    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(&SessionUpdate) + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Drops the match and returns to SETUP with a fresh engine. Subscribers stay.
    pub fn reset(&mut self) -> SessionUpdate {
        let config = self.engine.config().clone();
        let revision = self.state.revision;
        self.engine = RuleEngine::new(config);
        self.state = GameState::new();
        self.state.revision = revision;
        self.publish("reset", Vec::new())
    }

    fn snapshot(&self, events: Vec<GameEvent>) -> SessionUpdate {
        SessionUpdate {
            view: self.view(),
            instruction: self.instruction(),
            events,
        }
    }

    fn publish(&mut self, intent: &str, mut events: Vec<GameEvent>) -> SessionUpdate {
        self.state.revision += 1;
        let changed = GameEvent::StateChanged {
            revision: self.state.revision,
        };
        self.state.record_event(changed.clone());
        events.push(changed);

        log_line(&format!(
            "[voltage-duel] {intent}: round {} {:?} rev {}",
            self.state.round, self.state.phase, self.state.revision
        ));

        let update = self.snapshot(events);
        self.notify(&update);
        update
    }

    fn notify(&mut self, update: &SessionUpdate) {
        for subscriber in self.subscribers.iter_mut() {
            subscriber(update);
        }
    }

    fn process(
        &mut self,
        intent: &str,
        outcome: Result<Vec<GameEvent>, RuleError>,
    ) -> Result<SessionUpdate, RuleError> {
        match outcome {
            Ok(events) => Ok(self.publish(intent, events)),
            Err(error) => {
                warn_line(&format!("[voltage-duel] {intent} rejected: {error}"));
                Err(error)
            }
        }
    }

    pub fn start_game(&mut self, team_a: &str, team_b: &str) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.start_game(&mut self.state, team_a, team_b);
        self.process("start_game", outcome)
    }

    pub fn reveal_hand(&mut self, team: Side) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.reveal_hand(&mut self.state, team);
        self.process("reveal_hand", outcome)
    }

    pub fn draw(&mut self, team: Side) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.draw(&mut self.state, team);
        self.process("draw", outcome)
    }

    pub fn stage_assembly(&mut self, action: AssemblyAction) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.stage_assembly(&mut self.state, action);
        self.process("stage_assembly", outcome)
    }

    pub fn submit_assembly(&mut self, action: AssemblyAction) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.submit_assembly(&mut self.state, action);
        self.process("submit_assembly", outcome)
    }

    pub fn update_wiring(&mut self, action: WiringAction) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.update_wiring(&mut self.state, action);
        self.process("update_wiring", outcome)
    }

    pub fn connect(
        &mut self,
        team: Side,
        from: NodeId,
        to: NodeId,
    ) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.connect(&mut self.state, team, from, to);
        self.process("connect", outcome)
    }

    pub fn disconnect(
        &mut self,
        team: Side,
        from: NodeId,
        to: NodeId,
    ) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.disconnect(&mut self.state, team, from, to);
        self.process("disconnect", outcome)
    }

    pub fn confirm_wiring(&mut self, team: Side) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.confirm_wiring(&mut self.state, team);
        self.process("confirm_wiring", outcome)
    }

    pub fn draw_chance_cards(&mut self) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.draw_chance_cards(&mut self.state);
        self.process("draw_chance_cards", outcome)
    }

    pub fn play_card(&mut self, action: PlayCardAction) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.play_card(&mut self.state, action);
        self.process("play_card", outcome)
    }

    pub fn skip(&mut self) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.skip(&mut self.state);
        self.process("skip", outcome)
    }

    pub fn next_round(&mut self) -> Result<SessionUpdate, RuleError> {
        let outcome = self.engine.next_round(&mut self.state);
        self.process("next_round", outcome)
    }

    /// Counts the phase clock down. Untimed phases are left alone. A tick that
    /// only moves the countdown reaches subscribers but is not logged.
    pub fn tick(&mut self, seconds: u32) -> Result<SessionUpdate, RuleError> {
        if self.state.clock.remaining.is_none() {
            return Ok(self.snapshot(Vec::new()));
        }
        let events = self.engine.tick(&mut self.state, seconds);
        if events.is_empty() {
            let update = self.snapshot(events);
            self.notify(&update);
            return Ok(update);
        }
        Ok(self.publish("tick", events))
    }

    /// A stale epoch produces an empty update and notifies nobody.
    pub fn expire(&mut self, epoch: u32) -> Result<SessionUpdate, RuleError> {
        let events = self.engine.expire(&mut self.state, epoch);
        if events.is_empty() {
            return Ok(self.snapshot(events));
        }
        Ok(self.publish("expire", events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn session() -> BattleSession {
        BattleSession::new(MatchConfig::default().with_seed(7))
    }

    #[test]
    fn subscribers_see_each_accepted_intent_once() {
        let mut session = session();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        session.subscribe(move |update: &SessionUpdate| sink.borrow_mut().push(update.view.phase));

        session.start_game("Zinc", "Copper").expect("valid names");
        assert!(session.draw(Side::B).is_err());
        session.draw(Side::A).expect("A draws");

        assert_eq!(*seen.borrow(), vec![GamePhase::ADraw, GamePhase::BDraw]);
        assert_eq!(session.state().revision, 2);
    }

    #[test]
    fn every_update_ends_with_state_changed() {
        let mut session = session();
        let update = session.start_game("Zinc", "Copper").expect("valid names");
        assert_eq!(
            update.events.last(),
            Some(&GameEvent::StateChanged { revision: 1 })
        );
        assert_eq!(
            update.instruction.en,
            "Zinc, please click to draw your 6 half-cell components."
        );
    }

    #[test]
    fn voltage_is_hidden_during_play() {
        let mut session = session();
        session.start_game("Zinc", "Copper").expect("valid names");
        let view = session.view();
        for team in &view.teams {
            assert_eq!(team.voltage, VoltageReading::Hidden);
            assert!(team.connection_type.is_none());
            assert!(team.summary.is_none());
        }
        assert_eq!(view.seconds_left, Some(120));
        assert_eq!(view.active_team.as_deref(), Some("Zinc"));
    }

    #[test]
    fn raw_state_stays_sealed_during_play() {
        let mut session = session();
        assert!(session.revealed_state().is_ok());
        session.start_game("Zinc", "Copper").expect("valid names");
        assert_eq!(
            session.revealed_state().map(|state| state.phase),
            Err(RuleError::InvalidPhase {
                actual: GamePhase::ADraw
            })
        );
        while session.view().phase != GamePhase::RoundSummary {
            session.expire(session.view().clock_epoch).expect("expire");
        }
        let state = session.revealed_state().expect("round is over");
        assert_eq!(state.teams[0].history.len(), 4);
    }

    #[test]
    fn tick_counts_down_and_times_out() {
        let mut session = session();
        session.start_game("Zinc", "Copper").expect("valid names");
        let update = session.tick(100).expect("tick");
        assert_eq!(update.view.seconds_left, Some(20));
        assert_eq!(update.view.phase, GamePhase::ADraw);
        let update = session.tick(20).expect("tick");
        assert_eq!(update.view.phase, GamePhase::BDraw);
        assert_eq!(update.view.teams[0].hand.len(), 6);
        assert!(update
            .events
            .iter()
            .any(|event| matches!(event, GameEvent::TimedOut { phase: GamePhase::ADraw })));
    }

    #[test]
    fn countdown_ticks_do_not_grow_the_log() {
        let mut session = session();
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        session.subscribe(move |_: &SessionUpdate| *counter.borrow_mut() += 1);
        session.start_game("Zinc", "Copper").expect("valid names");
        let logged = session.state().event_log.len();
        let revision = session.state().revision;

        for _ in 0..100 {
            let update = session.tick(1).expect("tick");
            assert!(update.events.is_empty());
        }
        assert_eq!(session.view().seconds_left, Some(20));
        assert_eq!(session.state().event_log.len(), logged);
        assert_eq!(session.state().revision, revision);
        assert_eq!(*count.borrow(), 101);
    }

    #[test]
    fn stale_expire_notifies_nobody() {
        let mut session = session();
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        session.subscribe(move |_: &SessionUpdate| *counter.borrow_mut() += 1);
        session.start_game("Zinc", "Copper").expect("valid names");
        let armed = session.view().clock_epoch;
        session.draw(Side::A).expect("A draws");

        let update = session.expire(armed).expect("expire never fails");
        assert!(update.events.is_empty());
        assert_eq!(update.view.phase, GamePhase::BDraw);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn joint_draw_is_addressed_to_both_teams() {
        let mut session = session();
        session.start_game("Zinc", "Copper").expect("valid names");
        while session.view().phase != GamePhase::JointDrawAnimation {
            session.expire(session.view().clock_epoch).expect("expire");
        }
        assert_eq!(session.view().active_team.as_deref(), Some("JOINT SESSION"));
        let update = session.draw_chance_cards().expect("joint draw");
        assert_eq!(update.view.phase, GamePhase::BAction1);
        assert!(update.view.teams.iter().all(|team| team.chance_hand.len() == 3));
    }

    #[test]
    fn reset_returns_to_setup() {
        let mut session = session();
        session.start_game("Zinc", "Copper").expect("valid names");
        let update = session.reset();
        assert_eq!(update.view.phase, GamePhase::Setup);
        assert_eq!(update.view.round, 0);
        assert!(update.view.teams[0].name.is_empty());
        assert!(matches!(update.view.teams[0].voltage, VoltageReading::Volts { .. }));
    }
}
