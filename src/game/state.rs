use serde::{Deserialize, Serialize};

use super::chemistry::{cell_voltage, Metal};
use super::circuit::{self, ConnectionType, Wire, WireRejection};
use super::clock::PhaseClock;
use super::effects::{ChanceCard, ChanceCardId};

/// One of the two competing teams. Team A always opens the build phases,
/// team B always opens the action phases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::A, Side::B];

    pub fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }

    pub fn from_index(index: u8) -> Option<Side> {
        match index {
            0 => Some(Side::A),
            1 => Some(Side::B),
            _ => None,
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CellId {
    One,
    Two,
}

impl CellId {
    pub fn number(self) -> u8 {
        match self {
            CellId::One => 1,
            CellId::Two => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Slot {
    #[serde(rename = "L")]
    Left,
    #[serde(rename = "R")]
    Right,
}

impl Slot {
    pub fn letter(self) -> char {
        match self {
            Slot::Left => 'L',
            Slot::Right => 'R',
        }
    }
}

/// Two electrode slots. An empty slot leaves the cell open.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellConfig {
    pub id: CellId,
    #[serde(default)]
    pub left: Option<Metal>,
    #[serde(default)]
    pub right: Option<Metal>,
    /// Swaps which electrode counts as left for sign and labeling.
    #[serde(default)]
    pub flipped: bool,
}

impl CellConfig {
    pub fn empty(id: CellId) -> Self {
        Self {
            id,
            left: None,
            right: None,
            flipped: false,
        }
    }

    pub fn with_metals(id: CellId, left: Metal, right: Metal) -> Self {
        Self {
            id,
            left: Some(left),
            right: Some(right),
            flipped: false,
        }
    }

    pub fn effective_left(&self) -> Option<Metal> {
        if self.flipped {
            self.right
        } else {
            self.left
        }
    }

    pub fn effective_right(&self) -> Option<Metal> {
        if self.flipped {
            self.left
        } else {
            self.right
        }
    }

    /// Signed voltage from the left terminal to the right one; `None` while open.
    pub fn voltage(&self) -> Option<f64> {
        Some(cell_voltage(self.effective_left()?, self.effective_right()?))
    }

    pub fn slot_mut(&mut self, slot: Slot) -> &mut Option<Metal> {
        match slot {
            Slot::Left => &mut self.left,
            Slot::Right => &mut self.right,
        }
    }

    pub fn metals(&self) -> impl Iterator<Item = Metal> + '_ {
        self.left.iter().chain(self.right.iter()).copied()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum TeamStatus {
    #[default]
    Active,
    Winner,
    Loser,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BattleSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_received: Option<ChanceCard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buff_applied: Option<ChanceCard>,
}

/// A team's circuit as it stood after one step of the round. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistorySnapshot {
    pub step_name: String,
    pub cell1: CellConfig,
    pub cell2: CellConfig,
    pub wires: Vec<Wire>,
    pub total_voltage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_used: Option<ChanceCard>,
}

impl HistorySnapshot {
    pub fn capture(
        team: &Team,
        step_name: impl Into<String>,
        description: Option<String>,
        card_used: Option<ChanceCard>,
    ) -> Self {
        Self {
            step_name: step_name.into(),
            cell1: team.cell1.clone(),
            cell2: team.cell2.clone(),
            wires: team.wires.clone(),
            total_voltage: team.total_voltage,
            description,
            card_used,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Team {
    pub id: Side,
    pub name: String,
    #[serde(default)]
    pub hand: Vec<Metal>,
    pub cell1: CellConfig,
    pub cell2: CellConfig,
    #[serde(default)]
    pub wires: Vec<Wire>,
    #[serde(default)]
    pub chance_hand: Vec<ChanceCard>,
    #[serde(default)]
    pub total_voltage: f64,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub status: TeamStatus,
    #[serde(default)]
    pub connection_type: ConnectionType,
    #[serde(default)]
    pub summary: BattleSummary,
    #[serde(default)]
    pub history: Vec<HistorySnapshot>,
}

impl Team {
    pub fn new(id: Side, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            hand: Vec::new(),
            cell1: CellConfig::empty(CellId::One),
            cell2: CellConfig::empty(CellId::Two),
            wires: Vec::new(),
            chance_hand: Vec::new(),
            total_voltage: 0.0,
            wins: 0,
            status: TeamStatus::Active,
            connection_type: ConnectionType::Broken,
            summary: BattleSummary::default(),
            history: Vec::new(),
        }
    }

    /// Clears everything the next round rebuilds; identity and wins survive.
    pub fn reset_for_round(&mut self) {
        let wins = self.wins;
        let name = std::mem::take(&mut self.name);
        *self = Team::new(self.id, name);
        self.wins = wins;
    }

    pub fn cell(&self, id: CellId) -> &CellConfig {
        match id {
            CellId::One => &self.cell1,
            CellId::Two => &self.cell2,
        }
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut CellConfig {
        match id {
            CellId::One => &mut self.cell1,
            CellId::Two => &mut self.cell2,
        }
    }

    /// Re-solves the circuit and refreshes the derived fields.
    pub fn recompute(&mut self) -> f64 {
        let voltage = circuit::solve(self);
        self.total_voltage = voltage;
        self.connection_type = ConnectionType::classify(
            self.cell1.voltage().unwrap_or(0.0),
            self.cell2.voltage().unwrap_or(0.0),
            voltage,
        );
        voltage
    }

    /// Every electrode the team owns, placed or not, in a stable order.
    pub fn electrode_pool(&self) -> Vec<Metal> {
        let mut pool: Vec<Metal> = self
            .hand
            .iter()
            .copied()
            .chain(self.cell1.metals())
            .chain(self.cell2.metals())
            .collect();
        pool.sort();
        pool
    }

    pub fn find_chance_card(&self, card_id: ChanceCardId) -> Option<usize> {
        self.chance_hand.iter().position(|card| card.id == card_id)
    }
}

/// Rule governing whom an action-phase card may target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionRule {
    MandatoryAttack,
    MandatoryBuff,
    Flexible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    Setup,
    Draw(Side),
    Assemble(Side),
    Wiring(Side),
    JointDraw,
    Action(Side, ActionRule),
    RoundSummary,
    GameOver,
}

/// What follows the current phase once its work is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStep {
    Next(GamePhase),
    ResolveRound,
    Terminal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GamePhase {
    #[default]
    Setup,
    ADraw,
    BDraw,
    AAssemble,
    BAssemble,
    AWiring,
    BWiring,
    JointDrawAnimation,
    #[serde(rename = "B_ACTION_1")]
    BAction1,
    #[serde(rename = "A_ACTION_1")]
    AAction1,
    #[serde(rename = "B_ACTION_2")]
    BAction2,
    #[serde(rename = "A_ACTION_2")]
    AAction2,
    #[serde(rename = "B_ACTION_3")]
    BAction3,
    #[serde(rename = "A_ACTION_3")]
    AAction3,
    RoundSummary,
    GameOver,
}

impl GamePhase {
    pub fn kind(self) -> PhaseKind {
        use ActionRule::*;
        match self {
            GamePhase::Setup => PhaseKind::Setup,
            GamePhase::ADraw => PhaseKind::Draw(Side::A),
            GamePhase::BDraw => PhaseKind::Draw(Side::B),
            GamePhase::AAssemble => PhaseKind::Assemble(Side::A),
            GamePhase::BAssemble => PhaseKind::Assemble(Side::B),
            GamePhase::AWiring => PhaseKind::Wiring(Side::A),
            GamePhase::BWiring => PhaseKind::Wiring(Side::B),
            GamePhase::JointDrawAnimation => PhaseKind::JointDraw,
            GamePhase::BAction1 => PhaseKind::Action(Side::B, MandatoryAttack),
            GamePhase::AAction1 => PhaseKind::Action(Side::A, MandatoryAttack),
            GamePhase::BAction2 => PhaseKind::Action(Side::B, MandatoryBuff),
            GamePhase::AAction2 => PhaseKind::Action(Side::A, MandatoryBuff),
            GamePhase::BAction3 => PhaseKind::Action(Side::B, Flexible),
            GamePhase::AAction3 => PhaseKind::Action(Side::A, Flexible),
            GamePhase::RoundSummary => PhaseKind::RoundSummary,
            GamePhase::GameOver => PhaseKind::GameOver,
        }
    }

    /// The transition table. `ResolveRound` branches to summary or game over.
    pub fn step(self) -> PhaseStep {
        match self {
            GamePhase::Setup => PhaseStep::Next(GamePhase::ADraw),
            GamePhase::ADraw => PhaseStep::Next(GamePhase::BDraw),
            GamePhase::BDraw => PhaseStep::Next(GamePhase::AAssemble),
            GamePhase::AAssemble => PhaseStep::Next(GamePhase::BAssemble),
            GamePhase::BAssemble => PhaseStep::Next(GamePhase::AWiring),
            GamePhase::AWiring => PhaseStep::Next(GamePhase::BWiring),
            GamePhase::BWiring => PhaseStep::Next(GamePhase::JointDrawAnimation),
            GamePhase::JointDrawAnimation => PhaseStep::Next(GamePhase::BAction1),
            GamePhase::BAction1 => PhaseStep::Next(GamePhase::AAction1),
            GamePhase::AAction1 => PhaseStep::Next(GamePhase::BAction2),
            GamePhase::BAction2 => PhaseStep::Next(GamePhase::AAction2),
            GamePhase::AAction2 => PhaseStep::Next(GamePhase::BAction3),
            GamePhase::BAction3 => PhaseStep::Next(GamePhase::AAction3),
            GamePhase::AAction3 => PhaseStep::ResolveRound,
            GamePhase::RoundSummary => PhaseStep::Next(GamePhase::ADraw),
            GamePhase::GameOver => PhaseStep::Terminal,
        }
    }

    pub fn active_side(self) -> Option<Side> {
        match self.kind() {
            PhaseKind::Draw(side)
            | PhaseKind::Assemble(side)
            | PhaseKind::Wiring(side)
            | PhaseKind::Action(side, _) => Some(side),
            PhaseKind::Setup
            | PhaseKind::JointDraw
            | PhaseKind::RoundSummary
            | PhaseKind::GameOver => None,
        }
    }

    pub fn is_timed(self) -> bool {
        !matches!(
            self.kind(),
            PhaseKind::Setup | PhaseKind::RoundSummary | PhaseKind::GameOver
        )
    }

    /// Whether meter readings may be shown to the players.
    pub fn reveals_voltage(self) -> bool {
        matches!(
            self,
            GamePhase::Setup | GamePhase::RoundSummary | GamePhase::GameOver
        )
    }
}

/// Work a player has started but not yet confirmed; committed on timeout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Draft {
    Hand {
        team: Side,
        hand: Vec<Metal>,
    },
    Assembly {
        team: Side,
        hand: Vec<Metal>,
        cell1: CellConfig,
        cell2: CellConfig,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum GameEvent {
    GameStarted {
        team_a: String,
        team_b: String,
    },
    RoundStarted {
        round: u32,
    },
    PhaseChanged {
        from: GamePhase,
        to: GamePhase,
    },
    TimedOut {
        phase: GamePhase,
    },
    HandRevealed {
        team: Side,
        hand: Vec<Metal>,
    },
    HandDrawn {
        team: Side,
        hand: Vec<Metal>,
    },
    AssemblyStaged {
        team: Side,
    },
    AssemblyLocked {
        team: Side,
    },
    WiringUpdated {
        team: Side,
        wires: Vec<Wire>,
    },
    WireRejected {
        team: Side,
        wire: Wire,
        reason: WireRejection,
    },
    WiringConfirmed {
        team: Side,
    },
    ChanceCardsDealt {
        team: Side,
        count: usize,
    },
    CardPlayed {
        actor: Side,
        target: Side,
        card: ChanceCard,
        description: String,
    },
    TurnSkipped {
        team: Side,
    },
    RoundDecided {
        #[serde(skip_serializing_if = "Option::is_none")]
        winner: Option<Side>,
        voltage_a: f64,
        voltage_b: f64,
    },
    SeriesWon {
        winner: Side,
    },
    StateChanged {
        revision: u64,
    },
}

/// The whole match: phase, both teams and bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameState {
    pub phase: GamePhase,
    pub round: u32,
    pub teams: [Team; 2],
    #[serde(default)]
    pub clock: PhaseClock,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<Draft>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub next_card_id: ChanceCardId,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            phase: GamePhase::Setup,
            round: 0,
            teams: [Team::new(Side::A, ""), Team::new(Side::B, "")],
            clock: PhaseClock::default(),
            draft: None,
            event_log: Vec::new(),
            revision: 0,
            next_card_id: 0,
        }
    }

    pub fn team(&self, side: Side) -> &Team {
        &self.teams[side.index()]
    }

    pub fn team_mut(&mut self, side: Side) -> &mut Team {
        &mut self.teams[side.index()]
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    /// Name shown in the turn banner; the joint draw belongs to both teams.
    pub fn active_team_name(&self) -> Option<String> {
        match self.phase.kind() {
            PhaseKind::JointDraw => Some("JOINT SESSION".to_string()),
            _ => self
                .phase
                .active_side()
                .map(|side| self.team(side).name.clone()),
        }
    }

    /// Moves to `to`, re-arming the clock and discarding any draft.
    pub fn enter_phase(&mut self, to: GamePhase, phase_seconds: u32) -> GameEvent {
        let from = self.phase;
        self.phase = to;
        self.draft = None;
        self.clock
            .arm(if to.is_timed() { Some(phase_seconds) } else { None });
        GameEvent::PhaseChanged { from, to }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
