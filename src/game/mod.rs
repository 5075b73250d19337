//! Battery duel core: chemistry, circuit solving and the round state machine.

pub mod chemistry;
pub mod circuit;
pub mod clock;
pub mod deck;
pub mod effects;
pub mod instructions;
pub mod rules;
pub mod session;
pub mod state;

pub use chemistry::{cell_voltage, round2, Metal};
pub use circuit::{
    check_wire, explain, solve, CalculationLog, CircuitGraph, ConnectionType, NodeId, Wire,
    WireRejection,
};
pub use clock::PhaseClock;
pub use effects::{ChanceCard, ChanceCardId, ChanceKind, Effect, EffectPayload, TargetScope};
pub use instructions::{phase_instruction, Trilingual};
pub use rules::{AssemblyAction, PlayCardAction, RuleEngine, RuleError, WiringAction};
pub use session::{BattleSession, MatchView, SessionUpdate, TeamView, VoltageReading};
pub use state::{
    ActionRule, BattleSummary, CellConfig, CellId, GameEvent, GamePhase, GameState,
    HistorySnapshot, Side, Slot, Team, TeamStatus,
};
