use std::cmp::Ordering;
use std::fmt;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::chemistry::Metal;
use super::circuit::{check_wire, NodeId, Wire};
use super::deck::{deal_chance_cards, draw_electrode_hand};
use super::effects::{ChanceCardId, Effect, EffectPayload, TargetScope};
use super::state::{
    ActionRule, CellConfig, CellId, Draft, GameEvent, GamePhase, GameState, HistorySnapshot,
    PhaseKind, PhaseStep, Side, Team, TeamStatus,
};
use crate::config::MatchConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssemblyAction {
    pub team: Side,
    #[serde(default)]
    pub hand: Vec<Metal>,
    pub cell1: CellConfig,
    pub cell2: CellConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WiringAction {
    pub team: Side,
    #[serde(default)]
    pub wires: Vec<Wire>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayCardAction {
    pub actor: Side,
    pub card_id: ChanceCardId,
    #[serde(default)]
    pub target_scope: Option<TargetScope>,
    pub payload: EffectPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    GameFinished,
    UnknownTeam { index: u8 },
    MissingTeamName,
    InvalidPhase { actual: GamePhase },
    NotTeamsTurn { team: Side },
    AssemblyMismatch { team: Side },
    CardNotFound { card_id: ChanceCardId },
    MissingSlot { card_id: ChanceCardId },
    SkipNotAllowed { phase: GamePhase },
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::GameFinished => f.write_str("the series is already decided"),
            RuleError::UnknownTeam { index } => write!(f, "no team with index {index}"),
            RuleError::MissingTeamName => f.write_str("both teams need a name"),
            RuleError::InvalidPhase { actual } => write!(f, "not allowed during {actual:?}"),
            RuleError::NotTeamsTurn { team } => write!(f, "it is not team {team:?}'s turn"),
            RuleError::AssemblyMismatch { team } => {
                write!(f, "team {team:?} placed electrodes it never drew")
            }
            RuleError::CardNotFound { card_id } => write!(f, "card {card_id} is not in hand"),
            RuleError::MissingSlot { card_id } => {
                write!(f, "card {card_id} needs a slot to swap")
            }
            RuleError::SkipNotAllowed { phase } => write!(f, "{phase:?} cannot be skipped"),
        }
    }
}

impl std::error::Error for RuleError {}

/// Applies intents to a [`GameState`]. Every intent validates before it writes,
/// so a rejected intent leaves the state untouched.
pub struct RuleEngine {
    config: MatchConfig,
    rng: SmallRng,
}

impl RuleEngine {
    pub fn new(config: MatchConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self { config, rng }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    fn ensure_not_finished(state: &GameState) -> Result<(), RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        Ok(())
    }

    fn invalid_phase(state: &GameState) -> RuleError {
        if state.is_finished() {
            RuleError::GameFinished
        } else {
            RuleError::InvalidPhase {
                actual: state.phase,
            }
        }
    }

    fn ensure_draw_phase(state: &GameState, team: Side) -> Result<(), RuleError> {
        match state.phase.kind() {
            PhaseKind::Draw(side) if side == team => Ok(()),
            PhaseKind::Draw(_) => Err(RuleError::NotTeamsTurn { team }),
            _ => Err(Self::invalid_phase(state)),
        }
    }

    fn ensure_assemble_phase(state: &GameState, team: Side) -> Result<(), RuleError> {
        match state.phase.kind() {
            PhaseKind::Assemble(side) if side == team => Ok(()),
            PhaseKind::Assemble(_) => Err(RuleError::NotTeamsTurn { team }),
            _ => Err(Self::invalid_phase(state)),
        }
    }

    fn ensure_wiring_phase(state: &GameState, team: Side) -> Result<(), RuleError> {
        match state.phase.kind() {
            PhaseKind::Wiring(side) if side == team => Ok(()),
            PhaseKind::Wiring(_) => Err(RuleError::NotTeamsTurn { team }),
            _ => Err(Self::invalid_phase(state)),
        }
    }

    fn ensure_action_phase(state: &GameState, actor: Side) -> Result<ActionRule, RuleError> {
        match state.phase.kind() {
            PhaseKind::Action(side, rule) if side == actor => Ok(rule),
            PhaseKind::Action(_, _) => Err(RuleError::NotTeamsTurn { team: actor }),
            _ => Err(Self::invalid_phase(state)),
        }
    }

    fn push(state: &mut GameState, events: &mut Vec<GameEvent>, event: GameEvent) {
        state.record_event(event.clone());
        events.push(event);
    }

    fn enter(&self, state: &mut GameState, to: GamePhase, events: &mut Vec<GameEvent>) {
        let event = state.enter_phase(to, self.config.phase_seconds);
        Self::push(state, events, event);
    }

    /// Follows the transition table out of the current phase.
    fn advance(&mut self, state: &mut GameState, events: &mut Vec<GameEvent>) {
        match state.phase.step() {
            PhaseStep::Next(next) => self.enter(state, next, events),
            PhaseStep::ResolveRound => self.resolve_round(state, events),
            PhaseStep::Terminal => {}
        }
    }

    pub fn start_game(
        &mut self,
        state: &mut GameState,
        team_a: &str,
        team_b: &str,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if state.phase != GamePhase::Setup {
            return Err(Self::invalid_phase(state));
        }
        let (team_a, team_b) = (team_a.trim(), team_b.trim());
        if team_a.is_empty() || team_b.is_empty() {
            return Err(RuleError::MissingTeamName);
        }

        let mut events = Vec::new();
        state.teams[0] = Team::new(Side::A, team_a);
        state.teams[1] = Team::new(Side::B, team_b);
        state.round = 1;
        Self::push(
            state,
            &mut events,
            GameEvent::GameStarted {
                team_a: team_a.to_string(),
                team_b: team_b.to_string(),
            },
        );
        Self::push(state, &mut events, GameEvent::RoundStarted { round: 1 });
        self.advance(state, &mut events);
        Ok(events)
    }

    /// Rolls a hand and stages it without committing, so the UI can reveal it.
    /// Revealing again shows the same staged hand; there is no reroll.
    pub fn reveal_hand(
        &mut self,
        state: &mut GameState,
        team: Side,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_draw_phase(state, team)?;
        let hand = match &state.draft {
            Some(Draft::Hand { team: owner, hand }) if *owner == team && !hand.is_empty() => {
                hand.clone()
            }
            _ => {
                let hand = self.roll_hand();
                state.draft = Some(Draft::Hand {
                    team,
                    hand: hand.clone(),
                });
                hand
            }
        };
        let mut events = Vec::new();
        Self::push(state, &mut events, GameEvent::HandRevealed { team, hand });
        Ok(events)
    }

    /// Commits the revealed hand, or a fresh one when nothing was revealed.
    pub fn draw(&mut self, state: &mut GameState, team: Side) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_draw_phase(state, team)?;
        let mut events = Vec::new();
        self.commit_draw(state, team, &mut events);
        Ok(events)
    }

    fn roll_hand(&mut self) -> Vec<Metal> {
        draw_electrode_hand(
            &mut self.rng,
            self.config.hand_size,
            self.config.max_duplicate_metals,
        )
    }

    fn commit_draw(&mut self, state: &mut GameState, team: Side, events: &mut Vec<GameEvent>) {
        let staged = match state.draft.take() {
            Some(Draft::Hand { team: owner, hand }) if owner == team && !hand.is_empty() => {
                Some(hand)
            }
            _ => None,
        };
        let hand = staged.unwrap_or_else(|| self.roll_hand());
        state.team_mut(team).hand = hand.clone();
        Self::push(state, events, GameEvent::HandDrawn { team, hand });
        self.advance(state, events);
    }

    fn validate_assembly(state: &GameState, action: &AssemblyAction) -> Result<(), RuleError> {
        let mut submitted: Vec<Metal> = action
            .hand
            .iter()
            .copied()
            .chain(action.cell1.metals())
            .chain(action.cell2.metals())
            .collect();
        submitted.sort();
        if submitted != state.team(action.team).electrode_pool() {
            return Err(RuleError::AssemblyMismatch { team: action.team });
        }
        Ok(())
    }

    fn normalized_cells(action: &AssemblyAction) -> (CellConfig, CellConfig) {
        let mut cell1 = action.cell1.clone();
        let mut cell2 = action.cell2.clone();
        cell1.id = CellId::One;
        cell2.id = CellId::Two;
        (cell1, cell2)
    }

    /// Records work in progress that a timeout will commit.
    pub fn stage_assembly(
        &mut self,
        state: &mut GameState,
        action: AssemblyAction,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_assemble_phase(state, action.team)?;
        Self::validate_assembly(state, &action)?;
        let (cell1, cell2) = Self::normalized_cells(&action);
        state.draft = Some(Draft::Assembly {
            team: action.team,
            hand: action.hand,
            cell1,
            cell2,
        });
        let mut events = Vec::new();
        Self::push(
            state,
            &mut events,
            GameEvent::AssemblyStaged { team: action.team },
        );
        Ok(events)
    }

    pub fn submit_assembly(
        &mut self,
        state: &mut GameState,
        action: AssemblyAction,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_assemble_phase(state, action.team)?;
        Self::validate_assembly(state, &action)?;
        let (cell1, cell2) = Self::normalized_cells(&action);
        let mut events = Vec::new();
        self.commit_assembly(state, action.team, action.hand, cell1, cell2, &mut events);
        Ok(events)
    }

    fn commit_assembly(
        &mut self,
        state: &mut GameState,
        team: Side,
        hand: Vec<Metal>,
        cell1: CellConfig,
        cell2: CellConfig,
        events: &mut Vec<GameEvent>,
    ) {
        let entry = state.team_mut(team);
        entry.hand = hand;
        entry.cell1 = cell1;
        entry.cell2 = cell2;
        entry.recompute();
        Self::push(state, events, GameEvent::AssemblyLocked { team });
        self.advance(state, events);
    }

    /// Replaces the team's wiring. Wires that would break a rule are dropped
    /// one by one and reported; the rest are kept.
    pub fn update_wiring(
        &mut self,
        state: &mut GameState,
        action: WiringAction,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_wiring_phase(state, action.team)?;
        let mut events = Vec::new();
        let mut accepted: Vec<Wire> = Vec::with_capacity(action.wires.len());
        for wire in action.wires {
            match check_wire(&accepted, wire, self.config.max_wires_per_node) {
                Ok(()) => accepted.push(wire),
                Err(reason) => Self::push(
                    state,
                    &mut events,
                    GameEvent::WireRejected {
                        team: action.team,
                        wire,
                        reason,
                    },
                ),
            }
        }
        let team = state.team_mut(action.team);
        team.wires = accepted.clone();
        team.recompute();
        Self::push(
            state,
            &mut events,
            GameEvent::WiringUpdated {
                team: action.team,
                wires: accepted,
            },
        );
        Ok(events)
    }

    /// Adds one wire. A rejected wire changes nothing.
    pub fn connect(
        &mut self,
        state: &mut GameState,
        team: Side,
        from: NodeId,
        to: NodeId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_wiring_phase(state, team)?;
        let wire = Wire::new(from, to);
        let mut events = Vec::new();
        match check_wire(&state.team(team).wires, wire, self.config.max_wires_per_node) {
            Ok(()) => {
                let entry = state.team_mut(team);
                entry.wires.push(wire);
                entry.recompute();
                let wires = entry.wires.clone();
                Self::push(state, &mut events, GameEvent::WiringUpdated { team, wires });
            }
            Err(reason) => Self::push(
                state,
                &mut events,
                GameEvent::WireRejected { team, wire, reason },
            ),
        }
        Ok(events)
    }

    pub fn disconnect(
        &mut self,
        state: &mut GameState,
        team: Side,
        from: NodeId,
        to: NodeId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_wiring_phase(state, team)?;
        let target = Wire::new(from, to);
        let entry = state.team_mut(team);
        entry.wires.retain(|wire| !wire.same_edge(&target));
        entry.recompute();
        let wires = entry.wires.clone();
        let mut events = Vec::new();
        Self::push(state, &mut events, GameEvent::WiringUpdated { team, wires });
        Ok(events)
    }

    pub fn confirm_wiring(
        &mut self,
        state: &mut GameState,
        team: Side,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_wiring_phase(state, team)?;
        let mut events = Vec::new();
        self.commit_wiring(state, team, &mut events);
        Ok(events)
    }

    fn commit_wiring(&mut self, state: &mut GameState, team: Side, events: &mut Vec<GameEvent>) {
        let entry = state.team_mut(team);
        let voltage = entry.recompute();
        entry.summary.initial_voltage = Some(voltage);
        let snapshot = HistorySnapshot::capture(
            entry,
            "Wiring Complete",
            Some("Initial Circuit Setup".to_string()),
            None,
        );
        entry.history.push(snapshot);
        Self::push(state, events, GameEvent::WiringConfirmed { team });
        self.advance(state, events);
    }

    pub fn draw_chance_cards(
        &mut self,
        state: &mut GameState,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if state.phase != GamePhase::JointDrawAnimation {
            return Err(Self::invalid_phase(state));
        }
        let mut events = Vec::new();
        self.deal(state, &mut events);
        Ok(events)
    }

    fn deal(&mut self, state: &mut GameState, events: &mut Vec<GameEvent>) {
        let count = self.config.chance_cards_per_team;
        for side in Side::ALL {
            let cards = deal_chance_cards(&mut self.rng, count, &mut state.next_card_id);
            let dealt = cards.len();
            state.team_mut(side).chance_hand = cards;
            Self::push(
                state,
                events,
                GameEvent::ChanceCardsDealt {
                    team: side,
                    count: dealt,
                },
            );
        }
        self.advance(state, events);
    }

    /// Plays a chance card. The target team's new circuit and the actor's
    /// shrunken hand are both computed before either is written back.
    pub fn play_card(
        &mut self,
        state: &mut GameState,
        action: PlayCardAction,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let actor = action.actor;
        let rule = Self::ensure_action_phase(state, actor)?;
        let card_index = state
            .team(actor)
            .find_chance_card(action.card_id)
            .ok_or(RuleError::CardNotFound {
                card_id: action.card_id,
            })?;
        let card = state.team(actor).chance_hand[card_index].clone();
        let effect = Effect::bind(&card, action.payload).ok_or(RuleError::MissingSlot {
            card_id: action.card_id,
        })?;
        let target = rule.resolve_target(actor, action.target_scope);

        let actor_name = state.team(actor).name.clone();
        let mut next_target = state.team(target).clone();
        let description = format!(
            "{actor_name} used {} on {}. {}",
            card.title(),
            next_target.name,
            effect.describe()
        );
        effect.apply(&mut next_target);
        next_target.recompute();
        match rule {
            ActionRule::MandatoryAttack => next_target.summary.attack_received = Some(card.clone()),
            ActionRule::MandatoryBuff => next_target.summary.buff_applied = Some(card.clone()),
            ActionRule::Flexible => {}
        }
        let step_name = if target == actor {
            "Self Modification".to_string()
        } else {
            format!("Attacked by {actor_name}")
        };
        let snapshot = HistorySnapshot::capture(
            &next_target,
            step_name,
            Some(description.clone()),
            Some(card.clone()),
        );
        next_target.history.push(snapshot);

        let mut next_actor_hand = if target == actor {
            next_target.chance_hand.clone()
        } else {
            state.team(actor).chance_hand.clone()
        };
        next_actor_hand.remove(card_index);

        *state.team_mut(target) = next_target;
        state.team_mut(actor).chance_hand = next_actor_hand;

        let mut events = Vec::new();
        Self::push(
            state,
            &mut events,
            GameEvent::CardPlayed {
                actor,
                target,
                card,
                description,
            },
        );
        self.advance(state, &mut events);
        Ok(events)
    }

    /// Passes the flexible turn. The mandatory turns can only lapse by timeout.
    pub fn skip(&mut self, state: &mut GameState) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_not_finished(state)?;
        match state.phase.kind() {
            PhaseKind::Action(_, ActionRule::Flexible) => {}
            PhaseKind::Action(_, _) => {
                return Err(RuleError::SkipNotAllowed { phase: state.phase })
            }
            _ => return Err(Self::invalid_phase(state)),
        }
        let mut events = Vec::new();
        self.skip_turn(state, &mut events);
        Ok(events)
    }

    fn skip_turn(&mut self, state: &mut GameState, events: &mut Vec<GameEvent>) {
        if let PhaseKind::Action(team, _) = state.phase.kind() {
            let entry = state.team_mut(team);
            let snapshot = HistorySnapshot::capture(
                entry,
                "Skipped Turn",
                Some("No changes made".to_string()),
                None,
            );
            entry.history.push(snapshot);
            Self::push(state, events, GameEvent::TurnSkipped { team });
            self.advance(state, events);
        }
    }

    /// Forces the current phase forward without player input.
    pub fn timeout(&mut self, state: &mut GameState) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if !state.phase.is_timed() {
            return events;
        }
        let phase = state.phase;
        Self::push(state, &mut events, GameEvent::TimedOut { phase });

        match phase.kind() {
            PhaseKind::Draw(team) => self.commit_draw(state, team, &mut events),
            PhaseKind::Assemble(team) => {
                let (hand, cell1, cell2) = match state.draft.take() {
                    Some(Draft::Assembly {
                        team: owner,
                        hand,
                        cell1,
                        cell2,
                    }) if owner == team => (hand, cell1, cell2),
                    _ => {
                        let current = state.team(team);
                        (
                            current.hand.clone(),
                            current.cell1.clone(),
                            current.cell2.clone(),
                        )
                    }
                };
                self.commit_assembly(state, team, hand, cell1, cell2, &mut events);
            }
            PhaseKind::Wiring(team) => self.commit_wiring(state, team, &mut events),
            PhaseKind::JointDraw => self.deal(state, &mut events),
            PhaseKind::Action(_, _) => self.skip_turn(state, &mut events),
            PhaseKind::Setup | PhaseKind::RoundSummary | PhaseKind::GameOver => {}
        }
        events
    }

    /// Advances the countdown and fires the timeout when it runs out.
    pub fn tick(&mut self, state: &mut GameState, seconds: u32) -> Vec<GameEvent> {
        if state.clock.tick(seconds) {
            self.timeout(state)
        } else {
            Vec::new()
        }
    }

    /// Deadline callback from an external timer armed under `epoch`.
    /// Stale epochs are ignored.
    pub fn expire(&mut self, state: &mut GameState, epoch: u32) -> Vec<GameEvent> {
        if !state.clock.is_current(epoch) || state.clock.remaining.is_none() {
            return Vec::new();
        }
        state.clock.remaining = Some(0);
        self.timeout(state)
    }

    /// Compares the signed meter readings. A tie marks both teams as winners
    /// and awards no point.
    fn resolve_round(&mut self, state: &mut GameState, events: &mut Vec<GameEvent>) {
        let voltage_a = state.teams[0].recompute();
        let voltage_b = state.teams[1].recompute();

        let winner = match voltage_a.partial_cmp(&voltage_b) {
            Some(Ordering::Greater) => Some(Side::A),
            Some(Ordering::Less) => Some(Side::B),
            _ => None,
        };

        for team in state.teams.iter_mut() {
            team.summary.final_voltage = Some(team.total_voltage);
            team.status = match winner {
                Some(side) if side == team.id => TeamStatus::Winner,
                Some(_) => TeamStatus::Loser,
                None => TeamStatus::Winner,
            };
        }
        if let Some(side) = winner {
            state.team_mut(side).wins += 1;
        }
        Self::push(
            state,
            events,
            GameEvent::RoundDecided {
                winner,
                voltage_a,
                voltage_b,
            },
        );

        let champion = Side::ALL
            .into_iter()
            .find(|&side| state.team(side).wins >= self.config.wins_to_take_series);
        match champion {
            Some(side) => {
                self.enter(state, GamePhase::GameOver, events);
                Self::push(state, events, GameEvent::SeriesWon { winner: side });
            }
            None => self.enter(state, GamePhase::RoundSummary, events),
        }
    }

    pub fn next_round(&mut self, state: &mut GameState) -> Result<Vec<GameEvent>, RuleError> {
        if state.phase != GamePhase::RoundSummary {
            return Err(Self::invalid_phase(state));
        }
        for team in state.teams.iter_mut() {
            team.reset_for_round();
        }
        state.event_log.clear();
        state.round += 1;
        let mut events = Vec::new();
        let round = state.round;
        Self::push(state, &mut events, GameEvent::RoundStarted { round });
        self.advance(state, &mut events);
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::effects::{ChanceCard, ChanceKind};
    use crate::game::state::Slot;

    fn engine() -> RuleEngine {
        RuleEngine::new(MatchConfig::default().with_seed(42))
    }

    fn started() -> (RuleEngine, GameState) {
        let mut engine = engine();
        let mut state = GameState::new();
        engine
            .start_game(&mut state, "Anode", "Cathode")
            .expect("names are valid");
        (engine, state)
    }

    /// Zn|Cu then Fe|Ag, chained v_neg -> cell 1 -> cell 2 -> v_pos.
    fn series_wires() -> Vec<Wire> {
        vec![
            Wire::new(NodeId::MeterNegative, NodeId::Cell1Left),
            Wire::new(NodeId::Cell1Right, NodeId::Cell2Left),
            Wire::new(NodeId::Cell2Right, NodeId::MeterPositive),
        ]
    }

    fn in_wiring_phase(phase: GamePhase) -> (RuleEngine, GameState) {
        let (engine, mut state) = started();
        for side in Side::ALL {
            let team = state.team_mut(side);
            team.hand.clear();
            team.cell1 = CellConfig::with_metals(CellId::One, Metal::Zn, Metal::Cu);
            team.cell2 = CellConfig::with_metals(CellId::Two, Metal::Fe, Metal::Ag);
        }
        state.enter_phase(phase, 120);
        (engine, state)
    }

    fn at_action_phase() -> (RuleEngine, GameState) {
        let (engine, mut state) = in_wiring_phase(GamePhase::BAction1);
        for side in Side::ALL {
            let team = state.team_mut(side);
            team.wires = series_wires();
            team.recompute();
        }
        state.team_mut(Side::B).chance_hand = vec![
            ChanceCard::new(1, ChanceKind::SwapElectrode { metal: Metal::Mg }),
            ChanceCard::new(2, ChanceKind::ReversePolarity),
        ];
        state.team_mut(Side::A).chance_hand =
            vec![ChanceCard::new(3, ChanceKind::ReversePolarity)];
        (engine, state)
    }

    #[test]
    fn start_requires_both_names() {
        let mut engine = engine();
        let mut state = GameState::new();
        assert_eq!(
            engine.start_game(&mut state, "Anode", "  "),
            Err(RuleError::MissingTeamName)
        );
        assert_eq!(state.phase, GamePhase::Setup);
    }

    #[test]
    fn draw_commits_revealed_hand() {
        let (mut engine, mut state) = started();
        let revealed = engine.reveal_hand(&mut state, Side::A).expect("A draws first");
        let hand = match &revealed[0] {
            GameEvent::HandRevealed { hand, .. } => hand.clone(),
            other => panic!("unexpected event {other:?}"),
        };
        engine.draw(&mut state, Side::A).expect("A commits");
        assert_eq!(state.team(Side::A).hand, hand);
        assert_eq!(state.phase, GamePhase::BDraw);
        assert_eq!(
            engine.draw(&mut state, Side::A),
            Err(RuleError::NotTeamsTurn { team: Side::A })
        );
    }

    #[test]
    fn revealing_twice_shows_the_same_hand() {
        let (mut engine, mut state) = started();
        let first = engine.reveal_hand(&mut state, Side::A).expect("A reveals");
        for _ in 0..5 {
            let again = engine.reveal_hand(&mut state, Side::A).expect("A reveals again");
            assert_eq!(again, first);
        }
        let staged = match &first[0] {
            GameEvent::HandRevealed { hand, .. } => hand.clone(),
            other => panic!("unexpected event {other:?}"),
        };
        engine.draw(&mut state, Side::A).expect("A commits");
        assert_eq!(state.team(Side::A).hand, staged);
    }

    #[test]
    fn next_round_starts_a_fresh_event_log() {
        let (mut engine, mut state) = at_action_phase();
        state.enter_phase(GamePhase::AAction3, 120);
        engine.timeout(&mut state);
        assert_eq!(state.phase, GamePhase::RoundSummary);
        assert!(state.event_log.len() > 2);

        let events = engine.next_round(&mut state).expect("summary leads on");
        assert_eq!(state.event_log, events);
        assert_eq!(state.event_log[0], GameEvent::RoundStarted { round: 2 });
    }

    #[test]
    fn assembly_must_come_from_the_drawn_pool() {
        let (mut engine, mut state) = started();
        engine.draw(&mut state, Side::A).expect("draw A");
        engine.draw(&mut state, Side::B).expect("draw B");
        state.team_mut(Side::A).hand = vec![
            Metal::Zn,
            Metal::Cu,
            Metal::Fe,
            Metal::Ag,
            Metal::Pb,
            Metal::Pb,
        ];

        let forged = AssemblyAction {
            team: Side::A,
            hand: vec![Metal::Pb, Metal::Pb],
            cell1: CellConfig::with_metals(CellId::One, Metal::Mg, Metal::Ag),
            cell2: CellConfig::with_metals(CellId::Two, Metal::Fe, Metal::Ag),
        };
        assert_eq!(
            engine.submit_assembly(&mut state, forged),
            Err(RuleError::AssemblyMismatch { team: Side::A })
        );

        let honest = AssemblyAction {
            team: Side::A,
            hand: vec![Metal::Pb, Metal::Pb],
            cell1: CellConfig::with_metals(CellId::One, Metal::Zn, Metal::Cu),
            cell2: CellConfig::with_metals(CellId::Two, Metal::Fe, Metal::Ag),
        };
        engine.submit_assembly(&mut state, honest).expect("pool matches");
        assert_eq!(state.phase, GamePhase::BAssemble);
        assert_eq!(state.team(Side::A).cell1.voltage(), Some(1.10));
    }

    #[test]
    fn third_wire_on_a_node_is_rejected_without_snapshot() {
        let (mut engine, mut state) = in_wiring_phase(GamePhase::AWiring);
        engine
            .connect(&mut state, Side::A, NodeId::Cell1Left, NodeId::MeterNegative)
            .expect("first");
        engine
            .connect(&mut state, Side::A, NodeId::Cell1Left, NodeId::Cell2Left)
            .expect("second");
        let before = state.team(Side::A).clone();
        let events = engine
            .connect(&mut state, Side::A, NodeId::Cell1Left, NodeId::MeterPositive)
            .expect("rejection is not an error");
        assert!(matches!(events[0], GameEvent::WireRejected { .. }));
        assert_eq!(state.team(Side::A), &before);
        assert!(state.team(Side::A).history.is_empty());
    }

    #[test]
    fn update_wiring_drops_duplicates_in_either_direction() {
        let (mut engine, mut state) = in_wiring_phase(GamePhase::AWiring);
        let mut wires = series_wires();
        wires.push(Wire::new(NodeId::Cell2Left, NodeId::Cell1Right));
        let events = engine
            .update_wiring(&mut state, WiringAction { team: Side::A, wires })
            .expect("wiring phase");
        assert_eq!(state.team(Side::A).wires, series_wires());
        assert_eq!(state.team(Side::A).total_voltage, 2.34);
        assert!(events
            .iter()
            .any(|event| matches!(event, GameEvent::WireRejected { .. })));
    }

    #[test]
    fn confirming_wiring_snapshots_and_moves_on() {
        let (mut engine, mut state) = in_wiring_phase(GamePhase::BWiring);
        engine
            .update_wiring(
                &mut state,
                WiringAction {
                    team: Side::B,
                    wires: series_wires(),
                },
            )
            .expect("wiring phase");
        engine.confirm_wiring(&mut state, Side::B).expect("confirm");
        let team = state.team(Side::B);
        assert_eq!(team.history.len(), 1);
        assert_eq!(team.history[0].step_name, "Wiring Complete");
        assert_eq!(team.summary.initial_voltage, Some(2.34));
        assert_eq!(state.phase, GamePhase::JointDrawAnimation);
    }

    #[test]
    fn attack_is_forced_onto_the_opponent() {
        let (mut engine, mut state) = at_action_phase();
        engine
            .play_card(
                &mut state,
                PlayCardAction {
                    actor: Side::B,
                    card_id: 1,
                    target_scope: Some(TargetScope::Own),
                    payload: EffectPayload::slot(CellId::One, Slot::Right),
                },
            )
            .expect("B attacks");

        let victim = state.team(Side::A);
        assert_eq!(victim.cell1.right, Some(Metal::Mg));
        let snapshot = victim.history.last().expect("snapshot recorded");
        assert_eq!(snapshot.step_name, "Attacked by Cathode");
        assert_eq!(snapshot.cell1.right, Some(Metal::Mg));
        assert_eq!(snapshot.total_voltage, victim.total_voltage);
        // Mg - Zn = -1.61, plus the untouched Fe|Ag cell.
        assert_eq!(victim.total_voltage, -0.37);
        assert_eq!(victim.summary.attack_received.as_ref().map(|c| c.id), Some(1));
        assert_eq!(state.team(Side::B).chance_hand.len(), 1);
        assert!(state.team(Side::B).history.is_empty());
        assert_eq!(state.phase, GamePhase::AAction1);
    }

    #[test]
    fn swap_without_slot_changes_nothing() {
        let (mut engine, mut state) = at_action_phase();
        let before = state.clone();
        let result = engine.play_card(
            &mut state,
            PlayCardAction {
                actor: Side::B,
                card_id: 1,
                target_scope: None,
                payload: EffectPayload::cell(CellId::One),
            },
        );
        assert_eq!(result, Err(RuleError::MissingSlot { card_id: 1 }));
        assert_eq!(state, before);
    }

    #[test]
    fn mandatory_turns_cannot_be_skipped() {
        let (mut engine, mut state) = at_action_phase();
        assert_eq!(
            engine.skip(&mut state),
            Err(RuleError::SkipNotAllowed {
                phase: GamePhase::BAction1
            })
        );
    }

    #[test]
    fn self_buff_reverses_own_cell() {
        let (mut engine, mut state) = at_action_phase();
        state.enter_phase(GamePhase::BAction2, 120);
        engine
            .play_card(
                &mut state,
                PlayCardAction {
                    actor: Side::B,
                    card_id: 2,
                    target_scope: Some(TargetScope::Opponent),
                    payload: EffectPayload::cell(CellId::Two),
                },
            )
            .expect("B buffs");
        let team = state.team(Side::B);
        assert!(team.cell2.flipped);
        assert_eq!(team.total_voltage, -0.14);
        assert_eq!(
            team.history.last().map(|s| s.step_name.as_str()),
            Some("Self Modification")
        );
        assert_eq!(team.chance_hand.len(), 1);
        assert_eq!(team.summary.buff_applied.as_ref().map(|c| c.id), Some(2));
    }

    #[test]
    fn timeouts_skip_all_six_action_turns() {
        let (mut engine, mut state) = at_action_phase();
        let voltages = [state.teams[0].total_voltage, state.teams[1].total_voltage];
        for _ in 0..6 {
            let remaining = state.clock.remaining.expect("action phases are timed");
            engine.tick(&mut state, remaining);
        }
        let snapshots: usize = state.teams.iter().map(|team| team.history.len()).sum();
        assert_eq!(snapshots, 6);
        for team in &state.teams {
            assert!(team
                .history
                .iter()
                .all(|snap| snap.step_name == "Skipped Turn"));
        }
        assert_eq!(
            [state.teams[0].total_voltage, state.teams[1].total_voltage],
            voltages
        );
        // Identical circuits tie: both marked winner, nobody scores.
        assert_eq!(state.phase, GamePhase::RoundSummary);
        assert!(state.teams.iter().all(|t| t.status == TeamStatus::Winner));
        assert!(state.teams.iter().all(|t| t.wins == 0));
    }

    #[test]
    fn stale_epoch_does_not_expire_the_new_phase() {
        let (mut engine, mut state) = started();
        let stale = state.clock.epoch;
        engine.draw(&mut state, Side::A).expect("draw");
        assert!(engine.expire(&mut state, stale).is_empty());
        assert_eq!(state.phase, GamePhase::BDraw);
        let current = state.clock.epoch;
        engine.expire(&mut state, current);
        assert_eq!(state.phase, GamePhase::AAssemble);
        assert_eq!(state.team(Side::B).hand.len(), 6);
    }

    #[test]
    fn assemble_timeout_commits_staged_draft() {
        let (mut engine, mut state) = started();
        engine.draw(&mut state, Side::A).expect("draw A");
        engine.draw(&mut state, Side::B).expect("draw B");
        let mut pool = state.team(Side::A).hand.clone();
        let cell1 = CellConfig::with_metals(CellId::One, pool.remove(0), pool.remove(0));
        engine
            .stage_assembly(
                &mut state,
                AssemblyAction {
                    team: Side::A,
                    hand: pool.clone(),
                    cell1: cell1.clone(),
                    cell2: CellConfig::empty(CellId::Two),
                },
            )
            .expect("draft is valid");
        engine.timeout(&mut state);
        assert_eq!(state.phase, GamePhase::BAssemble);
        assert_eq!(state.team(Side::A).cell1, cell1);
        assert_eq!(state.team(Side::A).hand, pool);

        engine.timeout(&mut state);
        assert_eq!(state.phase, GamePhase::AWiring);
        assert_eq!(state.team(Side::B).hand.len(), 6);
        assert_eq!(state.team(Side::B).cell1.voltage(), None);
    }

    #[test]
    fn strictly_higher_voltage_takes_the_round() {
        let (mut engine, mut state) = at_action_phase();
        state.team_mut(Side::B).cell2.flipped = true;
        state.team_mut(Side::B).recompute();
        state.enter_phase(GamePhase::AAction3, 120);
        engine.timeout(&mut state);
        assert_eq!(state.team(Side::A).wins, 1);
        assert_eq!(state.team(Side::B).wins, 0);
        assert_eq!(state.team(Side::A).status, TeamStatus::Winner);
        assert_eq!(state.team(Side::B).status, TeamStatus::Loser);
        assert_eq!(state.team(Side::A).summary.final_voltage, Some(2.34));
        assert_eq!(state.phase, GamePhase::RoundSummary);

        engine.next_round(&mut state).expect("summary leads on");
        assert_eq!(state.phase, GamePhase::ADraw);
        assert_eq!(state.round, 2);
        assert_eq!(state.team(Side::A).wins, 1);
        assert!(state.team(Side::A).history.is_empty());
    }

    #[test]
    fn second_win_ends_the_series() {
        let (mut engine, mut state) = at_action_phase();
        state.team_mut(Side::A).wins = 1;
        state.team_mut(Side::A).cell1.flipped = true;
        state.team_mut(Side::A).recompute();
        state.team_mut(Side::B).wins = 1;
        state.enter_phase(GamePhase::AAction3, 120);
        let events = engine.timeout(&mut state);
        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(state.team(Side::B).wins, 2);
        assert!(events
            .iter()
            .any(|event| *event == GameEvent::SeriesWon { winner: Side::B }));
        assert_eq!(engine.next_round(&mut state), Err(RuleError::GameFinished));
        assert!(engine.timeout(&mut state).is_empty());
    }
}
