//! Chance cards and the effects they apply to a team's circuit.

use serde::{Deserialize, Serialize};

use super::chemistry::Metal;
use super::state::{ActionRule, CellId, Side, Slot, Team};

pub type ChanceCardId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ChanceKind {
    SwapElectrode { metal: Metal },
    ReversePolarity,
}

/// A consumable effect card held in a team's chance hand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChanceCard {
    pub id: ChanceCardId,
    pub kind: ChanceKind,
}

impl ChanceCard {
    pub fn new(id: ChanceCardId, kind: ChanceKind) -> Self {
        Self { id, kind }
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            ChanceKind::SwapElectrode { metal } => match metal {
                Metal::Mg => "Element: Magnesium",
                Metal::Ag => "Element: Silver",
                Metal::Cu => "Element: Copper",
                Metal::Pb => "Element: Lead",
                Metal::Fe => "Element: Iron",
                Metal::Zn => "Element: Zinc",
            },
            ChanceKind::ReversePolarity => "Reverse Polarity",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TargetScope {
    #[serde(rename = "SELF")]
    Own,
    #[serde(rename = "OPPONENT")]
    Opponent,
}

/// Where on the target the card lands. Swaps need a slot, reversals do not.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectPayload {
    pub cell: CellId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<Slot>,
}

impl EffectPayload {
    pub fn slot(cell: CellId, slot: Slot) -> Self {
        Self {
            cell,
            slot: Some(slot),
        }
    }

    pub fn cell(cell: CellId) -> Self {
        Self { cell, slot: None }
    }
}

impl ActionRule {
    /// Forced targets for the mandatory turns; the flexible turn defaults to self.
    pub fn resolve_target(self, actor: Side, scope: Option<TargetScope>) -> Side {
        match self {
            ActionRule::MandatoryAttack => actor.opponent(),
            ActionRule::MandatoryBuff => actor,
            ActionRule::Flexible => match scope {
                Some(TargetScope::Opponent) => actor.opponent(),
                Some(TargetScope::Own) | None => actor,
            },
        }
    }
}

/// A card bound to its landing spot, ready to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    SwapElectrode { cell: CellId, slot: Slot, metal: Metal },
    ReversePolarity { cell: CellId },
}

impl Effect {
    /// `None` when a swap card arrives without a slot.
    pub fn bind(card: &ChanceCard, payload: EffectPayload) -> Option<Self> {
        match card.kind {
            ChanceKind::SwapElectrode { metal } => Some(Effect::SwapElectrode {
                cell: payload.cell,
                slot: payload.slot?,
                metal,
            }),
            ChanceKind::ReversePolarity => Some(Effect::ReversePolarity { cell: payload.cell }),
        }
    }

    pub fn apply(&self, team: &mut Team) {
        match *self {
            Effect::SwapElectrode { cell, slot, metal } => {
                *team.cell_mut(cell).slot_mut(slot) = Some(metal);
            }
            Effect::ReversePolarity { cell } => {
                let cell = team.cell_mut(cell);
                cell.flipped = !cell.flipped;
            }
        }
    }

    pub fn describe(&self) -> String {
        match *self {
            Effect::SwapElectrode { cell, slot, metal } => format!(
                "Swapped Cell {} {} to {metal}.",
                cell.number(),
                slot.letter()
            ),
            Effect::ReversePolarity { cell } => {
                format!("Reversed polarity of Cell {}.", cell.number())
            }
        }
    }
}
