//! Core identifiers, schools, masks and outcome flags shared across the engine

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Duration used by auras that never expire on their own
pub const NEVER_EXPIRES: Duration = Duration::MAX;

/// Index of a unit inside a simulation environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub usize);

/// Handle to an aura registered on a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuraId {
    pub unit: UnitId,
    pub index: usize,
}

/// Handle to a registered spell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpellId(pub usize);

/// Handle to a dot/hot instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DotId(pub usize);

/// Handle to a readiness timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(pub usize);

/// Handle to an exclusive effect registered on a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExclusiveEffectId {
    pub unit: UnitId,
    pub index: usize,
}

/// Game-side identity of an action (spell id plus an optional disambiguating tag)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId {
    pub spell_id: i32,
    #[serde(default)]
    pub tag: i32,
}

impl ActionId {
    pub fn spell(spell_id: i32) -> Self {
        ActionId { spell_id, tag: 0 }
    }

    pub fn with_tag(self, tag: i32) -> Self {
        ActionId { tag, ..self }
    }

    pub fn is_empty(&self) -> bool {
        self.spell_id == 0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag != 0 {
            write!(f, "{}#{}", self.spell_id, self.tag)
        } else {
            write!(f, "{}", self.spell_id)
        }
    }
}

/// Which side of the fight a unit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Player,
    Pet,
    Enemy,
}

/// Damage school of a spell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellSchool {
    Physical,
    Arcane,
    Fire,
    Frost,
    Holy,
    Nature,
    Shadow,
}

impl SpellSchool {
    pub const COUNT: usize = 7;

    /// Get all schools
    pub fn all() -> &'static [SpellSchool] {
        &[
            SpellSchool::Physical,
            SpellSchool::Arcane,
            SpellSchool::Fire,
            SpellSchool::Frost,
            SpellSchool::Holy,
            SpellSchool::Nature,
            SpellSchool::Shadow,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_magic(self) -> bool {
        self != SpellSchool::Physical
    }
}

/// How an attack is defended against; selects the attack table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefenseType {
    None,
    Magic,
    Melee,
    Ranged,
}

impl DefenseType {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Resources a unit can spend or gain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Health,
    Mana,
    Rage,
    Energy,
}

bitflags! {
    /// Category of the action that triggered an event; proc triggers filter on it.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct ProcMask: u32 {
        const MELEE_MH_AUTO         = 1 << 0;
        const MELEE_OH_AUTO         = 1 << 1;
        const MELEE_MH_SPECIAL      = 1 << 2;
        const MELEE_OH_SPECIAL      = 1 << 3;
        const RANGED_AUTO           = 1 << 4;
        const RANGED_SPECIAL        = 1 << 5;
        const SPELL_DAMAGE          = 1 << 6;
        const SPELL_HEALING         = 1 << 7;
        const PROC                  = 1 << 8;
        const SUPPRESS_EXTRA_ATTACK = 1 << 9;

        const MELEE_MH = Self::MELEE_MH_AUTO.bits() | Self::MELEE_MH_SPECIAL.bits();
        const MELEE_OH = Self::MELEE_OH_AUTO.bits() | Self::MELEE_OH_SPECIAL.bits();
        const MELEE = Self::MELEE_MH.bits() | Self::MELEE_OH.bits();
        const MELEE_WHITE_HIT = Self::MELEE_MH_AUTO.bits() | Self::MELEE_OH_AUTO.bits();
        const MELEE_SPECIAL = Self::MELEE_MH_SPECIAL.bits() | Self::MELEE_OH_SPECIAL.bits();
        const RANGED = Self::RANGED_AUTO.bits() | Self::RANGED_SPECIAL.bits();
        const WHITE_HIT = Self::MELEE_WHITE_HIT.bits() | Self::RANGED_AUTO.bits();
        const MELEE_OR_RANGED = Self::MELEE.bits() | Self::RANGED.bits();
    }
}

impl ProcMask {
    /// The empty mask, used by spells that must never trigger procs
    pub const EMPTY: ProcMask = ProcMask::empty();

    /// True if any bit is shared with `other`
    pub fn matches(self, other: ProcMask) -> bool {
        self.intersects(other)
    }
}

bitflags! {
    /// Result of an attack-table roll. Stored as flags so filters can test families at once.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct HitOutcome: u32 {
        const MISS   = 1 << 0;
        const HIT    = 1 << 1;
        const CRIT   = 1 << 2;
        const DODGE  = 1 << 3;
        const PARRY  = 1 << 4;
        const BLOCK  = 1 << 5;
        const GLANCE = 1 << 6;
        const RESIST = 1 << 7;
        const TICK   = 1 << 8;

        const LANDED = Self::HIT.bits() | Self::CRIT.bits() | Self::BLOCK.bits() | Self::GLANCE.bits() | Self::TICK.bits();
        const AVOIDED = Self::MISS.bits() | Self::DODGE.bits() | Self::PARRY.bits() | Self::RESIST.bits();
    }
}

impl HitOutcome {
    pub fn landed(self) -> bool {
        self.intersects(HitOutcome::LANDED)
    }

    pub fn did_crit(self) -> bool {
        self.contains(HitOutcome::CRIT)
    }

    /// True if any bit is shared with `filter`; an empty filter accepts everything
    pub fn matches(self, filter: HitOutcome) -> bool {
        filter.is_empty() || self.intersects(filter)
    }
}
