//! Stat sheet for simulated units
//!
//! - `Stats`: fixed-size array of stat values indexed by [`Stat`]
//! - `StatValue`: per-stat accumulator used while recomputing derived stats
//! - `StatDependencyManager`: dynamically enabled derived-stat formulas

mod dependency;
mod stat_value;

pub use dependency::{DependencyKind, StatDependency, StatDependencyId, StatDependencyManager};
pub use stat_value::StatValue;

use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// A single character stat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stat {
    Strength,
    Agility,
    Stamina,
    Intellect,
    Spirit,
    AttackPower,
    RangedAttackPower,
    SpellPower,
    HealingPower,
    MeleeHit,
    MeleeCrit,
    SpellHit,
    SpellCrit,
    Armor,
    BonusArmor,
    Health,
    Mana,
    MP5,
    Defense,
    Dodge,
    Parry,
    Block,
    ArcaneResistance,
    FireResistance,
    FrostResistance,
    NatureResistance,
    ShadowResistance,
}

impl Stat {
    pub const COUNT: usize = 27;

    /// Get all stats in index order
    pub fn all() -> &'static [Stat] {
        &[
            Stat::Strength,
            Stat::Agility,
            Stat::Stamina,
            Stat::Intellect,
            Stat::Spirit,
            Stat::AttackPower,
            Stat::RangedAttackPower,
            Stat::SpellPower,
            Stat::HealingPower,
            Stat::MeleeHit,
            Stat::MeleeCrit,
            Stat::SpellHit,
            Stat::SpellCrit,
            Stat::Armor,
            Stat::BonusArmor,
            Stat::Health,
            Stat::Mana,
            Stat::MP5,
            Stat::Defense,
            Stat::Dodge,
            Stat::Parry,
            Stat::Block,
            Stat::ArcaneResistance,
            Stat::FireResistance,
            Stat::FrostResistance,
            Stat::NatureResistance,
            Stat::ShadowResistance,
        ]
    }

    /// The five primary attributes
    pub fn primary() -> &'static [Stat] {
        &[Stat::Strength, Stat::Agility, Stat::Stamina, Stat::Intellect, Stat::Spirit]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Values for every [`Stat`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats([f64; Stat::COUNT]);

impl Default for Stats {
    fn default() -> Self {
        Stats([0.0; Stat::COUNT])
    }
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(stat, value)` pairs; repeated stats are summed
    pub fn from_pairs(pairs: &[(Stat, f64)]) -> Self {
        let mut stats = Stats::default();
        for (stat, value) in pairs {
            stats[*stat] += value;
        }
        stats
    }

    /// Component-wise sum
    pub fn add(&self, other: &Stats) -> Stats {
        let mut out = *self;
        for (a, b) in out.0.iter_mut().zip(other.0.iter()) {
            *a += b;
        }
        out
    }

    /// Scale every component
    pub fn multiply(&self, factor: f64) -> Stats {
        let mut out = *self;
        for a in out.0.iter_mut() {
            *a *= factor;
        }
        out
    }

    /// Iterate over the non-zero entries
    pub fn non_zero(&self) -> impl Iterator<Item = (Stat, f64)> + '_ {
        Stat::all()
            .iter()
            .map(move |s| (*s, self.0[s.index()]))
            .filter(|(_, v)| *v != 0.0)
    }
}

impl Index<Stat> for Stats {
    type Output = f64;

    fn index(&self, stat: Stat) -> &f64 {
        &self.0[stat.index()]
    }
}

impl IndexMut<Stat> for Stats {
    fn index_mut(&mut self, stat: Stat) -> &mut f64 {
        &mut self.0[stat.index()]
    }
}
