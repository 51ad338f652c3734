//! Combat resolution - attack tables and mitigation
//!
//! The engine asks a [`CombatTable`] for the outcome of every attack and for
//! the mitigation multipliers of the defender. [`DefaultCombatTable`] is a
//! classic single-roll/two-roll table driven by [`CombatConstants`]; content
//! may install its own table with `Simulation::set_combat_table`.

mod constants;

pub use constants::CombatConstants;

use crate::types::{HitOutcome, SpellSchool};
use rand::{Rng, RngCore};

/// Which attack table row set to roll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// Single roll: miss, dodge, parry, glance, block, crit, hit
    MeleeWhite,
    /// Avoidance roll, then a separate crit roll
    MeleeSpecialHitAndCrit,
    /// Miss roll, then a separate crit roll
    RangedHitAndCrit,
    /// Spell miss (and full resist for binary spells), no crit
    MagicHit,
    MagicHitAndCrit,
    /// Never misses, may crit
    MagicCrit,
    AlwaysHit,
    /// Periodic tick that is not counted as a hit
    Tick,
    /// Periodic tick counted as a hit in metrics
    TickCounted,
    /// Periodic tick that may crit with the snapshotted crit chance
    TickSnapshotCrit,
}

impl OutcomeKind {
    pub fn is_periodic(self) -> bool {
        matches!(self, OutcomeKind::Tick | OutcomeKind::TickCounted | OutcomeKind::TickSnapshotCrit)
    }
}

/// Everything the attack table needs about one attacker/defender pair
#[derive(Debug, Clone, PartialEq)]
pub struct AttackTableInput {
    pub school: SpellSchool,
    pub attacker_level: u32,
    pub defender_level: u32,
    /// Hit bonus as a fraction (0.03 = 3%)
    pub hit_bonus: f64,
    /// Crit chance as a fraction
    pub crit_chance: f64,
    /// Defender avoidance on top of the level-based base values, as fractions
    pub dodge: f64,
    pub parry: f64,
    pub block: f64,
    /// Defender resistance to `school`
    pub resistance: f64,
    /// All-or-nothing spell: resistance turns into a full-resist chance
    pub binary: bool,
    /// White attacks from a player against an enemy may glance
    pub can_glance: bool,
}

/// Outcome and mitigation rules consulted by spells
pub trait CombatTable {
    /// Roll the table for one attack
    fn roll_outcome(&self, kind: OutcomeKind, input: &AttackTableInput, rng: &mut dyn RngCore) -> HitOutcome;

    /// Damage multiplier for a resolved outcome (avoided outcomes give 0)
    fn outcome_multiplier(&self, outcome: HitOutcome, school: SpellSchool) -> f64;

    /// Flat amount removed after multipliers
    fn flat_reduction(&self, _outcome: HitOutcome) -> f64 {
        0.0
    }

    /// Physical damage multiplier from the defender's armor
    fn armor_multiplier(&self, armor: f64, attacker_level: u32) -> f64;

    /// Average partial-resist multiplier for non-binary magic damage
    fn resistance_multiplier(&self, resistance: f64, attacker_level: u32) -> f64;
}

/// Attack table driven by [`CombatConstants`]
#[derive(Debug, Clone, Default)]
pub struct DefaultCombatTable {
    pub constants: CombatConstants,
}

impl DefaultCombatTable {
    pub fn new(constants: CombatConstants) -> Self {
        DefaultCombatTable { constants }
    }

    fn level_diff(input: &AttackTableInput) -> f64 {
        input.defender_level.saturating_sub(input.attacker_level) as f64
    }

    fn melee_miss(&self, input: &AttackTableInput) -> f64 {
        let c = &self.constants;
        (c.base_melee_miss + c.melee_miss_per_level * Self::level_diff(input) - input.hit_bonus).max(0.0)
    }

    fn dodge(&self, input: &AttackTableInput) -> f64 {
        self.constants.base_dodge + self.constants.avoidance_per_level * Self::level_diff(input) + input.dodge
    }

    fn parry(&self, input: &AttackTableInput) -> f64 {
        if !self.constants.attack_from_front {
            return 0.0;
        }
        self.constants.base_parry + self.constants.avoidance_per_level * Self::level_diff(input) + input.parry
    }

    fn block(&self, input: &AttackTableInput) -> f64 {
        if !self.constants.attack_from_front {
            return 0.0;
        }
        self.constants.base_block + self.constants.avoidance_per_level * Self::level_diff(input) + input.block
    }

    fn glance(&self, input: &AttackTableInput) -> f64 {
        if !input.can_glance {
            return 0.0;
        }
        self.constants.base_glance + self.constants.glance_per_level * Self::level_diff(input)
    }

    fn spell_miss(&self, input: &AttackTableInput) -> f64 {
        let c = &self.constants;
        let diff = input.defender_level.saturating_sub(input.attacker_level) as usize;
        let base = c
            .spell_miss_by_level
            .get(diff)
            .or_else(|| c.spell_miss_by_level.last())
            .copied()
            .unwrap_or(0.0);
        (base - input.hit_bonus).max(c.min_spell_miss)
    }

    fn binary_resist_chance(&self, input: &AttackTableInput) -> f64 {
        if !input.binary {
            return 0.0;
        }
        self.resist_fraction(input.resistance, input.attacker_level)
    }

    fn resist_fraction(&self, resistance: f64, attacker_level: u32) -> f64 {
        let cap = self.constants.resistance_per_level * attacker_level.max(1) as f64;
        (0.75 * resistance / cap).clamp(0.0, self.constants.max_resist_mitigation)
    }

    fn roll_magic_hit(&self, input: &AttackTableInput, rng: &mut dyn RngCore) -> HitOutcome {
        if rng.gen::<f64>() < self.spell_miss(input) {
            return HitOutcome::MISS;
        }
        if input.binary && rng.gen::<f64>() < self.binary_resist_chance(input) {
            return HitOutcome::RESIST;
        }
        HitOutcome::HIT
    }

    fn roll_crit(input: &AttackTableInput, rng: &mut dyn RngCore) -> bool {
        rng.gen::<f64>() < input.crit_chance
    }
}

impl CombatTable for DefaultCombatTable {
    fn roll_outcome(&self, kind: OutcomeKind, input: &AttackTableInput, rng: &mut dyn RngCore) -> HitOutcome {
        match kind {
            OutcomeKind::MeleeWhite => {
                let roll = rng.gen::<f64>();
                let mut threshold = self.melee_miss(input);
                if roll < threshold {
                    return HitOutcome::MISS;
                }
                let rows = [
                    (self.dodge(input), HitOutcome::DODGE),
                    (self.parry(input), HitOutcome::PARRY),
                    (self.glance(input), HitOutcome::GLANCE),
                    (self.block(input), HitOutcome::BLOCK),
                    (input.crit_chance, HitOutcome::CRIT),
                ];
                for (chance, outcome) in rows.iter() {
                    threshold += chance;
                    if roll < threshold {
                        return *outcome;
                    }
                }
                HitOutcome::HIT
            }
            OutcomeKind::MeleeSpecialHitAndCrit => {
                let roll = rng.gen::<f64>();
                let mut threshold = self.melee_miss(input);
                if roll < threshold {
                    return HitOutcome::MISS;
                }
                threshold += self.dodge(input);
                if roll < threshold {
                    return HitOutcome::DODGE;
                }
                threshold += self.parry(input);
                if roll < threshold {
                    return HitOutcome::PARRY;
                }
                threshold += self.block(input);
                if roll < threshold {
                    return HitOutcome::BLOCK;
                }
                if Self::roll_crit(input, rng) {
                    HitOutcome::CRIT
                } else {
                    HitOutcome::HIT
                }
            }
            OutcomeKind::RangedHitAndCrit => {
                if rng.gen::<f64>() < self.melee_miss(input) {
                    return HitOutcome::MISS;
                }
                if Self::roll_crit(input, rng) {
                    HitOutcome::CRIT
                } else {
                    HitOutcome::HIT
                }
            }
            OutcomeKind::MagicHit => self.roll_magic_hit(input, rng),
            OutcomeKind::MagicHitAndCrit => {
                let outcome = self.roll_magic_hit(input, rng);
                if outcome.landed() && Self::roll_crit(input, rng) {
                    HitOutcome::CRIT
                } else {
                    outcome
                }
            }
            OutcomeKind::MagicCrit => {
                if Self::roll_crit(input, rng) {
                    HitOutcome::CRIT
                } else {
                    HitOutcome::HIT
                }
            }
            OutcomeKind::AlwaysHit => HitOutcome::HIT,
            OutcomeKind::Tick => HitOutcome::TICK,
            OutcomeKind::TickCounted => HitOutcome::TICK | HitOutcome::HIT,
            OutcomeKind::TickSnapshotCrit => {
                if Self::roll_crit(input, rng) {
                    HitOutcome::TICK | HitOutcome::CRIT
                } else {
                    HitOutcome::TICK
                }
            }
        }
    }

    fn outcome_multiplier(&self, outcome: HitOutcome, school: SpellSchool) -> f64 {
        if !outcome.landed() {
            return 0.0;
        }
        if outcome.did_crit() {
            return if school.is_magic() {
                self.constants.spell_crit_multiplier
            } else {
                self.constants.melee_crit_multiplier
            };
        }
        if outcome.contains(HitOutcome::GLANCE) {
            return self.constants.glance_multiplier;
        }
        1.0
    }

    fn flat_reduction(&self, outcome: HitOutcome) -> f64 {
        if outcome.contains(HitOutcome::BLOCK) {
            self.constants.block_value
        } else {
            0.0
        }
    }

    fn armor_multiplier(&self, armor: f64, attacker_level: u32) -> f64 {
        let c = &self.constants;
        let armor = armor.max(0.0);
        let reduction = armor / (armor + c.armor_base + c.armor_per_level * attacker_level as f64);
        1.0 - reduction.min(c.max_armor_mitigation)
    }

    fn resistance_multiplier(&self, resistance: f64, attacker_level: u32) -> f64 {
        1.0 - self.resist_fraction(resistance, attacker_level)
    }
}
