//! Damage and healing resolution
//!
//! Direct damage runs through, in order: attacker multipliers, armor (physical)
//! or partial resistance (non-binary magic), the defender's school damage
//! taken multiplier, the attack-table roll, the outcome multiplier, the flat
//! reduction and finally the flat bonus damage taken. Periodic damage skips
//! armor. Calculation never changes state; dealing does.

use super::{SpellFlags, SpellResult};
use crate::aura::EventChannel;
use crate::combat::{AttackTableInput, OutcomeKind};
use crate::sim::{LogEntry, Simulation};
use crate::stats::Stat;
use crate::types::{DefenseType, HitOutcome, ResourceKind, SpellId, SpellSchool, UnitId};
use tracing::debug;

/// Resistance stat that mitigates `school`, if any
fn resistance_stat(school: SpellSchool) -> Option<Stat> {
    match school {
        SpellSchool::Arcane => Some(Stat::ArcaneResistance),
        SpellSchool::Fire => Some(Stat::FireResistance),
        SpellSchool::Frost => Some(Stat::FrostResistance),
        SpellSchool::Nature => Some(Stat::NatureResistance),
        SpellSchool::Shadow => Some(Stat::ShadowResistance),
        SpellSchool::Physical | SpellSchool::Holy => None,
    }
}

impl SpellId {
    /// Caster-side damage multiplier at this moment
    pub fn attacker_damage_multiplier(self, sim: &Simulation) -> f64 {
        let spell = sim.spell(self);
        let pseudo = &sim.unit(spell.unit).pseudo_stats;
        spell.damage_multiplier * pseudo.damage_dealt_multiplier * pseudo.school_damage_dealt_multiplier[spell.school.index()]
    }

    /// Caster-side healing multiplier at this moment
    pub fn attacker_healing_multiplier(self, sim: &Simulation) -> f64 {
        let spell = sim.spell(self);
        spell.damage_multiplier * sim.unit(spell.unit).pseudo_stats.healing_dealt_multiplier
    }

    /// Crit chance as a fraction: melee crit for physical attacks, spell crit otherwise
    pub fn crit_chance(self, sim: &Simulation) -> f64 {
        let spell = sim.spell(self);
        let caster = sim.unit(spell.unit);
        let stat = match spell.defense_type {
            DefenseType::Melee | DefenseType::Ranged => Stat::MeleeCrit,
            _ => Stat::SpellCrit,
        };
        caster.stat(stat) / 100.0 + spell.bonus_crit_chance
    }

    fn table_input(self, sim: &Simulation, target: UnitId, crit_chance: f64) -> AttackTableInput {
        let spell = sim.spell(self);
        let attacker = sim.unit(spell.unit);
        let defender = sim.unit(target);
        let hit_stat = match spell.defense_type {
            DefenseType::Melee | DefenseType::Ranged => Stat::MeleeHit,
            _ => Stat::SpellHit,
        };
        AttackTableInput {
            school: spell.school,
            attacker_level: attacker.level,
            defender_level: defender.level,
            hit_bonus: attacker.stat(hit_stat) / 100.0,
            crit_chance,
            dodge: defender.stat(Stat::Dodge) / 100.0,
            parry: defender.stat(Stat::Parry) / 100.0,
            block: defender.stat(Stat::Block) / 100.0,
            resistance: resistance_stat(spell.school).map_or(0.0, |s| defender.stat(s)),
            binary: spell.flags.contains(SpellFlags::BINARY),
            can_glance: !attacker.is_enemy() && defender.is_enemy(),
        }
    }

    /// Roll the attack table against `target`
    pub fn calc_outcome(self, sim: &mut Simulation, target: UnitId, kind: OutcomeKind) -> HitOutcome {
        let crit_chance = self.crit_chance(sim);
        self.roll(sim, target, kind, crit_chance)
    }

    fn roll(self, sim: &mut Simulation, target: UnitId, kind: OutcomeKind, crit_chance: f64) -> HitOutcome {
        let input = self.table_input(sim, target, crit_chance);
        let table = sim.combat_table();
        table.roll_outcome(kind, &input, sim.rng_mut())
    }

    /// Resolve direct damage against `target` without applying it
    pub fn calc_damage(self, sim: &mut Simulation, target: UnitId, base_damage: f64, kind: OutcomeKind) -> SpellResult {
        let multiplier = self.attacker_damage_multiplier(sim);
        let crit_chance = self.crit_chance(sim);
        self.resolve_damage(sim, target, base_damage * multiplier, crit_chance, kind, false)
    }

    /// Resolve periodic damage against `target` with the caster's current multipliers
    pub fn calc_periodic_damage(
        self,
        sim: &mut Simulation,
        target: UnitId,
        base_damage: f64,
        kind: OutcomeKind,
    ) -> SpellResult {
        let multiplier = self.attacker_damage_multiplier(sim);
        let crit_chance = self.crit_chance(sim);
        self.resolve_damage(sim, target, base_damage * multiplier, crit_chance, kind, true)
    }

    /// Shared damage pipeline after attacker multipliers
    pub(crate) fn resolve_damage(
        self,
        sim: &mut Simulation,
        target: UnitId,
        damage: f64,
        crit_chance: f64,
        kind: OutcomeKind,
        is_periodic: bool,
    ) -> SpellResult {
        let table = sim.combat_table();
        let (school, defense_type, flags, caster, threat_multiplier) = {
            let spell = sim.spell(self);
            (spell.school, spell.defense_type, spell.flags, spell.unit, spell.threat_multiplier)
        };
        let attacker_level = sim.unit(caster).level;

        let mut damage = damage;
        {
            let defender = sim.unit(target);
            if school == SpellSchool::Physical {
                if !is_periodic && !flags.contains(SpellFlags::IGNORE_ARMOR) {
                    damage *= table.armor_multiplier(defender.stat(Stat::Armor), attacker_level);
                }
            } else if !flags.contains(SpellFlags::BINARY) {
                let resistance = resistance_stat(school).map_or(0.0, |s| defender.stat(s));
                damage *= table.resistance_multiplier(resistance, attacker_level);
            }
            damage *= defender.pseudo_stats.school_damage_taken_multiplier[school.index()];
        }

        let outcome = self.roll(sim, target, kind, crit_chance);
        damage *= table.outcome_multiplier(outcome, school);
        damage -= table.flat_reduction(outcome);
        if outcome.landed() {
            damage += sim.unit(target).pseudo_stats.bonus_damage_taken_after_modifiers[defense_type.index()];
        }
        let damage = damage.max(0.0);

        SpellResult {
            target,
            outcome,
            amount: damage,
            threat: damage * threat_multiplier * sim.unit(caster).pseudo_stats.threat_multiplier,
            is_healing: false,
            is_periodic,
        }
    }

    /// Apply a resolved damage result: health, metrics, threat, log and the
    /// hit-dealt / hit-taken (or periodic) listeners.
    pub fn deal_damage(self, sim: &mut Simulation, result: &SpellResult) {
        let (caster, action_id, flags) = {
            let spell = sim.spell(self);
            (spell.unit, spell.action_id, spell.flags)
        };
        let now = sim.now();

        let died = sim.unit_mut(result.target).take_damage(result.amount);
        if died && sim.primary_target() == Some(result.target) {
            sim.finish();
        }

        if !flags.contains(SpellFlags::NO_METRICS) {
            let metrics = &mut sim.spell_mut(self).metrics;
            if result.is_periodic {
                metrics.ticks += 1;
            }
            if result.outcome.contains(HitOutcome::HIT) || result.outcome.contains(HitOutcome::GLANCE) || result.outcome.contains(HitOutcome::BLOCK) {
                metrics.hits += 1;
            }
            if result.did_crit() {
                metrics.crits += 1;
            }
            if !result.landed() {
                metrics.misses += 1;
            }
            metrics.damage += result.amount;
            metrics.threat += result.threat;
        }

        debug!(
            time = ?now,
            source = caster.0,
            target = result.target.0,
            spell = %action_id,
            outcome = ?result.outcome,
            amount = result.amount,
            "damage"
        );
        sim.record(LogEntry::Damage {
            time: now,
            source: caster,
            target: result.target,
            action: action_id,
            outcome: result.outcome,
            amount: result.amount,
        });

        if result.is_periodic {
            sim.dispatch_spell_result(caster, EventChannel::PeriodicDamageDealt, self, result);
        } else {
            sim.dispatch_spell_result(caster, EventChannel::SpellHitDealt, self, result);
            sim.dispatch_spell_result(result.target, EventChannel::SpellHitTaken, self, result);
        }
    }

    pub fn calc_and_deal_damage(self, sim: &mut Simulation, target: UnitId, base_damage: f64, kind: OutcomeKind) -> SpellResult {
        let result = self.calc_damage(sim, target, base_damage, kind);
        self.deal_damage(sim, &result);
        result
    }

    pub fn deal_periodic_damage(self, sim: &mut Simulation, result: &SpellResult) {
        self.deal_damage(sim, result);
    }

    pub fn calc_and_deal_periodic_damage(
        self,
        sim: &mut Simulation,
        target: UnitId,
        base_damage: f64,
        kind: OutcomeKind,
    ) -> SpellResult {
        let result = self.calc_periodic_damage(sim, target, base_damage, kind);
        self.deal_damage(sim, &result);
        result
    }

    /// Resolve healing on `target` without applying it
    pub fn calc_healing(self, sim: &mut Simulation, target: UnitId, base_healing: f64, kind: OutcomeKind) -> SpellResult {
        let multiplier = self.attacker_healing_multiplier(sim);
        let crit_chance = self.crit_chance(sim);
        self.resolve_healing(sim, target, base_healing * multiplier, crit_chance, kind)
    }

    pub(crate) fn resolve_healing(
        self,
        sim: &mut Simulation,
        target: UnitId,
        healing: f64,
        crit_chance: f64,
        kind: OutcomeKind,
    ) -> SpellResult {
        let table = sim.combat_table();
        let (school, caster, threat_multiplier) = {
            let spell = sim.spell(self);
            (spell.school, spell.unit, spell.threat_multiplier)
        };
        let mut healing = healing * sim.unit(target).pseudo_stats.healing_taken_multiplier;
        let outcome = self.roll(sim, target, kind, crit_chance);
        healing *= table.outcome_multiplier(outcome, school);
        let healing = healing.max(0.0);

        SpellResult {
            target,
            outcome,
            amount: healing,
            threat: healing
                * sim.config().combat.healing_threat_factor
                * threat_multiplier
                * sim.unit(caster).pseudo_stats.threat_multiplier,
            is_healing: true,
            is_periodic: kind.is_periodic(),
        }
    }

    /// Apply a resolved healing result and notify heal-dealt listeners
    pub fn deal_healing(self, sim: &mut Simulation, result: &SpellResult) {
        let (caster, action_id, flags) = {
            let spell = sim.spell(self);
            (spell.unit, spell.action_id, spell.flags)
        };
        let now = sim.now();
        sim.unit_mut(result.target)
            .gain_resource(ResourceKind::Health, result.amount, action_id, now);

        if !flags.contains(SpellFlags::NO_METRICS) {
            let metrics = &mut sim.spell_mut(self).metrics;
            if result.is_periodic {
                metrics.ticks += 1;
            } else {
                metrics.hits += 1;
            }
            if result.did_crit() {
                metrics.crits += 1;
            }
            metrics.healing += result.amount;
            metrics.threat += result.threat;
        }

        debug!(time = ?now, source = caster.0, target = result.target.0, spell = %action_id, amount = result.amount, "healing");
        sim.record(LogEntry::Healing {
            time: now,
            source: caster,
            target: result.target,
            action: action_id,
            outcome: result.outcome,
            amount: result.amount,
        });
        sim.dispatch_spell_result(caster, EventChannel::HealDealt, self, result);
    }

    pub fn calc_and_deal_healing(self, sim: &mut Simulation, target: UnitId, base_healing: f64, kind: OutcomeKind) -> SpellResult {
        let result = self.calc_healing(sim, target, base_healing, kind);
        self.deal_healing(sim, &result);
        result
    }

    /// Apply results that were all calculated before any of them is dealt,
    /// so effects triggered by the first hit cannot change the later ones.
    pub fn deal_batch(self, sim: &mut Simulation, results: &[SpellResult]) {
        for result in results {
            if result.is_healing {
                self.deal_healing(sim, result);
            } else {
                self.deal_damage(sim, result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::combat::OutcomeKind;
    use crate::config::FightConfig;
    use crate::sim::Simulation;
    use crate::spell::{SpellConfig, SpellFlags};
    use crate::stats::Stat;
    use crate::types::{ActionId, DefenseType, HitOutcome, ResourceKind, SpellSchool, UnitId, UnitKind};

    fn setup(armor: f64) -> (Simulation, UnitId, UnitId) {
        let config = FightConfig {
            target_armor: armor,
            target_level: 60,
            ..Default::default()
        };
        let mut sim = Simulation::new(config);
        let target = sim.primary_target().unwrap();
        let player = sim.add_unit("Player", UnitKind::Player, 60);
        (sim, player, target)
    }

    fn spell(sim: &mut Simulation, player: UnitId, school: SpellSchool, flags: SpellFlags) -> crate::types::SpellId {
        sim.register_spell(
            player,
            SpellConfig {
                action_id: ActionId::spell(100),
                school,
                defense_type: DefenseType::Melee,
                flags,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_armor_applies_to_physical_hits() {
        let (mut sim, player, target) = setup(1000.0);
        let strike = spell(&mut sim, player, SpellSchool::Physical, SpellFlags::empty());
        let result = strike.calc_damage(&mut sim, target, 100.0, OutcomeKind::AlwaysHit);
        // 1000 / (1000 + 400 + 85 * 60) = 0.1538...
        let expected = 100.0 * (1.0 - 1000.0 / 6500.0);
        assert!((result.amount - expected).abs() < 1e-9);

        let piercing = spell(&mut sim, player, SpellSchool::Physical, SpellFlags::IGNORE_ARMOR);
        let result = piercing.calc_damage(&mut sim, target, 100.0, OutcomeKind::AlwaysHit);
        assert!((result.amount - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_multipliers_and_flat_bonus() {
        let (mut sim, player, target) = setup(0.0);
        sim.unit_mut(player).pseudo_stats.damage_dealt_multiplier = 1.1;
        sim.unit_mut(player).pseudo_stats.school_damage_dealt_multiplier[SpellSchool::Fire.index()] = 1.2;
        sim.unit_mut(target).pseudo_stats.school_damage_taken_multiplier[SpellSchool::Fire.index()] = 1.5;
        sim.unit_mut(target).pseudo_stats.bonus_damage_taken_after_modifiers[DefenseType::Melee.index()] = 7.0;
        let fire = spell(&mut sim, player, SpellSchool::Fire, SpellFlags::empty());
        let result = fire.calc_damage(&mut sim, target, 100.0, OutcomeKind::AlwaysHit);
        assert!((result.amount - (100.0 * 1.1 * 1.2 * 1.5 + 7.0)).abs() < 1e-9);
    }

    #[test]
    fn test_calc_does_not_change_state() {
        let (mut sim, player, target) = setup(0.0);
        sim.unit_mut(target).enable_resource(ResourceKind::Health, 1000.0);
        let strike = spell(&mut sim, player, SpellSchool::Physical, SpellFlags::empty());
        strike.calc_damage(&mut sim, target, 100.0, OutcomeKind::AlwaysHit);
        assert_eq!(sim.unit(target).resource(ResourceKind::Health), 1000.0);
        assert_eq!(sim.spell(strike).metrics.damage, 0.0);

        strike.calc_and_deal_damage(&mut sim, target, 100.0, OutcomeKind::AlwaysHit);
        assert_eq!(sim.unit(target).resource(ResourceKind::Health), 900.0);
        assert_eq!(sim.spell(strike).metrics.hits, 1);
    }

    #[test]
    fn test_primary_target_death_finishes_trial() {
        let (mut sim, player, target) = setup(0.0);
        sim.unit_mut(target).enable_resource(ResourceKind::Health, 150.0);
        let strike = spell(&mut sim, player, SpellSchool::Physical, SpellFlags::empty());
        strike.calc_and_deal_damage(&mut sim, target, 100.0, OutcomeKind::AlwaysHit);
        assert!(!sim.is_finished());
        strike.calc_and_deal_damage(&mut sim, target, 100.0, OutcomeKind::AlwaysHit);
        assert!(sim.is_finished());
    }

    #[test]
    fn test_periodic_ignores_armor_and_counts_ticks() {
        let (mut sim, player, target) = setup(3000.0);
        let bleed = spell(&mut sim, player, SpellSchool::Physical, SpellFlags::empty());
        let result = bleed.calc_and_deal_periodic_damage(&mut sim, target, 30.0, OutcomeKind::Tick);
        assert_eq!(result.amount, 30.0);
        assert_eq!(result.outcome, HitOutcome::TICK);
        let metrics = sim.spell(bleed).metrics;
        assert_eq!(metrics.ticks, 1);
        assert_eq!(metrics.hits, 0);
    }

    #[test]
    fn test_crit_chance_reads_percent_stats() {
        let (mut sim, player, _) = setup(0.0);
        sim.unit_mut(player).add_stat(Stat::MeleeCrit, 25.0);
        let strike = spell(&mut sim, player, SpellSchool::Physical, SpellFlags::empty());
        assert!((strike.crit_chance(&sim) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_healing_threat_uses_configured_factor() {
        let mut config = FightConfig::default();
        config.combat.healing_threat_factor = 0.25;
        let mut sim = Simulation::new(config);
        let player = sim.add_unit("Player", UnitKind::Player, 60);
        sim.unit_mut(player).pseudo_stats.threat_multiplier = 2.0;
        let heal = spell(&mut sim, player, SpellSchool::Holy, SpellFlags::empty());
        let result = heal.calc_healing(&mut sim, player, 100.0, OutcomeKind::AlwaysHit);
        assert_eq!(result.amount, 100.0);
        assert!((result.threat - 50.0).abs() < 1e-9);
    }
}
