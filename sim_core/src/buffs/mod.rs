//! Raid buffs - stat buff helpers and the translation of a buff selection
//! into permanent auras on a unit

mod external;

pub use external::{
    innervate_aura, power_infusion_aura, register_external_cooldown, register_innervate_cooldown,
    register_power_infusion_cooldown, ActivationCondition, ExternalCooldownConfig, INNERVATE, POWER_INFUSION,
};

use crate::aura::{AuraConfig, AuraHook, ExclusiveEffectConfig};
use crate::autoattack::extra_main_hand_attack;
use crate::combat::OutcomeKind;
use crate::config::{IndividualBuffs, PartyBuffs, RaidBuffs, TristateEffect};
use crate::error::ConfigError;
use crate::sim::Simulation;
use crate::spell::{SpellConfig, SpellResult};
use crate::stats::{Stat, Stats};
use crate::timer::Cooldown;
use crate::types::{ActionId, AuraId, DefenseType, ExclusiveEffectId, ProcMask, SpellId, SpellSchool, UnitId, UnitKind};
use std::rc::Rc;
use std::time::Duration;

/// One stat of a buff: a flat addition or a multiplier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatConfig {
    pub stat: Stat,
    pub amount: f64,
    pub multiplicative: bool,
}

impl StatConfig {
    pub fn flat(stat: Stat, amount: f64) -> Self {
        StatConfig {
            stat,
            amount,
            multiplicative: false,
        }
    }

    pub fn multiply(stat: Stat, factor: f64) -> Self {
        StatConfig {
            stat,
            amount: factor,
            multiplicative: true,
        }
    }
}

#[derive(Clone, Default)]
pub struct BuffConfig {
    pub label: String,
    pub action_id: ActionId,
    pub stats: Vec<StatConfig>,
    /// Effects beyond plain stats, run on the buff's aura when its stats go in effect
    pub extra_on_gain: Option<AuraHook>,
    /// Undoes `extra_on_gain` when the stats leave effect
    pub extra_on_expire: Option<AuraHook>,
}

/// Register a permanent buff aura whose stats are applied through an
/// exclusive effect in the category named after the buff.
///
/// The effect's priority is the product of the multipliers when the buff has
/// any, otherwise one plus the sum of the flat amounts, so a stronger copy of
/// the same buff from another source wins.
pub fn make_exclusive_buff(sim: &mut Simulation, unit: UnitId, config: BuffConfig) -> Result<AuraId, ConfigError> {
    sim.check_unit(unit)?;
    if config.stats.is_empty() && config.extra_on_gain.is_none() {
        return Err(ConfigError::Validation(format!("buff '{}' has no stats", config.label)));
    }

    let mut flat = Stats::default();
    let mut total_flat = 0.0;
    let mut total_multiplier = 1.0;
    let mut deps = Vec::new();
    for stat in &config.stats {
        if stat.multiplicative {
            deps.push(sim.unit_mut(unit).new_dynamic_multiply_stat(stat.stat, stat.amount)?);
            total_multiplier *= stat.amount;
        } else {
            flat[stat.stat] += stat.amount;
            total_flat += stat.amount;
        }
    }
    let priority = if deps.is_empty() { 1.0 + total_flat } else { total_multiplier };

    let aura = sim
        .register_aura(unit, AuraConfig::new(config.label.clone(), config.action_id))?
        .make_permanent(sim);

    let gain_deps = deps.clone();
    let extra_on_gain = config.extra_on_gain;
    let extra_on_expire = config.extra_on_expire;
    aura.new_exclusive_effect(
        sim,
        &config.label,
        false,
        ExclusiveEffectConfig {
            priority,
            on_gain: Some(Rc::new(move |sim: &mut Simulation, effect: ExclusiveEffectId| {
                let unit = sim.unit_mut(effect.unit);
                unit.add_stats_dynamic(&flat);
                for dep in &gain_deps {
                    unit.enable_dynamic_stat_dep(*dep);
                }
                if let Some(hook) = &extra_on_gain {
                    let aura = effect.aura(sim);
                    hook(sim, aura);
                }
            })),
            on_expire: Some(Rc::new(move |sim: &mut Simulation, effect: ExclusiveEffectId| {
                let unit = sim.unit_mut(effect.unit);
                unit.add_stats_dynamic(&flat.multiply(-1.0));
                for dep in &deps {
                    unit.disable_dynamic_stat_dep(*dep);
                }
                if let Some(hook) = &extra_on_expire {
                    let aura = effect.aura(sim);
                    hook(sim, aura);
                }
            })),
        },
    )?;
    Ok(aura)
}

/// Register an aura that adds `stats` while active
pub fn new_temporary_stats_aura(
    sim: &mut Simulation,
    unit: UnitId,
    label: &str,
    action_id: ActionId,
    stats: Stats,
    duration: Duration,
) -> Result<AuraId, ConfigError> {
    sim.register_aura(
        unit,
        AuraConfig {
            duration,
            on_gain: Some(Rc::new(move |sim: &mut Simulation, aura: AuraId| {
                sim.unit_mut(aura.unit).add_stats_dynamic(&stats)
            })),
            on_expire: Some(Rc::new(move |sim: &mut Simulation, aura: AuraId| {
                sim.unit_mut(aura.unit).add_stats_dynamic(&stats.multiply(-1.0))
            })),
            ..AuraConfig::new(label, action_id)
        },
    )
}

const WARCHIEFS_BLESSING_HASTE: f64 = 1.15;

fn primary_stats(amount: f64) -> Vec<StatConfig> {
    Stat::primary().iter().map(|&s| StatConfig::flat(s, amount)).collect()
}

fn primary_multipliers(factor: f64) -> Vec<StatConfig> {
    Stat::primary().iter().map(|&s| StatConfig::multiply(s, factor)).collect()
}

fn improved(effect: TristateEffect, amount: f64, multiplier: f64) -> f64 {
    if effect == TristateEffect::Improved {
        amount * multiplier
    } else {
        amount
    }
}

/// Register the auras for every selected buff on `unit`
pub fn apply_buff_effects(
    sim: &mut Simulation,
    unit: UnitId,
    raid: &RaidBuffs,
    party: &PartyBuffs,
    individual: &IndividualBuffs,
) -> Result<(), ConfigError> {
    sim.check_unit(unit)?;
    let mut buffs = Vec::new();

    // === Raid ===
    if raid.arcane_brilliance {
        buffs.push(BuffConfig {
            label: "Arcane Brilliance".to_string(),
            action_id: ActionId::spell(23028),
            stats: vec![StatConfig::flat(Stat::Intellect, 31.0)],
            ..Default::default()
        });
    }
    if raid.gift_of_the_wild.is_present() {
        let scale = improved(raid.gift_of_the_wild, 1.0, 1.35);
        let mut stats = primary_stats(12.0 * scale);
        stats.push(StatConfig::flat(Stat::Armor, 285.0 * scale));
        for resistance in [
            Stat::ArcaneResistance,
            Stat::FireResistance,
            Stat::FrostResistance,
            Stat::NatureResistance,
            Stat::ShadowResistance,
        ] {
            stats.push(StatConfig::flat(resistance, 20.0 * scale));
        }
        buffs.push(BuffConfig {
            label: "Gift of the Wild".to_string(),
            action_id: ActionId::spell(21850),
            stats,
            ..Default::default()
        });
    }
    if raid.leader_of_the_pack {
        buffs.push(BuffConfig {
            label: "Leader of the Pack".to_string(),
            action_id: ActionId::spell(24932),
            stats: vec![StatConfig::flat(Stat::MeleeCrit, 3.0)],
            ..Default::default()
        });
    }

    // === Party ===
    if party.battle_shout.is_present() {
        buffs.push(BuffConfig {
            label: "Battle Shout".to_string(),
            action_id: ActionId::spell(25289),
            stats: vec![StatConfig::flat(
                Stat::AttackPower,
                improved(party.battle_shout, 232.0, 1.25),
            )],
            ..Default::default()
        });
    }
    if party.strength_of_earth_totem.is_present() {
        let amount = if party.strength_of_earth_totem == TristateEffect::Improved {
            70.0
        } else {
            61.0
        };
        buffs.push(BuffConfig {
            label: "Strength of Earth Totem".to_string(),
            action_id: ActionId::spell(25361),
            stats: vec![StatConfig::flat(Stat::Strength, amount)],
            ..Default::default()
        });
    }
    if party.devotion_aura.is_present() {
        buffs.push(BuffConfig {
            label: "Devotion Aura".to_string(),
            action_id: ActionId::spell(10293),
            stats: vec![StatConfig::flat(Stat::Armor, improved(party.devotion_aura, 735.0, 1.25))],
            ..Default::default()
        });
    }

    // === Individual ===
    if individual.blessing_of_kings {
        buffs.push(BuffConfig {
            label: "Blessing of Kings".to_string(),
            action_id: ActionId::spell(25898),
            stats: primary_multipliers(1.1),
            ..Default::default()
        });
    }
    if individual.blessing_of_might.is_present() {
        buffs.push(BuffConfig {
            label: "Blessing of Might".to_string(),
            action_id: ActionId::spell(25291),
            stats: vec![StatConfig::flat(
                Stat::AttackPower,
                improved(individual.blessing_of_might, 185.0, 1.2),
            )],
            ..Default::default()
        });
    }

    if individual.warchiefs_blessing {
        buffs.push(BuffConfig {
            label: "Warchief's Blessing".to_string(),
            action_id: ActionId::spell(16609),
            stats: vec![StatConfig::flat(Stat::Health, 300.0), StatConfig::flat(Stat::MP5, 10.0)],
            extra_on_gain: Some(Rc::new(|sim: &mut Simulation, aura: AuraId| {
                sim.unit_mut(aura.unit).pseudo_stats.melee_speed_multiplier *= WARCHIEFS_BLESSING_HASTE
            })),
            extra_on_expire: Some(Rc::new(|sim: &mut Simulation, aura: AuraId| {
                sim.unit_mut(aura.unit).pseudo_stats.melee_speed_multiplier /= WARCHIEFS_BLESSING_HASTE
            })),
        });
    }

    for buff in buffs {
        make_exclusive_buff(sim, unit, buff)?;
    }

    register_power_infusion_cooldown(sim, unit, individual.power_infusions)?;
    register_innervate_cooldown(sim, unit, individual.innervates)?;

    if party.stoneskin_totem.is_present() {
        stoneskin_totem_aura(sim, unit, party.stoneskin_totem)?;
    }
    if raid.thorns.is_present() {
        let points = raid.thorns.points(0, 3);
        let damage = 18.0 * (1.0 + 0.25 * points as f64);
        damage_shield_aura(sim, unit, "Thorns", ActionId::spell(9910), SpellSchool::Nature, damage)?;
    }
    if party.retribution_aura.is_present() {
        let points = party.retribution_aura.points(0, 2);
        let damage = 20.0 * (1.0 + 0.25 * points as f64);
        damage_shield_aura(
            sim,
            unit,
            "Retribution Aura",
            ActionId::spell(10301),
            SpellSchool::Holy,
            damage,
        )?;
    }
    if party.windfury_totem {
        windfury_totem_aura(sim, unit)?;
    }
    Ok(())
}

/// Register the buffs that reach a pet.
///
/// Cooldowns cast by other players and world buffs never land on pets. A pet
/// that is summoned mid-fight also misses the buffs cast before the pull.
pub fn apply_pet_buff_effects(
    sim: &mut Simulation,
    pet: UnitId,
    raid: &RaidBuffs,
    party: &PartyBuffs,
    individual: &IndividualBuffs,
    enabled_on_start: bool,
) -> Result<(), ConfigError> {
    let owner = sim.check_unit(pet)?;
    if owner.kind != UnitKind::Pet {
        return Err(ConfigError::Validation(format!(
            "pet buffs applied to '{}', which is not a pet",
            owner.label
        )));
    }

    let mut raid = raid.clone();
    let mut individual = individual.clone();
    individual.power_infusions = 0;
    individual.innervates = 0;
    individual.warchiefs_blessing = false;

    if !enabled_on_start {
        raid.arcane_brilliance = false;
        raid.gift_of_the_wild = TristateEffect::Missing;
        raid.thorns = TristateEffect::Missing;
        individual.blessing_of_kings = false;
        individual.blessing_of_might = TristateEffect::Missing;
    }

    apply_buff_effects(sim, pet, &raid, party, &individual)
}

pub const PERCENT_DAMAGE_MODIFIER: &str = "PercentDamageModifier";

/// Scale all damage dealt by `multiplier` while `aura` is active.
///
/// Percent modifiers share one single-aura category, so only the strongest
/// is ever up: a weaker one cannot activate over it and a stronger one
/// replaces it.
pub fn register_percent_damage_modifier_effect(
    sim: &mut Simulation,
    aura: AuraId,
    multiplier: f64,
) -> Result<ExclusiveEffectId, ConfigError> {
    if multiplier <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "percent damage modifier on '{}' must be positive, got {}",
            sim.aura(aura).label,
            multiplier
        )));
    }
    aura.new_exclusive_effect(
        sim,
        PERCENT_DAMAGE_MODIFIER,
        true,
        ExclusiveEffectConfig {
            priority: multiplier,
            on_gain: Some(Rc::new(move |sim: &mut Simulation, effect: ExclusiveEffectId| {
                sim.unit_mut(effect.unit).pseudo_stats.damage_dealt_multiplier *= multiplier
            })),
            on_expire: Some(Rc::new(move |sim: &mut Simulation, effect: ExclusiveEffectId| {
                sim.unit_mut(effect.unit).pseudo_stats.damage_dealt_multiplier /= multiplier
            })),
        },
    )
}

/// Flat reduction of melee damage taken. Expiring the aura adds the reduction
/// a second time instead of removing it; the pseudo-stat is restored on reset.
pub fn stoneskin_totem_aura(sim: &mut Simulation, unit: UnitId, effect: TristateEffect) -> Result<AuraId, ConfigError> {
    let amount = if effect == TristateEffect::Improved { -36.0 } else { -30.0 };
    let melee = DefenseType::Melee.index();
    let aura = sim.register_aura(
        unit,
        AuraConfig {
            on_gain: Some(Rc::new(move |sim: &mut Simulation, aura: AuraId| {
                sim.unit_mut(aura.unit).pseudo_stats.bonus_damage_taken_after_modifiers[melee] += amount
            })),
            on_expire: Some(Rc::new(move |sim: &mut Simulation, aura: AuraId| {
                sim.unit_mut(aura.unit).pseudo_stats.bonus_damage_taken_after_modifiers[melee] += amount
            })),
            ..AuraConfig::new("Stoneskin", ActionId::spell(10408))
        },
    )?;
    Ok(aura.make_permanent(sim))
}

/// Permanent aura that strikes back at melee attackers for `damage`
fn damage_shield_aura(
    sim: &mut Simulation,
    unit: UnitId,
    label: &str,
    action_id: ActionId,
    school: SpellSchool,
    damage: f64,
) -> Result<AuraId, ConfigError> {
    let spell = sim.register_spell(
        unit,
        SpellConfig {
            action_id,
            school,
            defense_type: DefenseType::Magic,
            proc_mask: ProcMask::EMPTY,
            ..Default::default()
        },
    )?;
    let aura = sim.register_aura(
        unit,
        AuraConfig {
            on_spell_hit_taken: Some(Rc::new(
                move |sim: &mut Simulation, _: AuraId, trigger: SpellId, result: &SpellResult| {
                    if !result.landed() || !sim.spell(trigger).proc_mask.matches(ProcMask::MELEE) {
                        return;
                    }
                    let attacker = sim.spell(trigger).unit;
                    spell.calc_and_deal_damage(sim, attacker, damage, OutcomeKind::AlwaysHit);
                },
            )),
            ..AuraConfig::new(label, action_id)
        },
    )?;
    Ok(aura.make_permanent(sim))
}

const WINDFURY_CHANCE: f64 = 0.2;

/// Windfury Totem: landed main-hand melee hits have a chance to grant an
/// extra attack and a short attack power buff that is used up by white hits.
pub fn windfury_totem_aura(sim: &mut Simulation, unit: UnitId) -> Result<AuraId, ConfigError> {
    let action_id = ActionId::spell(10610);
    let bonus = Stats::from_pairs(&[(Stat::AttackPower, 315.0)]);
    let icd = Cooldown::new(sim.new_timer(), Duration::from_millis(1500));

    let buff = sim.register_aura(
        unit,
        AuraConfig {
            duration: Duration::from_millis(1500),
            max_stacks: 2,
            icd: Some(icd),
            on_gain: Some(Rc::new(move |sim: &mut Simulation, aura: AuraId| {
                sim.unit_mut(aura.unit).add_stats_dynamic(&bonus)
            })),
            on_expire: Some(Rc::new(move |sim: &mut Simulation, aura: AuraId| {
                sim.unit_mut(aura.unit).add_stats_dynamic(&bonus.multiply(-1.0))
            })),
            on_spell_hit_dealt: Some(Rc::new(
                |sim: &mut Simulation, aura: AuraId, spell: SpellId, _: &SpellResult| {
                    if sim.spell(spell).proc_mask.matches(ProcMask::MELEE_MH_AUTO) {
                        aura.remove_stack(sim);
                    }
                },
            )),
            ..AuraConfig::new("Windfury Totem Attack Power", action_id.with_tag(1))
        },
    )?;

    let trigger = sim.register_aura(
        unit,
        AuraConfig {
            on_spell_hit_dealt: Some(Rc::new(
                move |sim: &mut Simulation, aura: AuraId, spell: SpellId, result: &SpellResult| {
                    let mask = sim.spell(spell).proc_mask;
                    if !result.landed() || !mask.matches(ProcMask::MELEE_MH) || mask.matches(ProcMask::SUPPRESS_EXTRA_ATTACK) {
                        return;
                    }
                    if !icd.is_ready(sim) {
                        return;
                    }
                    if sim.random_float("Windfury Totem") >= WINDFURY_CHANCE {
                        return;
                    }
                    buff.activate(sim);
                    let stacks = if mask.matches(ProcMask::MELEE_MH_AUTO) { 1 } else { 2 };
                    buff.set_stacks(sim, stacks);
                    extra_main_hand_attack(sim, aura.unit, 1);
                },
            )),
            ..AuraConfig::new("Windfury Totem", action_id)
        },
    )?;
    Ok(trigger.make_permanent(sim))
}
