//! Reference level-60 melee character used by the runner

use sim_core::prelude::*;
use sim_core::stats::{DependencyKind, StatDependency};
use std::rc::Rc;
use std::time::Duration;

const ROTATION_TICK: Duration = Duration::from_millis(500);

/// Add the character to `sim` with the fight's buff selection
pub fn build(sim: &mut Simulation) -> Result<(), ConfigError> {
    let player = sim.add_unit("Warrior", UnitKind::Player, 60);
    {
        let unit = sim.unit_mut(player);
        unit.weapons.main_hand = Some(Weapon {
            min_damage: 132.0,
            max_damage: 198.0,
            swing_speed: 3.4,
        });
        unit.add_stats(&Stats::from_pairs(&[
            (Stat::Strength, 310.0),
            (Stat::Agility, 140.0),
            (Stat::Stamina, 280.0),
            (Stat::AttackPower, 160.0),
            (Stat::MeleeHit, 5.0),
            (Stat::MeleeCrit, 12.0),
        ]));
        unit.enable_resource(ResourceKind::Rage, 100.0);
    }
    // Two attack power per strength and one percent crit per twenty agility
    sim.unit_mut(player).add_static_stat_dependency(StatDependency {
        src: Stat::Strength,
        dst: Stat::AttackPower,
        kind: DependencyKind::Add { amount: 2.0 },
    })?;
    sim.unit_mut(player).add_static_stat_dependency(StatDependency {
        src: Stat::Agility,
        dst: Stat::MeleeCrit,
        kind: DependencyKind::Add { amount: 0.05 },
    })?;
    sim.enable_auto_attacks(player)?;

    let rend = sim.register_spell(
        player,
        SpellConfig {
            action_id: ActionId::spell(11574),
            school: SpellSchool::Physical,
            defense_type: DefenseType::Melee,
            proc_mask: ProcMask::MELEE_MH_SPECIAL,
            dot: Some(DotConfig {
                number_of_ticks: 7,
                tick_length: Duration::from_secs(3),
                on_snapshot: Some(Rc::new(|sim: &mut Simulation, dot: DotId, _: bool| dot.take_snapshot(sim, 21.0))),
                ..DotConfig::new("Rend")
            }),
            ..Default::default()
        },
    )?;
    let strike = sim.register_spell(
        player,
        SpellConfig {
            action_id: ActionId::spell(20569),
            school: SpellSchool::Physical,
            defense_type: DefenseType::Melee,
            proc_mask: ProcMask::MELEE_MH_SPECIAL,
            cooldown: Some(Duration::from_secs(6)),
            apply_effects: Some(Rc::new(|sim: &mut Simulation, target: UnitId, spell: SpellId| {
                let caster = sim.spell(spell).unit;
                let ap = sim.unit(caster).stat(Stat::AttackPower);
                let base = 165.0 + ap / 14.0 * 3.3;
                spell.calc_and_deal_damage(sim, target, base, OutcomeKind::MeleeSpecialHitAndCrit);
            })),
            ..Default::default()
        },
    )?;

    // Rotation: keep Rend up, otherwise strike on cooldown
    sim.register_aura(
        player,
        AuraConfig {
            on_reset: Some(Rc::new(move |sim: &mut Simulation, _: AuraId| {
                sim.scheduler_mut().schedule(
                    Duration::ZERO,
                    ROTATION_TICK,
                    None,
                    ActionPriority::Default,
                    Rc::new(move |sim: &mut Simulation, _| {
                        let Some(target) = sim.primary_target() else {
                            return;
                        };
                        let rend_up = rend.dot(sim, target).is_some_and(|dot| dot.is_active(sim));
                        if !rend_up && rend.cast(sim, target) {
                            return;
                        }
                        if strike.can_cast(sim) {
                            strike.cast(sim, target);
                        }
                    }),
                );
            })),
            ..AuraConfig::new("Rotation", ActionId::default())
        },
    )?;

    let buffs = sim.config().buffs.clone();
    apply_buff_effects(sim, player, &buffs.raid, &buffs.party, &buffs.individual)
}
