//! Integration test: buff selection beyond plain stats. Buffs with extra
//! effects, percent damage modifiers, cooldowns cast by other players and
//! the subset of buffs that reaches pets.

mod common;

use common::*;
use sim_core::buffs::register_percent_damage_modifier_effect;
use sim_core::prelude::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_warchiefs_blessing_applies_haste_with_its_stats() {
    let (mut sim, player) = fight(1);
    let individual = IndividualBuffs {
        warchiefs_blessing: true,
        ..Default::default()
    };
    apply_buff_effects(&mut sim, player, &RaidBuffs::default(), &PartyBuffs::default(), &individual).unwrap();

    sim.reset(1);
    assert!(close(sim.unit(player).pseudo_stats.melee_speed_multiplier, 1.15));
    assert_eq!(sim.unit(player).stat(Stat::Health), 300.0);
    assert_eq!(sim.unit(player).stat(Stat::MP5), 10.0);

    sim.run_trial();
    assert!(close(sim.unit(player).pseudo_stats.melee_speed_multiplier, 1.0));
    assert_eq!(sim.unit(player).stat(Stat::Health), 0.0);
}

#[test]
fn test_strongest_percent_damage_modifier_wins() {
    let (mut sim, player) = fight(1);
    let weak = sim.register_aura(player, AuraConfig::new("Weak Modifier", ActionId::spell(1))).unwrap();
    let strong = sim.register_aura(player, AuraConfig::new("Strong Modifier", ActionId::spell(2))).unwrap();
    register_percent_damage_modifier_effect(&mut sim, weak, 1.1).unwrap();
    register_percent_damage_modifier_effect(&mut sim, strong, 1.3).unwrap();
    sim.reset(1);
    let multiplier = |sim: &Simulation| sim.unit(player).pseudo_stats.damage_dealt_multiplier;

    strong.activate(&mut sim);
    weak.activate(&mut sim);
    assert!(!weak.is_active(&sim));
    assert!(close(multiplier(&sim), 1.3));

    strong.deactivate(&mut sim);
    assert!(close(multiplier(&sim), 1.0));

    weak.activate(&mut sim);
    assert!(close(multiplier(&sim), 1.1));

    strong.activate(&mut sim);
    assert!(!weak.is_active(&sim));
    assert!(close(multiplier(&sim), 1.3));
}

#[test]
fn test_percent_damage_modifier_rejects_non_positive() {
    let (mut sim, player) = fight(1);
    let aura = sim.register_aura(player, AuraConfig::new("Broken", ActionId::spell(3))).unwrap();
    let err = register_percent_damage_modifier_effect(&mut sim, aura, 0.0);
    assert!(matches!(err, Err(ConfigError::Validation(_))));
}

#[test]
fn test_power_infusions_chain_between_sources() {
    let (mut sim, player) = fight_with(FightConfig {
        duration_secs: 400.0,
        ..Default::default()
    });
    let individual = IndividualBuffs {
        power_infusions: 2,
        ..Default::default()
    };
    apply_buff_effects(&mut sim, player, &RaidBuffs::default(), &PartyBuffs::default(), &individual).unwrap();
    let pi = sim.unit(player).get_aura("Power Infusion").unwrap();
    let fire = |sim: &Simulation| sim.unit(player).pseudo_stats.school_damage_dealt_multiplier[SpellSchool::Fire.index()];
    let physical =
        |sim: &Simulation| sim.unit(player).pseudo_stats.school_damage_dealt_multiplier[SpellSchool::Physical.index()];

    sim.reset(7);
    sim.advance_to(secs(5));
    assert!(pi.is_active(&sim));
    assert!(close(fire(&sim), 1.2));
    assert!(close(physical(&sim), 1.0));

    // Second source follows the first; both are then on cooldown
    sim.advance_to(secs(25));
    assert!(pi.is_active(&sim));
    sim.advance_to(secs(100));
    assert!(!pi.is_active(&sim));
    assert!(close(fire(&sim), 1.0));

    sim.run_trial();
    assert_eq!(sim.aura(pi).activations(), 6);
}

#[test]
fn test_innervate_waits_for_low_mana() {
    let (mut sim, player) = fight(1);
    sim.unit_mut(player).enable_resource(ResourceKind::Mana, 5000.0);
    sim.unit_mut(player).add_stat(Stat::MP5, 100.0);
    let individual = IndividualBuffs {
        innervates: 1,
        ..Default::default()
    };
    apply_buff_effects(&mut sim, player, &RaidBuffs::default(), &PartyBuffs::default(), &individual).unwrap();
    let innervate = sim.unit(player).get_aura("Innervate").unwrap();

    sim.reset(1);
    sim.advance_to(secs(1));
    assert!(!innervate.is_active(&sim));
    assert!(sim.unit_mut(player).spend_resource(ResourceKind::Mana, 4200.0));

    // The regen tick at 2s lands first, then the low-mana check passes
    sim.advance_to(secs(2));
    assert!(close(sim.unit(player).resource(ResourceKind::Mana), 840.0));
    assert!(innervate.is_active(&sim));

    sim.advance_to(secs(4));
    assert!(close(sim.unit(player).resource(ResourceKind::Mana), 1040.0));
    assert_eq!(sim.aura(innervate).activations(), 1);
}

#[test]
fn test_pets_only_receive_pet_buffs() {
    let (mut sim, _player) = fight(1);
    let summoned = sim.add_unit("Imp", UnitKind::Pet, 60);
    let late = sim.add_unit("Felhunter", UnitKind::Pet, 60);
    let raid = RaidBuffs {
        arcane_brilliance: true,
        ..Default::default()
    };
    let party = PartyBuffs {
        battle_shout: TristateEffect::Regular,
        ..Default::default()
    };
    let individual = IndividualBuffs {
        blessing_of_kings: true,
        warchiefs_blessing: true,
        power_infusions: 1,
        innervates: 1,
        ..Default::default()
    };

    apply_pet_buff_effects(&mut sim, summoned, &raid, &party, &individual, true).unwrap();
    let pet = sim.unit(summoned);
    assert!(pet.get_aura("Blessing of Kings").is_some());
    assert!(pet.get_aura("Arcane Brilliance").is_some());
    assert!(pet.get_aura("Battle Shout").is_some());
    assert!(pet.get_aura("Power Infusion").is_none());
    assert!(pet.get_aura("Innervate").is_none());
    assert!(pet.get_aura("Warchief's Blessing").is_none());

    apply_pet_buff_effects(&mut sim, late, &raid, &party, &individual, false).unwrap();
    let pet = sim.unit(late);
    assert!(pet.get_aura("Blessing of Kings").is_none());
    assert!(pet.get_aura("Arcane Brilliance").is_none());
    assert!(pet.get_aura("Battle Shout").is_some());
}

#[test]
fn test_pet_buffs_require_a_pet() {
    let (mut sim, player) = fight(1);
    let err = apply_pet_buff_effects(
        &mut sim,
        player,
        &RaidBuffs::default(),
        &PartyBuffs::default(),
        &IndividualBuffs::default(),
        true,
    );
    assert!(matches!(err, Err(ConfigError::Validation(_))));
}
