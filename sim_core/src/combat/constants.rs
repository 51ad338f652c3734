//! Tunable attack-table constants

use serde::{Deserialize, Serialize};

/// Constants used by the default attack table and mitigation formulas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatConstants {
    /// Miss chance of a melee attack against a same-level target
    #[serde(default = "default_base_melee_miss")]
    pub base_melee_miss: f64,
    /// Extra miss chance per level the defender is above the attacker
    #[serde(default = "default_miss_per_level")]
    pub melee_miss_per_level: f64,
    #[serde(default = "default_base_dodge")]
    pub base_dodge: f64,
    #[serde(default = "default_avoidance_per_level")]
    pub avoidance_per_level: f64,
    #[serde(default = "default_base_parry")]
    pub base_parry: f64,
    #[serde(default = "default_base_block")]
    pub base_block: f64,
    /// Flat damage removed by a block
    #[serde(default = "default_block_value")]
    pub block_value: f64,
    /// Attacks come from the front, so they can be parried and blocked
    #[serde(default)]
    pub attack_from_front: bool,
    /// Glancing chance against a same-level target (white melee only)
    #[serde(default = "default_base_glance")]
    pub base_glance: f64,
    #[serde(default = "default_glance_per_level")]
    pub glance_per_level: f64,
    /// Damage multiplier applied to a glancing blow
    #[serde(default = "default_glance_multiplier")]
    pub glance_multiplier: f64,
    /// Spell miss chance indexed by level difference (0..=3); clamps at the last entry
    #[serde(default = "default_spell_miss_by_level")]
    pub spell_miss_by_level: Vec<f64>,
    /// Lowest miss chance reachable with hit bonuses
    #[serde(default = "default_min_spell_miss")]
    pub min_spell_miss: f64,
    #[serde(default = "default_melee_crit_multiplier")]
    pub melee_crit_multiplier: f64,
    #[serde(default = "default_spell_crit_multiplier")]
    pub spell_crit_multiplier: f64,
    /// Armor formula: `armor / (armor + armor_base + armor_per_level × attacker_level)`
    #[serde(default = "default_armor_base")]
    pub armor_base: f64,
    #[serde(default = "default_armor_per_level")]
    pub armor_per_level: f64,
    #[serde(default = "default_max_mitigation")]
    pub max_armor_mitigation: f64,
    /// Resistance points per attacker level that give the full resist cap
    #[serde(default = "default_resistance_per_level")]
    pub resistance_per_level: f64,
    #[serde(default = "default_max_mitigation")]
    pub max_resist_mitigation: f64,
    /// Threat generated per point of healing, before threat multipliers
    #[serde(default = "default_healing_threat_factor")]
    pub healing_threat_factor: f64,
}

impl Default for CombatConstants {
    fn default() -> Self {
        CombatConstants {
            base_melee_miss: default_base_melee_miss(),
            melee_miss_per_level: default_miss_per_level(),
            base_dodge: default_base_dodge(),
            avoidance_per_level: default_avoidance_per_level(),
            base_parry: default_base_parry(),
            base_block: default_base_block(),
            block_value: default_block_value(),
            attack_from_front: false,
            base_glance: default_base_glance(),
            glance_per_level: default_glance_per_level(),
            glance_multiplier: default_glance_multiplier(),
            spell_miss_by_level: default_spell_miss_by_level(),
            min_spell_miss: default_min_spell_miss(),
            melee_crit_multiplier: default_melee_crit_multiplier(),
            spell_crit_multiplier: default_spell_crit_multiplier(),
            armor_base: default_armor_base(),
            armor_per_level: default_armor_per_level(),
            max_armor_mitigation: default_max_mitigation(),
            resistance_per_level: default_resistance_per_level(),
            max_resist_mitigation: default_max_mitigation(),
            healing_threat_factor: default_healing_threat_factor(),
        }
    }
}

fn default_base_melee_miss() -> f64 {
    0.05
}
fn default_miss_per_level() -> f64 {
    0.01
}
fn default_base_dodge() -> f64 {
    0.05
}
fn default_avoidance_per_level() -> f64 {
    0.005
}
fn default_base_parry() -> f64 {
    0.05
}
fn default_base_block() -> f64 {
    0.05
}
fn default_block_value() -> f64 {
    30.0
}
fn default_base_glance() -> f64 {
    0.10
}
fn default_glance_per_level() -> f64 {
    0.10
}
fn default_glance_multiplier() -> f64 {
    0.65
}
fn default_spell_miss_by_level() -> Vec<f64> {
    vec![0.04, 0.05, 0.06, 0.17]
}
fn default_min_spell_miss() -> f64 {
    0.01
}
fn default_melee_crit_multiplier() -> f64 {
    2.0
}
fn default_spell_crit_multiplier() -> f64 {
    1.5
}
fn default_armor_base() -> f64 {
    400.0
}
fn default_armor_per_level() -> f64 {
    85.0
}
fn default_max_mitigation() -> f64 {
    0.75
}
fn default_resistance_per_level() -> f64 {
    5.0
}
fn default_healing_threat_factor() -> f64 {
    0.5
}
