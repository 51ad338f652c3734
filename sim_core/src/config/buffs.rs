//! Raid, party and individual buff selection

use serde::{Deserialize, Serialize};

/// A buff that may be absent, present, or present with its talent improvement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TristateEffect {
    #[default]
    Missing,
    Regular,
    Improved,
}

impl TristateEffect {
    pub fn is_present(self) -> bool {
        self != TristateEffect::Missing
    }

    /// Pick `regular` or `improved` talent points for a present buff
    pub fn points(self, regular: i32, improved: i32) -> i32 {
        match self {
            TristateEffect::Missing => 0,
            TristateEffect::Regular => regular,
            TristateEffect::Improved => improved,
        }
    }
}

/// Buffs provided by the whole raid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaidBuffs {
    pub arcane_brilliance: bool,
    pub gift_of_the_wild: TristateEffect,
    pub thorns: TristateEffect,
    pub leader_of_the_pack: bool,
}

/// Buffs provided by party members (totems, paladin auras, shouts)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyBuffs {
    pub battle_shout: TristateEffect,
    pub strength_of_earth_totem: TristateEffect,
    pub stoneskin_totem: TristateEffect,
    pub windfury_totem: bool,
    pub devotion_aura: TristateEffect,
    pub retribution_aura: TristateEffect,
}

/// Buffs cast on one character
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndividualBuffs {
    pub blessing_of_kings: bool,
    pub blessing_of_might: TristateEffect,
    pub warchiefs_blessing: bool,
    /// Number of priests casting Power Infusion on this character
    pub power_infusions: u32,
    /// Number of druids casting Innervate on this character
    pub innervates: u32,
}

/// The three buff groups as they appear in a fight file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuffSelection {
    pub raid: RaidBuffs,
    pub party: PartyBuffs,
    pub individual: IndividualBuffs,
}
