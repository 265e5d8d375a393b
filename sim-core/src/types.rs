//! Small shared value types used across the kernel.

use serde::{Deserialize, Serialize};

/// Stable index into the agent table's structure-of-arrays. Never reused
/// within a run; indices of dead agents stay valid (but `alive = false`)
/// until `compact()` runs.
pub type AgentId = u32;

/// Sentinel for "no parent" / "no father" lookups.
pub const NONE_AGENT: AgentId = u32::MAX;

/// Index into the region table, `0..regions`.
pub type RegionId = u32;

pub const NUM_BELIEF_DIMS: usize = 4;
pub const NUM_GOODS: usize = 5;

/// The five traded goods, in the fixed order used by every `[f64; NUM_GOODS]` array.
pub const GOODS: [&str; NUM_GOODS] = ["food", "energy", "tools", "services", "luxury"];

pub const FOOD: usize = 0;
pub const ENERGY: usize = 1;
pub const TOOLS: usize = 2;
pub const SERVICES: usize = 3;
pub const LUXURY: usize = 4;

/// Economic sector an agent draws income from; indexes into the region's
/// per-sector production/price tables (sectors map 1:1 onto goods here).
pub type Sector = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBand {
    Age0To5,
    Age5To15,
    Age15To50,
    Age50To70,
    Age70To85,
    Age85To90,
    Age90Plus,
}

impl AgeBand {
    pub const ALL: [AgeBand; 7] = [
        AgeBand::Age0To5,
        AgeBand::Age5To15,
        AgeBand::Age15To50,
        AgeBand::Age50To70,
        AgeBand::Age70To85,
        AgeBand::Age85To90,
        AgeBand::Age90Plus,
    ];

    pub fn of_age(age: u32) -> AgeBand {
        match age {
            0..=4 => AgeBand::Age0To5,
            5..=14 => AgeBand::Age5To15,
            15..=49 => AgeBand::Age15To50,
            50..=69 => AgeBand::Age50To70,
            70..=84 => AgeBand::Age70To85,
            85..=89 => AgeBand::Age85To90,
            _ => AgeBand::Age90Plus,
        }
    }

    /// Annual mortality probability for this age band, before regional modulation.
    pub fn annual_mortality(self) -> f64 {
        match self {
            AgeBand::Age0To5 => 0.01,
            AgeBand::Age5To15 => 0.001,
            AgeBand::Age15To50 => 0.002,
            AgeBand::Age50To70 => 0.01,
            AgeBand::Age70To85 => 0.05,
            AgeBand::Age85To90 => 0.15,
            AgeBand::Age90Plus => 1.0,
        }
    }

    pub fn index(self) -> usize {
        AgeBand::ALL.iter().position(|b| *b == self).unwrap()
    }
}

/// Economic-system tag a region can transition between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EconomicSystem {
    Mixed,
    Cooperative,
    Market,
    Feudal,
    Planned,
}

impl EconomicSystem {
    pub const ALL: [EconomicSystem; 5] = [
        EconomicSystem::Mixed,
        EconomicSystem::Cooperative,
        EconomicSystem::Market,
        EconomicSystem::Feudal,
        EconomicSystem::Planned,
    ];

    /// Per-variant coefficient table entry: (efficiency bonus, welfare bonus,
    /// institutional inertia applied against transition probability).
    pub fn coefficients(self) -> SystemCoefficients {
        match self {
            EconomicSystem::Mixed => SystemCoefficients {
                efficiency_bonus: 0.0,
                welfare_bonus: 0.0,
                inertia: 0.5,
            },
            EconomicSystem::Cooperative => SystemCoefficients {
                efficiency_bonus: -0.05,
                welfare_bonus: 0.15,
                inertia: 0.6,
            },
            EconomicSystem::Market => SystemCoefficients {
                efficiency_bonus: 0.15,
                welfare_bonus: -0.05,
                inertia: 0.55,
            },
            EconomicSystem::Feudal => SystemCoefficients {
                efficiency_bonus: -0.1,
                welfare_bonus: -0.15,
                inertia: 0.8,
            },
            EconomicSystem::Planned => SystemCoefficients {
                efficiency_bonus: 0.05,
                welfare_bonus: 0.05,
                inertia: 0.7,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SystemCoefficients {
    pub efficiency_bonus: f64,
    pub welfare_bonus: f64,
    pub inertia: f64,
}

/// Climate proxy derived from region latitude, used by the demand model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Climate {
    Cold,
    Temperate,
    Hot,
}

impl Climate {
    pub fn of_latitude(lat: f64) -> Climate {
        let l = lat.abs();
        if l > 0.66 {
            Climate::Cold
        } else if l > 0.33 {
            Climate::Temperate
        } else {
            Climate::Hot
        }
    }
}
