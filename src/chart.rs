//! Birth chart model and planetary effects calculator.
//!
//! The chart is built from two compile-time reference tables:
//!
//! - [`PLANETS`]: the 9 bodies with their exaltation, debilitation and ruling
//!   houses plus natural friends and enemies.
//! - [`HOUSES`]: the 12 houses with their ruling and significator planets.
//!
//! A [`Chart`] copies the house table (every house starts unoccupied), receives
//! a planet→house assignment and then derives one effect string per occupied
//! house. Charts are cheap to build and are created fresh for every query.
//!
//! ```rust
//! use astro_insights::chart::Chart;
//!
//! let mut chart = Chart::new();
//! chart.assign_planets_to_houses([("Sun", 1), ("Saturn", 7)]);
//! let effects = chart.calculate_planetary_effects();
//! assert_eq!(
//!     effects[&1],
//!     "Sun is exalted in house 1, giving strong positive effects."
//! );
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The 9 classical bodies used by the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlanetName {
    Sun,
    Moon,
    Mars,
    Mercury,
    Jupiter,
    Venus,
    Saturn,
    Rahu,
    Ketu,
}

/// All planets in table order.
pub const ALL_PLANETS: [PlanetName; 9] = [
    PlanetName::Sun,
    PlanetName::Moon,
    PlanetName::Mars,
    PlanetName::Mercury,
    PlanetName::Jupiter,
    PlanetName::Venus,
    PlanetName::Saturn,
    PlanetName::Rahu,
    PlanetName::Ketu,
];

impl PlanetName {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sun => "Sun",
            Self::Moon => "Moon",
            Self::Mars => "Mars",
            Self::Mercury => "Mercury",
            Self::Jupiter => "Jupiter",
            Self::Venus => "Venus",
            Self::Saturn => "Saturn",
            Self::Rahu => "Rahu",
            Self::Ketu => "Ketu",
        }
    }

    /// Exact, case-sensitive lookup. `"sun"` does not match.
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_PLANETS.iter().copied().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for PlanetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable reference data for one planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Planet {
    pub name: PlanetName,
    pub exalted_house: Option<u8>,
    pub debilitated_house: Option<u8>,
    /// Absent for the lunar nodes (Rahu, Ketu).
    pub ruling_house: Option<u8>,
    pub friendly_planets: &'static [PlanetName],
    pub enemy_planets: &'static [PlanetName],
}

/// Strength of a planet in a given house.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dignity {
    Exalted,
    Debilitated,
    Neutral,
}

/// Natural relationship between two planets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Friendly,
    Enemy,
    Neutral,
}

impl Relation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Relation::Friendly => "friendly",
            Relation::Enemy => "an enemy",
            Relation::Neutral => "neutral",
        }
    }
}

impl Planet {
    /// Exaltation is checked before debilitation; no planet in [`PLANETS`]
    /// shares a house between the two.
    pub fn dignity_in(&self, house_number: u8) -> Dignity {
        if self.exalted_house == Some(house_number) {
            Dignity::Exalted
        } else if self.debilitated_house == Some(house_number) {
            Dignity::Debilitated
        } else {
            Dignity::Neutral
        }
    }

    /// How this planet regards `other`. The table is not symmetric: Mercury
    /// lists the Sun as a friend, the Sun does not list Mercury at all.
    pub fn relation_to(&self, other: PlanetName) -> Relation {
        if self.friendly_planets.contains(&other) {
            Relation::Friendly
        } else if self.enemy_planets.contains(&other) {
            Relation::Enemy
        } else {
            Relation::Neutral
        }
    }
}

use PlanetName::*;

/// Planet reference table.
pub static PLANETS: [Planet; 9] = [
    Planet {
        name: Sun,
        exalted_house: Some(1),
        debilitated_house: Some(7),
        ruling_house: Some(5),
        friendly_planets: &[Moon, Mars, Jupiter],
        enemy_planets: &[Venus, Saturn, Rahu],
    },
    Planet {
        name: Moon,
        exalted_house: Some(2),
        debilitated_house: Some(8),
        ruling_house: Some(4),
        friendly_planets: &[Sun, Mercury],
        enemy_planets: &[Rahu, Ketu],
    },
    Planet {
        name: Mars,
        exalted_house: Some(10),
        debilitated_house: Some(4),
        ruling_house: Some(1),
        friendly_planets: &[Sun, Moon, Jupiter],
        enemy_planets: &[Mercury, Ketu],
    },
    Planet {
        name: Mercury,
        exalted_house: Some(6),
        debilitated_house: Some(12),
        ruling_house: Some(3),
        friendly_planets: &[Sun, Venus, Rahu],
        enemy_planets: &[Moon],
    },
    Planet {
        name: Jupiter,
        exalted_house: Some(4),
        debilitated_house: Some(10),
        ruling_house: Some(9),
        friendly_planets: &[Sun, Moon, Mars],
        enemy_planets: &[Mercury, Venus],
    },
    Planet {
        name: Venus,
        exalted_house: Some(12),
        debilitated_house: Some(6),
        ruling_house: Some(7),
        friendly_planets: &[Mercury, Saturn, Ketu],
        enemy_planets: &[Sun, Moon, Rahu],
    },
    Planet {
        name: Saturn,
        exalted_house: Some(7),
        debilitated_house: Some(1),
        ruling_house: Some(10),
        friendly_planets: &[Mercury, Venus, Rahu],
        enemy_planets: &[Sun, Moon, Mars],
    },
    Planet {
        name: Rahu,
        exalted_house: Some(3),
        debilitated_house: Some(9),
        ruling_house: None,
        friendly_planets: &[Mercury, Saturn, Ketu],
        enemy_planets: &[Sun, Mars],
    },
    Planet {
        name: Ketu,
        exalted_house: Some(9),
        debilitated_house: Some(3),
        ruling_house: None,
        friendly_planets: &[Venus, Rahu],
        enemy_planets: &[Moon, Mars],
    },
];

/// One of the 12 houses, plus the planet placed in it (if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct House {
    pub house_number: u8,
    pub ruling_planet: PlanetName,
    pub significator_planets: &'static [PlanetName],
    pub planet: Option<&'static Planet>,
}

impl House {
    const fn empty(
        house_number: u8,
        ruling_planet: PlanetName,
        significator_planets: &'static [PlanetName],
    ) -> Self {
        Self {
            house_number,
            ruling_planet,
            significator_planets,
            planet: None,
        }
    }

    /// Significators joined with `", "`, e.g. `"Saturn, Mars, Moon"` for house 8.
    pub fn significator_label(&self) -> String {
        self.significator_planets
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// House reference table, every house unoccupied.
pub static HOUSES: [House; 12] = [
    House::empty(1, Mars, &[Sun]),
    House::empty(2, Venus, &[Jupiter]),
    House::empty(3, Mercury, &[Mars]),
    House::empty(4, Moon, &[Moon]),
    House::empty(5, Sun, &[Jupiter]),
    House::empty(6, Mercury, &[Ketu]),
    House::empty(7, Venus, &[Venus]),
    House::empty(8, Mars, &[Saturn, Mars, Moon]),
    House::empty(9, Jupiter, &[Jupiter]),
    House::empty(10, Saturn, &[Saturn]),
    House::empty(11, Saturn, &[Jupiter]),
    House::empty(12, Jupiter, &[Rahu]),
];

/// A per-request birth chart.
#[derive(Debug, Clone)]
pub struct Chart {
    houses: [House; 12],
}

impl Default for Chart {
    fn default() -> Self {
        Self::new()
    }
}

impl Chart {
    pub fn new() -> Self {
        Self { houses: HOUSES }
    }

    pub fn houses(&self) -> &[House] {
        &self.houses
    }

    pub fn planet_by_name(&self, name: &str) -> Option<&'static Planet> {
        PLANETS.iter().find(|p| p.name.as_str() == name)
    }

    pub fn house_by_number(&self, house_number: i64) -> Option<&House> {
        self.houses
            .iter()
            .find(|h| i64::from(h.house_number) == house_number)
    }

    fn house_by_number_mut(&mut self, house_number: i64) -> Option<&mut House> {
        self.houses
            .iter_mut()
            .find(|h| i64::from(h.house_number) == house_number)
    }

    /// Places planets into houses.
    ///
    /// Entries naming an unknown planet or a house outside 1–12 are skipped
    /// without error. When two planets target the same house the later entry
    /// wins.
    pub fn assign_planets_to_houses<I, S>(&mut self, positions: I)
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        for (name, house_number) in positions {
            let Some(planet) = self.planet_by_name(name.as_ref()) else {
                continue;
            };
            if let Some(house) = self.house_by_number_mut(house_number) {
                house.planet = Some(planet);
            }
        }
    }

    /// One effect sentence per occupied house, ordered by house number.
    pub fn calculate_planetary_effects(&self) -> BTreeMap<u8, String> {
        self.houses
            .iter()
            .filter_map(|house| {
                house
                    .planet
                    .map(|planet| (house.house_number, determine_effect(planet, house)))
            })
            .collect()
    }

    /// Renders the chart as one line per house:
    /// `House <n>: Ruling Planet - <ruler>, Planet - <occupant or None>`.
    pub fn display_chart(&self) -> String {
        let mut out = String::new();
        for house in &self.houses {
            let occupant = house.planet.map(|p| p.name.as_str()).unwrap_or("None");
            out.push_str(&format!(
                "House {}: Ruling Planet - {}, Planet - {}\n",
                house.house_number, house.ruling_planet, occupant
            ));
        }
        out
    }

    /// One line per house with its significators and, when occupied, how the
    /// occupant regards the house ruler:
    /// `House 1: significators Sun; Sun regards ruler Mars as friendly`.
    pub fn house_details(&self) -> String {
        let mut out = String::new();
        for house in &self.houses {
            out.push_str(&format!(
                "House {}: significators {}",
                house.house_number,
                house.significator_label()
            ));
            match house.planet {
                Some(planet) if planet.name == house.ruling_planet => {
                    out.push_str(&format!("; {} rules this house", planet.name));
                }
                Some(planet) => {
                    let relation = planet.relation_to(house.ruling_planet);
                    out.push_str(&format!(
                        "; {} regards ruler {} as {}",
                        planet.name,
                        house.ruling_planet,
                        relation.as_str()
                    ));
                }
                None => {}
            }
            out.push('\n');
        }
        out
    }
}

fn determine_effect(planet: &Planet, house: &House) -> String {
    let n = house.house_number;
    match planet.dignity_in(n) {
        Dignity::Exalted => format!(
            "{} is exalted in house {}, giving strong positive effects.",
            planet.name, n
        ),
        Dignity::Debilitated => format!(
            "{} is debilitated in house {}, giving weak or negative effects.",
            planet.name, n
        ),
        Dignity::Neutral => format!("{} is neutral in house {}.", planet.name, n),
    }
}

/// Rendered chart plus its effects, ready to be handed to the prompt.
#[derive(Debug, Clone, Serialize)]
pub struct BirthChartReport {
    pub birth_chart: String,
    pub effects: BTreeMap<u8, String>,
}

/// Builds a chart from `positions`, computes effects and renders it.
pub fn generate_birth_chart<I, S>(positions: I) -> BirthChartReport
where
    I: IntoIterator<Item = (S, i64)>,
    S: AsRef<str>,
{
    let mut chart = Chart::new();
    chart.assign_planets_to_houses(positions);
    BirthChartReport {
        effects: chart.calculate_planetary_effects(),
        birth_chart: chart.display_chart(),
    }
}
