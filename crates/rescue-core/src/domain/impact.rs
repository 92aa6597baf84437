//! Impact estimates derived from rescued weight.

use serde::{Deserialize, Serialize};

const KG_PER_MEAL: f64 = 0.5;
const CO2_KG_PER_KG: f64 = 2.5;
const WATER_LITRES_PER_KG: f64 = 290.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Impact {
    pub meals: u64,
    pub co2_kg: f64,
    pub water_litres: u64,
}

impl Impact {
    /// `None` when there is no weight to go on.
    pub fn from_weight(weight_kg: Option<f64>) -> Option<Self> {
        let kg = weight_kg.filter(|kg| *kg > 0.0 && kg.is_finite())?;
        Some(Self {
            meals: (kg / KG_PER_MEAL).floor() as u64,
            co2_kg: kg * CO2_KG_PER_KG,
            water_litres: (kg * WATER_LITRES_PER_KG).round() as u64,
        })
    }
}

impl std::ops::Add for Impact {
    type Output = Impact;

    fn add(self, rhs: Self) -> Self::Output {
        Impact {
            meals: self.meals + rhs.meals,
            co2_kg: self.co2_kg + rhs.co2_kg,
            water_litres: self.water_litres + rhs.water_litres,
        }
    }
}
