//! Static crop table
//!
//! Fit factors per soil and season; anything absent scores the neutral 0.35
//! baseline in the scorer. Yields are quintals per acre.

use crate::types::{Season, Soil};

#[derive(Debug)]
pub struct CropSpec {
    pub name: &'static str,
    pub soils: &'static [(Soil, f64)],
    pub seasons: &'static [(Season, f64)],
    pub duration_days: i32,
    pub yield_qpa: (f64, f64),
}

pub static CROPS: [CropSpec; 10] = [
    CropSpec {
        name: "paddy",
        soils: &[(Soil::Clay, 0.95), (Soil::Loamy, 0.75), (Soil::Silt, 0.7)],
        seasons: &[(Season::Kharif, 0.95), (Season::Rabi, 0.35)],
        duration_days: 120,
        yield_qpa: (18.0, 30.0),
    },
    CropSpec {
        name: "wheat",
        soils: &[(Soil::Loamy, 0.9), (Soil::Sandy, 0.65), (Soil::Clay, 0.55)],
        seasons: &[(Season::Rabi, 0.95)],
        duration_days: 110,
        yield_qpa: (12.0, 20.0),
    },
    CropSpec {
        name: "maize",
        soils: &[(Soil::Loamy, 0.85), (Soil::Sandy, 0.75), (Soil::Black, 0.7)],
        seasons: &[(Season::Kharif, 0.8), (Season::Rabi, 0.6)],
        duration_days: 100,
        yield_qpa: (10.0, 18.0),
    },
    CropSpec {
        name: "soybean",
        soils: &[(Soil::Black, 0.95), (Soil::Loamy, 0.75)],
        seasons: &[(Season::Kharif, 0.85)],
        duration_days: 105,
        yield_qpa: (8.0, 15.0),
    },
    CropSpec {
        name: "cotton",
        soils: &[(Soil::Black, 0.9), (Soil::Loamy, 0.7)],
        seasons: &[(Season::Kharif, 0.8)],
        duration_days: 150,
        yield_qpa: (8.0, 14.0),
    },
    CropSpec {
        name: "mustard",
        soils: &[(Soil::Loamy, 0.8), (Soil::Sandy, 0.6)],
        seasons: &[(Season::Rabi, 0.85)],
        duration_days: 95,
        yield_qpa: (6.0, 10.0),
    },
    CropSpec {
        name: "chickpea",
        soils: &[(Soil::Loamy, 0.85), (Soil::Sandy, 0.6)],
        seasons: &[(Season::Rabi, 0.85)],
        duration_days: 100,
        yield_qpa: (7.0, 12.0),
    },
    CropSpec {
        name: "sorghum",
        soils: &[(Soil::Sandy, 0.8), (Soil::Loamy, 0.7)],
        seasons: &[(Season::Kharif, 0.75), (Season::Rabi, 0.5)],
        duration_days: 105,
        yield_qpa: (8.0, 13.0),
    },
    CropSpec {
        name: "pigeon pea",
        soils: &[(Soil::Black, 0.85), (Soil::Loamy, 0.7)],
        seasons: &[(Season::Kharif, 0.8)],
        duration_days: 160,
        yield_qpa: (6.0, 11.0),
    },
    CropSpec {
        name: "groundnut",
        soils: &[(Soil::Sandy, 0.9), (Soil::Loamy, 0.75)],
        seasons: &[(Season::Kharif, 0.8)],
        duration_days: 110,
        yield_qpa: (7.0, 12.0),
    },
];
