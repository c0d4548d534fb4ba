//! Domain types for recommendation requests and responses

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Soil {
    Clay,
    Sandy,
    Loamy,
    Black,
    Silt,
    Peat,
    Chalk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Kharif,
    Rabi,
    Zaid,
}

impl std::fmt::Display for Soil {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Soil::Clay => "clay",
            Soil::Sandy => "sandy",
            Soil::Loamy => "loamy",
            Soil::Black => "black",
            Soil::Silt => "silt",
            Soil::Peat => "peat",
            Soil::Chalk => "chalk",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for Season {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Season::Kharif => "kharif",
            Season::Rabi => "rabi",
            Season::Zaid => "zaid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Climate {
    #[serde(rename = "tempC", skip_serializing_if = "Option::is_none")]
    pub temp_c: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rain_mm: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecommendRequest {
    #[serde(rename = "soilType")]
    pub soil_type: Soil,
    pub season: Season,
    #[serde(default)]
    pub month: Option<u8>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub climate: Option<Climate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    #[default]
    Steady,
    Falling,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarketPoint {
    pub month: u8,
    pub price: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketInfo {
    #[serde(default)]
    pub trend: Trend,
    #[serde(default)]
    pub last6m: Vec<MarketPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Likelihood {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskItem {
    pub name: String,
    pub likelihood: Likelihood,
    pub tip: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PestDisease {
    #[serde(default)]
    pub risks: Vec<RiskItem>,
}

/// Fully assembled recommendation item: scorer output plus enrichment
#[derive(Debug, Clone, Serialize)]
pub struct CropItem {
    pub crop: String,
    pub fit_score: f64,
    pub duration_days: i32,
    pub expected_yield_qpa: (f64, f64),
    pub explanation: String,
    pub best_practices: Vec<String>,
    pub market: MarketInfo,
    pub pest_disease: PestDisease,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendResponse {
    pub items: Vec<CropItem>,
}
