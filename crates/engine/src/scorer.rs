//! Rule-based crop scoring
//!
//! Pure function over the static crop table: average of soil and season fit
//! with small climate nudges, clamped to [0, 1], ranked descending.

use serde::Serialize;

use crate::crops::{CropSpec, CROPS};
use crate::types::{Climate, Season, Soil};

/// Fit factor for soils/seasons missing from a crop's table
const NEUTRAL_FIT: f64 = 0.35;

/// Scorer output for a single crop, before enrichment
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCrop {
    pub crop: String,
    pub fit_score: f64,
    pub duration_days: i32,
    pub expected_yield_qpa: (f64, f64),
}

fn soil_fit(spec: &CropSpec, soil: Soil) -> f64 {
    spec.soils
        .iter()
        .find(|(s, _)| *s == soil)
        .map(|(_, fit)| *fit)
        .unwrap_or(NEUTRAL_FIT)
}

fn season_fit(spec: &CropSpec, season: Season) -> f64 {
    spec.seasons
        .iter()
        .find(|(s, _)| *s == season)
        .map(|(_, fit)| *fit)
        .unwrap_or(NEUTRAL_FIT)
}

/// Rank all crops for the given conditions, best fit first
pub fn score(soil: Soil, season: Season, climate: Option<&Climate>) -> Vec<(&'static CropSpec, f64)> {
    let mut out: Vec<(&'static CropSpec, f64)> = CROPS
        .iter()
        .map(|spec| {
            let mut s = 0.5 * (soil_fit(spec, soil) + season_fit(spec, season));

            if let Some(climate) = climate {
                if spec.name == "paddy" {
                    if let Some(rain) = climate.rain_mm {
                        s += if rain >= 50.0 { 0.05 } else { -0.03 };
                    }
                }
                if spec.name == "wheat" {
                    if let Some(temp) = climate.temp_c {
                        s += if (10.0..=25.0).contains(&temp) { 0.04 } else { -0.02 };
                    }
                }
            }

            (spec, s.clamp(0.0, 1.0))
        })
        .collect();

    // Stable sort keeps table order for equal scores
    out.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    out
}

/// Take the top `n` scored crops as response items, scores rounded to 2 dp
pub fn top_items(scored: &[(&'static CropSpec, f64)], n: usize) -> Vec<ScoredCrop> {
    scored
        .iter()
        .take(n)
        .map(|(spec, fit)| ScoredCrop {
            crop: spec.name.to_string(),
            fit_score: (fit * 100.0).round() / 100.0,
            duration_days: spec.duration_days,
            expected_yield_qpa: spec.yield_qpa,
        })
        .collect()
}
