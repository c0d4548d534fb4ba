//! Static plan catalog
//!
//! The set of plans is fixed at deploy time. The catalog is a pure lookup
//! passed as a dependency wherever plan data is needed; nothing mutates it at
//! runtime.

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, BillingResult};

/// Fixed plan identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanId {
    Free,
    Lite,
    Pro,
}

impl PlanId {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanId::Free => "free",
            PlanId::Lite => "lite",
            PlanId::Pro => "pro",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(PlanId::Free),
            "lite" => Some(PlanId::Lite),
            "pro" => Some(PlanId::Pro),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature flags attached to a plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlanFeatures {
    pub market: bool,
    pub pest: bool,
}

/// A subscription tier with price, quota, and feature flags
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: &'static str,
    pub price_inr: i64,
    pub monthly_quota: i64,
    pub features: PlanFeatures,
}

impl Plan {
    /// Plan price in minor currency units (paise)
    pub fn price_paise(&self) -> i64 {
        self.price_inr * 100
    }
}

// Free gets a single trial credit per month; paid tiers unlock the market and
// pest enrichment sections.
static PLANS: [Plan; 3] = [
    Plan {
        id: PlanId::Free,
        name: "Free",
        price_inr: 0,
        monthly_quota: 1,
        features: PlanFeatures {
            market: false,
            pest: false,
        },
    },
    Plan {
        id: PlanId::Lite,
        name: "Lite",
        price_inr: 199,
        monthly_quota: 50,
        features: PlanFeatures {
            market: true,
            pest: true,
        },
    },
    Plan {
        id: PlanId::Pro,
        name: "Pro",
        price_inr: 499,
        monthly_quota: 500,
        features: PlanFeatures {
            market: true,
            pest: true,
        },
    },
];

/// Read-only lookup `plan id -> Plan`
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanCatalog;

impl PlanCatalog {
    pub fn get(&self, id: PlanId) -> &'static Plan {
        match id {
            PlanId::Free => &PLANS[0],
            PlanId::Lite => &PLANS[1],
            PlanId::Pro => &PLANS[2],
        }
    }

    /// Resolve a plan from its string id, failing on ids outside the fixed set
    pub fn resolve(&self, id: &str) -> BillingResult<&'static Plan> {
        PlanId::parse(id)
            .map(|p| self.get(p))
            .ok_or_else(|| BillingError::UnknownPlan(id.to_string()))
    }

    pub fn all(&self) -> &'static [Plan] {
        &PLANS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_plans() {
        let catalog = PlanCatalog;
        assert_eq!(catalog.resolve("free").unwrap().monthly_quota, 1);
        assert_eq!(catalog.resolve("lite").unwrap().price_inr, 199);
        assert_eq!(catalog.resolve("pro").unwrap().monthly_quota, 500);
    }

    #[test]
    fn test_resolve_unknown_plan_fails() {
        let catalog = PlanCatalog;
        assert!(matches!(
            catalog.resolve("enterprise"),
            Err(BillingError::UnknownPlan(_))
        ));
    }

    #[test]
    fn test_price_in_minor_units() {
        let catalog = PlanCatalog;
        assert_eq!(catalog.get(PlanId::Lite).price_paise(), 19_900);
        assert_eq!(catalog.get(PlanId::Free).price_paise(), 0);
    }

    #[test]
    fn test_plan_id_round_trip() {
        for plan in PlanCatalog.all() {
            assert_eq!(PlanId::parse(plan.id.as_str()), Some(plan.id));
        }
        assert_eq!(PlanId::parse("FREE"), None);
    }
}
