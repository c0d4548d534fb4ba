//! Receipt tokens
//!
//! A receipt is a composite token `userId|planId|epochSeconds` generated at
//! order-creation time and embedded in the gateway order. Settlement can
//! recover the user and plan from it when the local ledger row is missing or
//! incomplete.

use uuid::Uuid;

pub fn build_receipt(user_id: Uuid, plan_id: &str, epoch_seconds: i64) -> String {
    format!("{}|{}|{}", user_id, plan_id, epoch_seconds)
}

/// Parse the user and plan segments out of a receipt token. The plan segment
/// comes back as a raw string; callers validate it against the catalog.
pub fn parse_receipt(receipt: &str) -> Option<(Uuid, &str)> {
    let mut parts = receipt.split('|');
    let user = Uuid::parse_str(parts.next()?).ok()?;
    let plan = parts.next()?;
    if plan.is_empty() {
        return None;
    }
    Some((user, plan))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let user = Uuid::new_v4();
        let token = build_receipt(user, "lite", 1_700_000_000);
        let (parsed_user, plan) = parse_receipt(&token).unwrap();
        assert_eq!(parsed_user, user);
        assert_eq!(plan, "lite");
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(parse_receipt("").is_none());
        assert!(parse_receipt("not-a-uuid|lite|123").is_none());
        assert!(parse_receipt(&format!("{}", Uuid::new_v4())).is_none());
        assert!(parse_receipt(&format!("{}|", Uuid::new_v4())).is_none());
    }

    #[test]
    fn test_plan_segment_is_not_validated_here() {
        let token = build_receipt(Uuid::new_v4(), "no-such-plan", 0);
        let (_, plan) = parse_receipt(&token).unwrap();
        assert_eq!(plan, "no-such-plan");
    }
}
