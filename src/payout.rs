use rand::Rng;
use serde::Serialize;

use crate::devnet;
use crate::policy::Policy;
use crate::TOKEN_SYMBOL;

/// Cosmetic receipt for a triggered payout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulatedTransaction {
    pub hash: String,
    pub from_wallet: String,
    pub amount: u32,
    pub block_number: u64,
    pub fee: f64,
}

impl SimulatedTransaction {
    pub fn new<R: Rng>(rng: &mut R, from_wallet: &str, amount: u32, block_number: u64) -> Self {
        Self {
            hash: devnet::random_tx_hash(rng),
            from_wallet: from_wallet.to_string(),
            amount,
            block_number,
            fee: devnet::DEMO_FEE,
        }
    }

    pub fn block_label(&self) -> String {
        format!("#{}", devnet::format_thousands(self.block_number))
    }

    pub fn amount_label(&self) -> String {
        format!("{} {}", self.amount, TOKEN_SYMBOL)
    }

    pub fn fee_label(&self) -> String {
        format!("{:.6} {}", self.fee, TOKEN_SYMBOL)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PayoutOutcome {
    Triggered {
        rainfall_mm: f64,
        threshold: f64,
        simulated: bool,
        message: String,
        detail: String,
        tx: SimulatedTransaction,
    },
    NotMet {
        rainfall_mm: f64,
        threshold: f64,
        message: String,
        detail: String,
    },
}

impl PayoutOutcome {
    pub fn is_triggered(&self) -> bool {
        matches!(self, PayoutOutcome::Triggered { .. })
    }

    pub fn rainfall_mm(&self) -> f64 {
        match self {
            PayoutOutcome::Triggered { rainfall_mm, .. } | PayoutOutcome::NotMet { rainfall_mm, .. } => {
                *rainfall_mm
            }
        }
    }

    pub fn message(&self) -> &str {
        match self {
            PayoutOutcome::Triggered { message, .. } | PayoutOutcome::NotMet { message, .. } => message,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            PayoutOutcome::Triggered { detail, .. } | PayoutOutcome::NotMet { detail, .. } => detail,
        }
    }

    pub fn tx(&self) -> Option<&SimulatedTransaction> {
        match self {
            PayoutOutcome::Triggered { tx, .. } => Some(tx),
            PayoutOutcome::NotMet { .. } => None,
        }
    }
}

/// The trigger rule: rainfall at or above the threshold pays out.
pub fn is_triggered(threshold: f64, rainfall_mm: f64) -> bool {
    rainfall_mm >= threshold
}

fn sent_message(policy: &Policy) -> String {
    format!("Payout Sent — {} {}", policy.payout, TOKEN_SYMBOL)
}

/// Compare an observation against the policy.
pub fn evaluate<R: Rng>(
    rng: &mut R,
    policy: &Policy,
    rainfall_mm: f64,
    wallet: &str,
    block_number: u64,
) -> PayoutOutcome {
    if is_triggered(policy.threshold, rainfall_mm) {
        PayoutOutcome::Triggered {
            rainfall_mm,
            threshold: policy.threshold,
            simulated: false,
            message: sent_message(policy),
            detail: format!(
                "Rainfall ({} mm) exceeded threshold. Funds transferred.",
                devnet::fixed_1(rainfall_mm)
            ),
            tx: SimulatedTransaction::new(rng, wallet, policy.payout, block_number),
        }
    } else {
        PayoutOutcome::NotMet {
            rainfall_mm,
            threshold: policy.threshold,
            message: "Condition Not Met — No Payout".to_string(),
            detail: format!(
                "Rainfall ({} mm) below threshold ({} mm).",
                devnet::fixed_1(rainfall_mm),
                policy.threshold
            ),
        }
    }
}

/// Rainfall fabricated by the manual override: `threshold + 5 + [0, 20)`.
pub fn override_rainfall<R: Rng>(rng: &mut R, threshold: f64) -> f64 {
    threshold + 5.0 + f64::from(rng.gen_range(0u32..20))
}

/// Manual override. Always triggered, whatever was observed.
pub fn simulate<R: Rng>(rng: &mut R, policy: &Policy, wallet: &str, block_number: u64) -> PayoutOutcome {
    let rainfall_mm = override_rainfall(rng, policy.threshold);
    PayoutOutcome::Triggered {
        rainfall_mm,
        threshold: policy.threshold,
        simulated: true,
        message: sent_message(policy),
        detail: format!(
            "[Demo] Simulated rainfall: {rainfall_mm} mm > threshold {} mm.",
            policy.threshold
        ),
        tx: SimulatedTransaction::new(rng, wallet, policy.payout, block_number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyRequest;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn policy(threshold: f64) -> Policy {
        PolicyRequest::new("Accra", threshold, 50).validate().unwrap()
    }

    #[test]
    fn trigger_rule_is_inclusive() {
        assert!(is_triggered(5.0, 5.0));
        assert!(is_triggered(5.0, 7.2));
        assert!(!is_triggered(5.0, 4.99));
    }

    #[test]
    fn trigger_rule_holds_over_a_grid() {
        let mut t = 0.1;
        while t < 30.0 {
            let mut r = 0.0;
            while r < 30.0 {
                assert_eq!(is_triggered(t, r), r >= t);
                r += 0.7;
            }
            t += 1.3;
        }
    }

    #[test]
    fn heavy_rain_sends_payout() {
        let mut rng = StdRng::seed_from_u64(11);
        let out = evaluate(&mut rng, &policy(5.0), 7.2, "wallet", 8_412_047);
        assert!(out.is_triggered());
        assert_eq!(out.message(), "Payout Sent — 50 DEMO RALO");
        assert_eq!(out.detail(), "Rainfall (7.2 mm) exceeded threshold. Funds transferred.");
        let tx = out.tx().unwrap();
        assert_eq!(tx.amount, 50);
        assert_eq!(tx.from_wallet, "wallet");
        assert_eq!(tx.block_label(), "#8,412,047");
        assert_eq!(tx.fee_label(), "0.000021 DEMO RALO");
    }

    #[test]
    fn light_rain_is_not_met() {
        let mut rng = StdRng::seed_from_u64(11);
        let out = evaluate(&mut rng, &policy(5.0), 2.0, "wallet", 1);
        assert!(!out.is_triggered());
        assert_eq!(out.message(), "Condition Not Met — No Payout");
        assert_eq!(out.detail(), "Rainfall (2.0 mm) below threshold (5 mm).");
        assert!(out.tx().is_none());
    }

    #[test]
    fn rainfall_detail_rounds_ties_up() {
        let mut rng = StdRng::seed_from_u64(11);
        let out = evaluate(&mut rng, &policy(5.0), 1.25, "wallet", 1);
        assert_eq!(out.detail(), "Rainfall (1.3 mm) below threshold (5 mm).");
        let out = evaluate(&mut rng, &policy(0.2), 0.25, "wallet", 1);
        assert_eq!(out.detail(), "Rainfall (0.3 mm) exceeded threshold. Funds transferred.");
    }

    #[test]
    fn override_always_exceeds_threshold() {
        let mut rng = StdRng::seed_from_u64(99);
        for threshold in [0.1, 5.0, 42.5, 500.0] {
            for _ in 0..100 {
                let r = override_rainfall(&mut rng, threshold);
                assert!(r > threshold);
                assert!(r < threshold + 25.0);
            }
            let out = simulate(&mut rng, &policy(threshold), "wallet", 3);
            assert!(out.is_triggered());
            assert!(out.rainfall_mm() > threshold);
            assert!(out.detail().starts_with("[Demo] Simulated rainfall"));
        }
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let mut rng = StdRng::seed_from_u64(5);
        let v = serde_json::to_value(evaluate(&mut rng, &policy(5.0), 2.0, "w", 1)).unwrap();
        assert_eq!(v["status"], "not_met");
        let v = serde_json::to_value(simulate(&mut rng, &policy(5.0), "w", 1)).unwrap();
        assert_eq!(v["status"], "triggered");
        assert_eq!(v["simulated"], true);
    }
}
