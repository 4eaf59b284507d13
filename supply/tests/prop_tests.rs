use std::sync::Arc;

use proptest::prelude::*;

use proofmint_nullables::NullStore;
use proofmint_supply::{compute_reward, IssueRequest, RequesterProfile, SupplyLedger};
use proofmint_types::{IssuancePolicy, IssuanceRate, RequestId, Timestamp, TokenAmount};

fn ledger(max_supply: u64, halving_interval: u64) -> SupplyLedger {
    let mut policy = IssuancePolicy::standard();
    policy.max_supply = max_supply;
    policy.halving_interval = halving_interval;
    SupplyLedger::open(Arc::new(NullStore::new()), &policy).unwrap()
}

proptest! {
    /// The total never exceeds the cap and equals the sum of accepted amounts.
    #[test]
    fn total_tracks_accepted_and_respects_cap(
        cap in 1u64..10_000,
        amounts in prop::collection::vec(1u128..500, 1..60),
    ) {
        let ledger = ledger(cap, 1_000_000);
        let mut accepted = 0u128;
        for amount in amounts {
            let request = IssueRequest {
                request_id: RequestId::random(),
                amount: TokenAmount::new(amount),
                priced_at: ledger.current_rate(),
                timestamp: Timestamp::new(0),
            };
            if ledger.try_issue(request).unwrap().is_accepted() {
                accepted += amount;
            }
            prop_assert!(ledger.snapshot().total_minted.raw() <= cap as u128);
        }
        prop_assert_eq!(ledger.snapshot().total_minted.raw(), accepted);
    }

    /// After n accepted issuances the rate has halved exactly n / interval times.
    #[test]
    fn halvings_follow_accepted_count(interval in 1u64..10, n in 0u64..50) {
        let ledger = ledger(u64::MAX / 2, interval);
        for _ in 0..n {
            let request = IssueRequest {
                request_id: RequestId::random(),
                amount: TokenAmount::new(1),
                priced_at: ledger.current_rate(),
                timestamp: Timestamp::new(0),
            };
            prop_assert!(ledger.try_issue(request).unwrap().is_accepted());
        }
        prop_assert_eq!(ledger.current_rate().halvings as u64, n / interval);
    }

    /// Rewards never decrease with more correct answers and never exceed the
    /// fully-multiplied maximum.
    #[test]
    fn reward_is_monotonic_in_score(total in 1u32..50, a in 0u32..50, b in 0u32..50, halvings in 0u32..20) {
        let policy = IssuancePolicy::standard();
        let (lo, hi) = (a.min(b).min(total), a.max(b).min(total));
        let rate = IssuanceRate { initial_bps: 10_000, halvings };
        let profile = RequesterProfile::default();
        let r_lo = compute_reward(&policy, lo, total, rate, &profile).unwrap();
        let r_hi = compute_reward(&policy, hi, total, rate, &profile).unwrap();
        prop_assert!(r_lo.amount <= r_hi.amount);
        prop_assert!(r_hi.amount.raw() <= policy.base_amount as u128 * 3 / 2);
        prop_assert!(r_hi.remainder < r_hi.divisor);
    }
}
