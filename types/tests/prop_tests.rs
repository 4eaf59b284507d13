use proptest::prelude::*;

use proofmint_types::{Hash256, IssuanceRate, RequestId, RequestState, Timestamp, TokenAmount};

fn any_state() -> impl Strategy<Value = RequestState> {
    use RequestState::*;
    prop::sample::select(vec![
        Received,
        Verifying,
        Screening,
        ComplianceCheck,
        Calculating,
        LedgerCheck,
        Minting,
        Confirmed,
        Blocked,
        Rejected,
        SupplyExceeded,
        MintFailed,
        Failed,
        Cancelled,
    ])
}

proptest! {
    /// Hash256::is_zero is true only for all-zero bytes.
    #[test]
    fn hash_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        let hash = Hash256::new(bytes);
        prop_assert_eq!(hash.is_zero(), bytes == [0u8; 32]);
    }

    /// Hash256 bincode serialization roundtrip.
    #[test]
    fn hash_bincode_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = Hash256::new(bytes);
        let encoded = bincode::serialize(&hash).unwrap();
        let decoded: Hash256 = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, hash);
    }

    /// Any UUID rendered as a string parses back to the same request id.
    #[test]
    fn request_id_parses_its_display(bytes in prop::array::uniform16(0u8..)) {
        let id = RequestId::from_bytes(bytes);
        let parsed: RequestId = id.to_string().parse().unwrap();
        prop_assert_eq!(parsed, id);
    }

    /// Timestamp elapsed_since: elapsed_since(now) = now - self (saturating).
    #[test]
    fn timestamp_elapsed_since(base in 0u64..1_000_000, offset in 0u64..1_000_000) {
        let t = Timestamp::new(base);
        let now = Timestamp::new(base + offset);
        prop_assert_eq!(t.elapsed_since(now), offset);
        prop_assert_eq!(now.elapsed_since(t), 0);
    }

    /// A challenge issued at `base` with validity `dur` is still answerable at
    /// exactly `base + dur` and expired one second later.
    #[test]
    fn timestamp_expiry_boundary(base in 0u64..1_000_000, dur in 0u64..1_000_000) {
        let t = Timestamp::new(base);
        prop_assert!(!t.has_expired(dur, Timestamp::new(base + dur)));
        prop_assert!(t.has_expired(dur, Timestamp::new(base + dur + 1)));
    }

    /// Checked addition never wraps.
    #[test]
    fn amount_checked_add_agrees_with_u128(a in any::<u128>(), b in any::<u128>()) {
        let sum = TokenAmount::new(a).checked_add(TokenAmount::new(b));
        prop_assert_eq!(sum.map(|s| s.raw()), a.checked_add(b));
    }

    /// Each halving halves the approximate rate.
    #[test]
    fn rate_halving_halves(initial in 1u32..=20_000, halvings in 0u32..60) {
        let mut rate = IssuanceRate::new(initial);
        for _ in 0..halvings {
            rate = rate.halved();
        }
        let next = rate.halved();
        prop_assert!((next.as_f64() * 2.0 - rate.as_f64()).abs() < 1e-12);
    }

    /// Terminal states never transition anywhere.
    #[test]
    fn terminal_states_are_final(from in any_state(), to in any_state()) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(to));
        }
    }

    /// Cancellation is only legal from states that have not reached the ledger.
    #[test]
    fn cancel_only_before_ledger(from in any_state()) {
        prop_assert_eq!(
            from.can_transition_to(RequestState::Cancelled),
            from.is_cancellable()
        );
    }
}
