//! Restart behaviour against the LMDB backend.

use std::path::Path;
use std::sync::Arc;

use proofmint_engine::{EngineDeps, EngineOptions, IssuanceOrchestrator, SubmitProof};
use proofmint_nullables::{NullClock, NullComplianceAuthority, NullSettlementRail};
use proofmint_store_lmdb::{check_integrity, LmdbEnvironment, Migrator, CURRENT_SCHEMA_VERSION};
use proofmint_store::MetaStore;
use proofmint_supply::RequesterProfile;
use proofmint_types::{
    ChallengeId, IssuancePolicy, RequestId, RequestState, RequesterId, Timestamp, TokenAmount,
};
use proofmint_verification::{AnswerMatch, ProofChallenge, Question};

fn open_engine(path: &Path, rail: Arc<NullSettlementRail>) -> Arc<IssuanceOrchestrator> {
    let env = LmdbEnvironment::open_default(path).unwrap();
    Migrator::run(&env).unwrap();
    assert!(check_integrity(env.env()).unwrap().is_healthy());
    let deps = EngineDeps {
        supply_store: Arc::new(env.supply_store()),
        audit_store: Arc::new(env.audit_store()),
        request_store: Arc::new(env.request_store()),
        reconciliation_store: Arc::new(env.reconciliation_store()),
        compliance: Arc::new(NullComplianceAuthority::new()),
        rail,
        signal: None,
        grader: None,
        clock: Arc::new(NullClock::default()),
    };
    IssuanceOrchestrator::new(IssuancePolicy::standard(), deps, EngineOptions::default()).unwrap()
}

fn submit(engine: &IssuanceOrchestrator, challenge: &str, requester: &str) -> SubmitProof {
    let id = ChallengeId::new(challenge).unwrap();
    engine
        .register_challenge(ProofChallenge {
            id: id.clone(),
            subject: "storage".into(),
            questions: (0..10)
                .map(|i| Question {
                    prompt: format!("q{}", i),
                    expected: vec![format!("a{}", i)],
                    matching: AnswerMatch::Exact,
                })
                .collect(),
            difficulty: 4,
            issued_at: Timestamp::new(1_700_000_000 - 600),
        })
        .unwrap();
    SubmitProof {
        idempotency_key: RequestId::random(),
        challenge_id: id,
        requester_id: RequesterId::new(requester).unwrap(),
        answers: (0..10)
            .map(|i| if i < 9 { format!("a{}", i) } else { "wrong".into() })
            .collect(),
        profile: RequesterProfile::default(),
        submitted_at: None,
    }
}

#[tokio::test]
async fn state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let rail = Arc::new(NullSettlementRail::new());

    let (first, request) = {
        let engine = open_engine(dir.path(), rail.clone());
        let request = submit(&engine, "ch-1", "learner-1");
        let first = engine.submit_proof(request.clone()).await.unwrap();
        // The pipeline task holds the last other handle; the environment
        // must be closed before it is opened again.
        while Arc::strong_count(&engine) > 1 {
            tokio::task::yield_now().await;
        }
        (first, request)
    };
    assert_eq!(first.state, RequestState::Confirmed);

    let engine = open_engine(dir.path(), rail.clone());
    assert!(engine.recover().unwrap().is_empty());
    assert_eq!(engine.supply_snapshot().total_minted, TokenAmount::new(13));

    // The challenge registry is in memory, so only the recorded result can
    // answer this resubmission.
    let again = engine.submit_proof(request).await.unwrap();
    assert_eq!(again, first);
    assert_eq!(rail.calls(), 1);

    let second = submit(&engine, "ch-2", "learner-2");
    let second = engine.submit_proof(second).await.unwrap();
    assert_eq!(second.amount, Some(TokenAmount::new(13)));
    assert_eq!(engine.supply_snapshot().total_minted, TokenAmount::new(26));
    assert_eq!(engine.verify_audit_chain().unwrap().entries, 2);
}

#[test]
fn fresh_environment_is_migrated_to_the_current_schema() {
    let dir = tempfile::tempdir().unwrap();
    let env = LmdbEnvironment::open_default(dir.path()).unwrap();
    let meta = env.meta_store();
    assert_eq!(meta.get_schema_version().unwrap(), 0);
    Migrator::run(&env).unwrap();
    assert_eq!(meta.get_schema_version().unwrap(), CURRENT_SCHEMA_VERSION);
}
