//! Blake2b hashing for transactions, proofs and audit entries.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use proofmint_types::{ChallengeId, Hash256, RequestId, RequesterId, TokenAmount};

type Blake2b256 = Blake2b<U32>;

const TX_DOMAIN: &[u8] = b"proofmint/tx/v1";
const PROOF_DOMAIN: &[u8] = b"proofmint/proof/v1";
const AUDIT_DOMAIN: &[u8] = b"proofmint/audit/v1";

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    blake2b_256_multi(&[data])
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    finish(hasher)
}

/// Id of the mint transaction produced when the ledger accepts a request.
///
/// Bound to the request, the amount and the supply total after the commit,
/// so a replayed request always yields the same id.
pub fn transaction_id(request_id: &RequestId, amount: TokenAmount, total_after: TokenAmount) -> Hash256 {
    Hash256::new(blake2b_256_multi(&[
        TX_DOMAIN,
        request_id.as_bytes(),
        &amount.raw().to_be_bytes(),
        &total_after.raw().to_be_bytes(),
    ]))
}

/// Stable reference to a submitted proof, recorded in the audit log instead
/// of the raw answers.
pub fn proof_reference<S: AsRef<str>>(
    challenge_id: &ChallengeId,
    requester_id: &RequesterId,
    answers: &[S],
) -> Hash256 {
    let mut hasher = Blake2b256::new();
    hasher.update(PROOF_DOMAIN);
    update_prefixed(&mut hasher, challenge_id.as_str().as_bytes());
    update_prefixed(&mut hasher, requester_id.as_str().as_bytes());
    hasher.update((answers.len() as u64).to_be_bytes());
    for answer in answers {
        update_prefixed(&mut hasher, answer.as_ref().as_bytes());
    }
    Hash256::new(finish(hasher))
}

/// Link hash of an audit entry: commits to the previous entry's hash and
/// the serialized body of this one.
pub fn audit_link_hash(prev: &Hash256, sequence: u64, body: &[u8]) -> Hash256 {
    Hash256::new(blake2b_256_multi(&[
        AUDIT_DOMAIN,
        prev.as_bytes(),
        &sequence.to_be_bytes(),
        body,
    ]))
}

fn finish(hasher: Blake2b256) -> [u8; 32] {
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

// Length prefixes keep ("ab","c") and ("a","bc") distinct.
fn update_prefixed(hasher: &mut Blake2b256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
