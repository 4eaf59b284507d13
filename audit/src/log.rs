//! The append-only audit log.

use std::sync::{Arc, Mutex, MutexGuard};

use proofmint_crypto::audit_link_hash;
use proofmint_store::AuditStore;
use proofmint_types::{Hash256, RequestId};

use crate::entry::AuditLogEntry;
use crate::error::AuditError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Recorded(AuditLogEntry),
    /// An entry already exists for this request; nothing was appended.
    AlreadyRecorded(AuditLogEntry),
}

impl WriteOutcome {
    pub fn entry(&self) -> &AuditLogEntry {
        match self {
            Self::Recorded(entry) | Self::AlreadyRecorded(entry) => entry,
        }
    }

    pub fn into_entry(self) -> AuditLogEntry {
        match self {
            Self::Recorded(entry) | Self::AlreadyRecorded(entry) => entry,
        }
    }
}

/// Result of a full chain verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainReport {
    pub entries: u64,
    pub head: Hash256,
}

#[derive(Clone, Copy, Debug)]
struct ChainHead {
    next_sequence: u64,
    last_hash: Hash256,
}

/// Append-only, hash-chained audit log.
///
/// Writes are serialized on the chain head; an entry is durable in the store
/// before `write` returns.
pub struct AuditLog {
    store: Arc<dyn AuditStore>,
    head: Mutex<ChainHead>,
}

impl AuditLog {
    /// Open the log, restoring the chain head from the last stored entry.
    pub fn open(store: Arc<dyn AuditStore>) -> Result<Self, AuditError> {
        let head = match store.last_entry()? {
            Some((sequence, bytes)) => {
                let entry = AuditLogEntry::decode(&bytes)?;
                if entry.sequence != sequence {
                    return Err(AuditError::ChainBroken {
                        sequence,
                        reason: format!("entry claims sequence {}", entry.sequence),
                    });
                }
                tracing::info!(entries = sequence + 1, head = %entry.entry_hash.short(), "restored audit chain");
                ChainHead {
                    next_sequence: sequence + 1,
                    last_hash: entry.entry_hash,
                }
            }
            None => ChainHead {
                next_sequence: 0,
                last_hash: Hash256::ZERO,
            },
        };
        Ok(Self {
            store,
            head: Mutex::new(head),
        })
    }

    /// Append the entry for a request, or return the one already recorded.
    pub fn write(&self, mut entry: AuditLogEntry) -> Result<WriteOutcome, AuditError> {
        let mut head = self.lock();

        if let Some(existing) = self.get(&entry.request_id)? {
            tracing::debug!(request_id = %entry.request_id, "audit entry already recorded");
            return Ok(WriteOutcome::AlreadyRecorded(existing));
        }

        entry.sequence = head.next_sequence;
        entry.prev_hash = head.last_hash;
        entry.entry_hash = audit_link_hash(&entry.prev_hash, entry.sequence, &entry.hashed_body()?);

        if let Err(e) = self.store.append_entry(entry.sequence, &entry.request_id, &entry.encode()?) {
            if e.is_duplicate() {
                if let Some(existing) = self.get(&entry.request_id)? {
                    return Ok(WriteOutcome::AlreadyRecorded(existing));
                }
            }
            tracing::error!(request_id = %entry.request_id, error = %e, "audit append failed");
            return Err(e.into());
        }

        head.next_sequence += 1;
        head.last_hash = entry.entry_hash;
        tracing::debug!(
            request_id = %entry.request_id,
            sequence = entry.sequence,
            status = ?entry.status,
            "audit entry recorded"
        );
        Ok(WriteOutcome::Recorded(entry))
    }

    pub fn get(&self, request_id: &RequestId) -> Result<Option<AuditLogEntry>, AuditError> {
        match self.store.get_entry_by_request(request_id)? {
            Some(bytes) => Ok(Some(AuditLogEntry::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All entries in chain order.
    pub fn entries(&self) -> Result<Vec<AuditLogEntry>, AuditError> {
        self.store
            .iter_entries()?
            .into_iter()
            .map(|(_, bytes)| AuditLogEntry::decode(&bytes).map_err(AuditError::from))
            .collect()
    }

    pub fn len(&self) -> u64 {
        self.lock().next_sequence
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute every link and check it against the stored hashes.
    pub fn verify_chain(&self) -> Result<ChainReport, AuditError> {
        let mut prev = Hash256::ZERO;
        let mut count = 0u64;
        for (sequence, bytes) in self.store.iter_entries()? {
            let broken = |reason: String| AuditError::ChainBroken { sequence, reason };
            let entry = AuditLogEntry::decode(&bytes)?;
            if sequence != count || entry.sequence != sequence {
                return Err(broken(format!("expected sequence {}", count)));
            }
            if entry.prev_hash != prev {
                return Err(broken("previous hash does not match".into()));
            }
            let expected = audit_link_hash(&prev, sequence, &entry.hashed_body()?);
            if entry.entry_hash != expected {
                return Err(broken("entry hash does not match contents".into()));
            }
            prev = entry.entry_hash;
            count += 1;
        }
        Ok(ChainReport {
            entries: count,
            head: prev,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ChainHead> {
        self.head.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
