//! In-memory record of recent submissions, read on every screen and pruned
//! by window.

use proofmint_types::{RequesterId, Timestamp};
use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockWriteGuard};

/// One screened submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub at: Timestamp,
    pub difficulty: u8,
    pub perfect: bool,
}

/// Who gave a wrong answer, and when.
#[derive(Clone, Debug)]
struct WrongAnswer {
    requester: RequesterId,
    at: Timestamp,
}

#[derive(Default)]
struct Inner {
    submissions: HashMap<RequesterId, VecDeque<SubmissionRecord>>,
    /// question key → normalized wrong answer → who gave it.
    wrong_answers: HashMap<String, HashMap<String, Vec<WrongAnswer>>>,
    last_accepted: HashMap<RequesterId, Timestamp>,
}

/// Windows outside of which history is forgotten.
#[derive(Clone, Copy, Debug)]
pub struct Cutoffs {
    /// Submissions before this no longer count towards velocity or streaks.
    pub submissions: Timestamp,
    /// Wrong answers before this no longer count as shared.
    pub wrong_answers: Timestamp,
    /// Accepted issuances before this are past any cooldown.
    pub accepted: Timestamp,
}

/// What the history held for a requester just before their submission was
/// recorded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observation {
    /// Earlier submissions inside the window, oldest first.
    pub recent: Vec<SubmissionRecord>,
    /// How many of the submission's wrong answers another requester gave.
    pub shared_wrong: usize,
    pub last_accepted: Option<Timestamp>,
}

#[derive(Default)]
pub struct ActivityHistory {
    inner: RwLock<Inner>,
}

impl Inner {
    fn prune(&mut self, cutoffs: &Cutoffs) {
        self.submissions.retain(|_, records| {
            while records.front().is_some_and(|r| r.at < cutoffs.submissions) {
                records.pop_front();
            }
            !records.is_empty()
        });
        self.wrong_answers.retain(|_, answers| {
            answers.retain(|_, givers| {
                givers.retain(|g| g.at >= cutoffs.wrong_answers);
                !givers.is_empty()
            });
            !answers.is_empty()
        });
        self.last_accepted.retain(|_, at| *at >= cutoffs.accepted);
    }

    fn shared_wrong_answers(&self, requester: &RequesterId, wrong: &[(String, String)]) -> usize {
        wrong
            .iter()
            .filter(|(question, answer)| {
                self.wrong_answers
                    .get(question)
                    .and_then(|answers| answers.get(answer))
                    .is_some_and(|givers| givers.iter().any(|g| &g.requester != requester))
            })
            .count()
    }
}

impl ActivityHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prune to `cutoffs`, read the requester's history, then record the new
    /// submission and its wrong (question key, normalized answer) pairs.
    /// All under one write guard, so concurrent submissions from the same
    /// requester each see the ones recorded before them.
    pub fn observe(
        &self,
        requester: &RequesterId,
        record: SubmissionRecord,
        wrong: Vec<(String, String)>,
        cutoffs: Cutoffs,
    ) -> Observation {
        let mut inner = self.write();
        inner.prune(&cutoffs);

        let observation = Observation {
            recent: inner
                .submissions
                .get(requester)
                .map(|records| records.iter().copied().collect())
                .unwrap_or_default(),
            shared_wrong: inner.shared_wrong_answers(requester, &wrong),
            last_accepted: inner.last_accepted.get(requester).copied(),
        };

        inner
            .submissions
            .entry(requester.clone())
            .or_default()
            .push_back(record);
        for (question, answer) in wrong {
            inner
                .wrong_answers
                .entry(question)
                .or_default()
                .entry(answer)
                .or_default()
                .push(WrongAnswer {
                    requester: requester.clone(),
                    at: record.at,
                });
        }
        observation
    }

    /// Note an issuance that went through, for the cooldown check.
    pub fn record_accepted(&self, requester: &RequesterId, at: Timestamp) {
        let mut inner = self.write();
        let entry = inner.last_accepted.entry(requester.clone()).or_insert(at);
        if at > *entry {
            *entry = at;
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> (usize, usize, usize) {
        let inner = self.read();
        (inner.submissions.len(), inner.wrong_answers.len(), inner.last_accepted.len())
    }

    #[cfg(test)]
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn requester(s: &str) -> RequesterId {
        RequesterId::new(s).unwrap()
    }

    fn record(at: u64) -> SubmissionRecord {
        SubmissionRecord {
            at: Timestamp::new(at),
            difficulty: 2,
            perfect: false,
        }
    }

    fn all_time() -> Cutoffs {
        Cutoffs {
            submissions: Timestamp::EPOCH,
            wrong_answers: Timestamp::EPOCH,
            accepted: Timestamp::EPOCH,
        }
    }

    fn wrong(question: &str, answer: &str) -> Vec<(String, String)> {
        vec![(question.to_string(), answer.to_string())]
    }

    #[test]
    fn submissions_are_windowed() {
        let history = ActivityHistory::new();
        let alice = requester("alice");
        for at in [10, 20, 30] {
            history.observe(&alice, record(at), vec![], all_time());
        }
        let cutoffs = Cutoffs {
            submissions: Timestamp::new(20),
            ..all_time()
        };
        let seen = history.observe(&alice, record(40), vec![], cutoffs);
        assert_eq!(seen.recent, vec![record(20), record(30)]);
        assert!(history.observe(&requester("bob"), record(40), vec![], cutoffs).recent.is_empty());
    }

    #[test]
    fn own_wrong_answers_are_not_shared() {
        let history = ActivityHistory::new();
        let alice = requester("alice");
        let bob = requester("bob");

        history.observe(&alice, record(10), wrong("q1", "42"), all_time());
        assert_eq!(history.observe(&alice, record(11), wrong("q1", "42"), all_time()).shared_wrong, 0);
        assert_eq!(history.observe(&bob, record(12), wrong("q1", "42"), all_time()).shared_wrong, 1);

        let later = Cutoffs {
            wrong_answers: Timestamp::new(13),
            ..all_time()
        };
        let carol = history.observe(&requester("carol"), record(13), wrong("q1", "42"), later);
        assert_eq!(carol.shared_wrong, 0);
    }

    #[test]
    fn old_entries_are_pruned() {
        let history = ActivityHistory::new();
        history.observe(&requester("alice"), record(10), wrong("q", "a"), all_time());
        history.record_accepted(&requester("alice"), Timestamp::new(10));
        history.record_accepted(&requester("bob"), Timestamp::new(90));

        let cutoffs = Cutoffs {
            submissions: Timestamp::new(50),
            wrong_answers: Timestamp::new(50),
            accepted: Timestamp::new(50),
        };
        let carol = history.observe(&requester("carol"), record(100), vec![], cutoffs);

        assert_eq!(carol.shared_wrong, 0);
        // carol's own submission, bob's accepted issuance.
        assert_eq!(history.tracked(), (1, 0, 1));
    }

    #[test]
    fn accepted_issuances_expire_with_the_cooldown() {
        let history = ActivityHistory::new();
        let alice = requester("alice");
        history.record_accepted(&alice, Timestamp::new(50));
        history.record_accepted(&alice, Timestamp::new(40));

        let inside = Cutoffs {
            accepted: Timestamp::new(45),
            ..all_time()
        };
        assert_eq!(history.observe(&alice, record(60), vec![], inside).last_accepted, Some(Timestamp::new(50)));

        let past = Cutoffs {
            accepted: Timestamp::new(51),
            ..all_time()
        };
        assert_eq!(history.observe(&alice, record(61), vec![], past).last_accepted, None);
        assert_eq!(history.tracked().2, 0);
    }

    #[test]
    fn concurrent_submissions_see_each_other() {
        let history = Arc::new(ActivityHistory::new());
        let alice = requester("alice");

        let mut seen: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..32)
                .map(|_| {
                    let history = history.clone();
                    let alice = alice.clone();
                    scope.spawn(move || history.observe(&alice, record(10), vec![], all_time()).recent.len())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        seen.sort_unstable();

        assert_eq!(seen, (0..32).collect::<Vec<_>>());
    }
}
