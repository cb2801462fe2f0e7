//! SET (RFC 3416 Section 4.2.5).
//!
//! A SET is atomic per request. Every varbind is prepared first; if any
//! preparation fails nothing is committed. Commits run in PDU order and the
//! first failure rolls back everything committed before it, newest first.
//! Cleanup runs for every prepared varbind whatever happened, and the locks
//! taken during preparation are released last.

use crate::error::ErrorStatus;
use crate::handler::{BoxFuture, SetPhase, SubRequest, Transactional};
use crate::pdu::Pdu;
use crate::query::AccessKind;
use crate::registry::Lookup;
use crate::scope::Region;

use super::processor::{PduHandler, Processor};

#[derive(Debug, Default)]
pub struct SetHandler;

impl PduHandler for SetHandler {
    fn handle<'a>(
        &'a self,
        processor: &'a Processor,
        _pdu: &'a Pdu,
        subs: &'a mut Vec<SubRequest>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut targets = Vec::with_capacity(subs.len());
            for sub in subs.iter_mut() {
                targets.push(prepare(processor, sub).await);
            }

            if !subs.iter().any(SubRequest::has_error) {
                let (committed, failed) = commit(processor, subs, &targets).await;
                if failed {
                    undo(processor, subs, &targets, &committed).await;
                }
            }

            cleanup(processor, subs, &targets).await;
        })
    }
}

fn transactional(target: &Option<Lookup>) -> Option<&dyn Transactional> {
    target.as_ref()?.found.as_ref()?.object().as_transactional()
}

async fn prepare(processor: &Processor, sub: &mut SubRequest) -> Option<Lookup> {
    let query = processor.query(sub, Region::instance(sub.oid()), AccessKind::Write);
    if !query.is_permitted(sub.oid()) {
        sub.fail(ErrorStatus::NoAccess);
        return None;
    }

    let lookup = processor.lookup(&query).await;
    let Some(found) = &lookup.found else {
        sub.fail(if lookup.lock_timed_out {
            ErrorStatus::ResourceUnavailable
        } else {
            ErrorStatus::NoCreation
        });
        return None;
    };

    let Some(tx) = found.object().as_transactional() else {
        sub.fail(ErrorStatus::NotWritable);
        return Some(lookup);
    };

    sub.set_phase(SetPhase::Prepare);
    let oid = sub.oid().clone();
    if processor.guarded("prepare", &oid, tx.prepare(sub)).await.is_none() {
        sub.fail(ErrorStatus::GenErr);
    }
    if sub.has_error() {
        tracing::debug!(target: "async_snmp_agent::agent", { snmp.request_id = %processor.request().id(), snmp.oid = %oid, status = %sub.status() }, "set prepare failed");
    }
    Some(lookup)
}

/// Commit in order until the first failure. Returns the positions that
/// committed successfully and whether one failed.
async fn commit(
    processor: &Processor,
    subs: &mut [SubRequest],
    targets: &[Option<Lookup>],
) -> (Vec<usize>, bool) {
    let mut committed = Vec::new();
    for (i, (sub, target)) in subs.iter_mut().zip(targets).enumerate() {
        let Some(tx) = transactional(target) else {
            continue;
        };
        sub.set_phase(SetPhase::Commit);
        let oid = sub.oid().clone();
        if processor.guarded("commit", &oid, tx.commit(sub)).await.is_none() {
            sub.fail(ErrorStatus::GenErr);
        }
        if sub.has_error() {
            tracing::warn!(target: "async_snmp_agent::agent", { snmp.request_id = %processor.request().id(), snmp.oid = %oid, status = %sub.status() }, "set commit failed");
            if sub.status() != ErrorStatus::UndoFailed {
                sub.replace_status(ErrorStatus::CommitFailed, Some(i));
            }
            return (committed, true);
        }
        committed.push(i);
    }
    (committed, false)
}

async fn undo(
    processor: &Processor,
    subs: &mut [SubRequest],
    targets: &[Option<Lookup>],
    committed: &[usize],
) {
    for &i in committed.iter().rev() {
        let Some(tx) = transactional(&targets[i]) else {
            continue;
        };
        let sub = &mut subs[i];
        sub.set_phase(SetPhase::Undo);
        let oid = sub.oid().clone();
        if processor.guarded("undo", &oid, tx.undo(sub)).await.is_none() {
            sub.replace_status(ErrorStatus::UndoFailed, None);
        }
        if sub.status() == ErrorStatus::UndoFailed {
            tracing::warn!(target: "async_snmp_agent::agent", { snmp.request_id = %processor.request().id(), snmp.oid = %oid }, "set undo failed");
        }
    }
}

async fn cleanup(processor: &Processor, subs: &mut [SubRequest], targets: &[Option<Lookup>]) {
    for (sub, target) in subs.iter_mut().zip(targets) {
        if let Some(tx) = transactional(target).filter(|_| sub.phase().is_some()) {
            sub.set_phase(SetPhase::Cleanup);
            let oid = sub.oid().clone();
            let finished = processor.guarded("cleanup", &oid, tx.cleanup(sub)).await;
            if finished.is_none() && !sub.has_error() {
                sub.fail(ErrorStatus::GenErr);
            }
        }
        if let Some(lookup) = target {
            processor.release(lookup);
        }
    }
}
