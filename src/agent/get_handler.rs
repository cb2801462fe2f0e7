//! GET, GETNEXT and GETBULK (RFC 3416 Sections 4.2.1 to 4.2.3).

use bytes::Bytes;

use crate::error::ErrorStatus;
use crate::handler::{BoxFuture, SubRequest};
use crate::oid::Oid;
use crate::pdu::Pdu;
use crate::query::AccessKind;
use crate::scope::Region;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use super::processor::{PduHandler, Processor};

/// Answers each varbind with the instance it names.
#[derive(Debug, Default)]
pub struct GetHandler;

impl PduHandler for GetHandler {
    fn handle<'a>(
        &'a self,
        processor: &'a Processor,
        _pdu: &'a Pdu,
        subs: &'a mut Vec<SubRequest>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            for sub in subs.iter_mut().filter(|s| !s.is_complete()) {
                get(processor, sub).await;
            }
        })
    }
}

/// Answers each varbind with its lexicographic successor.
#[derive(Debug, Default)]
pub struct GetNextHandler;

impl PduHandler for GetNextHandler {
    fn handle<'a>(
        &'a self,
        processor: &'a Processor,
        _pdu: &'a Pdu,
        subs: &'a mut Vec<SubRequest>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            for sub in subs.iter_mut().filter(|s| !s.is_complete()) {
                successor(processor, sub).await;
            }
        })
    }
}

/// GETBULK: the non-repeaters once, then up to max-repetitions rows of the
/// remaining varbinds, stopping when the response budget is used up or
/// every column has reached the end of the view.
#[derive(Debug, Default)]
pub struct GetBulkHandler;

struct Column {
    index: usize,
    oid: Oid,
    view: Option<Bytes>,
    done: bool,
}

impl PduHandler for GetBulkHandler {
    fn handle<'a>(
        &'a self,
        processor: &'a Processor,
        pdu: &'a Pdu,
        subs: &'a mut Vec<SubRequest>,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let non_repeaters = pdu.non_repeaters();
            let max_repetitions = pdu.max_repetitions();
            let budget = processor.budget();
            let mut used = 0;

            let requested = std::mem::take(subs);
            let mut columns = Vec::new();

            for mut sub in requested {
                if sub.index() >= non_repeaters {
                    columns.push(Column {
                        index: sub.index(),
                        oid: sub.oid().clone(),
                        view: sub.view().cloned(),
                        done: false,
                    });
                    continue;
                }
                successor(processor, &mut sub).await;
                if !admit(subs, sub, &mut used, budget) {
                    return;
                }
            }

            'outer: for _ in 0..max_repetitions {
                let mut progressed = false;
                for column in columns.iter_mut() {
                    let mut sub = SubRequest::new(
                        processor.request().clone(),
                        column.index,
                        VarBind::null(column.oid.clone()),
                    );
                    sub.set_view(column.view.clone());

                    if column.done {
                        sub.respond(column.oid.clone(), Value::EndOfMibView);
                    } else {
                        successor(processor, &mut sub).await;
                        if matches!(sub.value(), Value::EndOfMibView) {
                            column.done = true;
                        } else {
                            column.oid = sub.oid().clone();
                            progressed = true;
                        }
                    }

                    if !admit(subs, sub, &mut used, budget) {
                        break 'outer;
                    }
                }
                if !progressed {
                    break;
                }
            }
        })
    }
}

/// Append `sub` if it fits the budget. An error ends the response; so does
/// running out of room, and if not even the first varbind fits the request
/// fails with `tooBig`.
fn admit(subs: &mut Vec<SubRequest>, mut sub: SubRequest, used: &mut usize, budget: usize) -> bool {
    if sub.has_error() {
        subs.push(sub);
        return false;
    }
    let size = sub.varbind().encoded_size();
    if *used + size > budget {
        if subs.is_empty() {
            sub.fail(ErrorStatus::TooBig);
            subs.push(sub);
        }
        return false;
    }
    *used += size;
    subs.push(sub);
    true
}

async fn get(processor: &Processor, sub: &mut SubRequest) {
    let query = processor.query(sub, Region::instance(sub.oid()), AccessKind::Read);
    let lookup = processor.lookup(&query).await;
    let Some(found) = &lookup.found else {
        sub.set_value(Value::NoSuchObject);
        sub.set_complete(true);
        return;
    };

    let oid = sub.oid().clone();
    match processor.guarded("get", &oid, found.object().get(sub)).await {
        Some(()) => sub.set_complete(true),
        None => sub.fail(ErrorStatus::GenErr),
    }
    processor.release(&lookup);
}

/// Successor search for one sub-request.
///
/// The cursor starts just after the requested OID. Each round asks the first
/// object overlapping the cursor for its first instance inside it. An object
/// with nothing left is cut off the cursor; an instance outside the view, or
/// one that reads back as an exception, is stepped over. SNMPv1 requests
/// step over Counter64 values as well.
pub(crate) async fn successor(processor: &Processor, sub: &mut SubRequest) {
    let start = sub.oid().clone();
    sub.set_scope(Region::after(&start));

    while !sub.scope().is_empty() {
        let cursor = sub.scope().clone();
        let query = processor.query(sub, cursor.clone(), AccessKind::Read);
        let lookup = processor.lookup(&query).await;
        let Some(found) = lookup.found.clone() else {
            break;
        };
        let object = found.object();

        let Some(next) = processor.guarded("find", &start, object.find(&cursor, sub)).await else {
            processor.release(&lookup);
            sub.fail(ErrorStatus::GenErr);
            return;
        };
        let key = match next {
            Some(key) if cursor.covers_oid(&key) => key,
            _ => {
                processor.release(&lookup);
                sub.scope_mut().subtract(found.region().region());
                continue;
            }
        };
        if !query.is_permitted(&key) {
            processor.release(&lookup);
            sub.scope_mut().advance_past(&key);
            continue;
        }

        sub.respond(key.clone(), Value::Null);
        sub.set_complete(false);
        let read = processor.guarded("get", &key, object.get(sub)).await;
        processor.release(&lookup);
        if read.is_none() {
            sub.fail(ErrorStatus::GenErr);
            return;
        }
        if sub.has_error() {
            return;
        }

        let skip = matches!(sub.value(), Value::Null)
            || sub.value().is_exception()
            || (processor.version() == Version::V1 && matches!(sub.value(), Value::Counter64(_)));
        if skip {
            sub.scope_mut().advance_past(&key);
            continue;
        }
        sub.set_complete(true);
        return;
    }

    sub.respond(start, Value::EndOfMibView);
}
