use std::collections::HashMap;

use crate::oid::Oid;
use crate::value::Value;

use super::events::RowEventKind;

/// A conceptual row: one optional cell per column, in column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub(super) values: Vec<Option<Value>>,
}

impl Row {
    /// Cell at column position `pos` (not the column id).
    pub fn get(&self, pos: usize) -> Option<&Value> {
        self.values.get(pos).and_then(Option::as_ref)
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }
}

/// Pending changes of one row within one request.
#[derive(Debug)]
pub(super) struct RowChange {
    pub(super) staged: Vec<Option<Value>>,
    /// Varbinds of the request addressing this row.
    pub(super) expected: usize,
    pub(super) prepared: usize,
    pub(super) committed: usize,
    pub(super) cleaned: usize,
    pub(super) creating: bool,
    pub(super) inserted: bool,
    pub(super) failed: bool,
}

impl RowChange {
    pub(super) fn new(columns: usize, expected: usize, creating: bool) -> Self {
        Self {
            staged: vec![None; columns],
            expected,
            prepared: 0,
            committed: 0,
            cleaned: 0,
            creating,
            inserted: false,
            failed: false,
        }
    }

    pub(super) fn kind(&self) -> RowEventKind {
        if self.creating {
            RowEventKind::Create
        } else {
            RowEventKind::Update
        }
    }
}

/// Row changes of a table, held in the request scratch.
#[derive(Debug, Default)]
pub(super) struct ChangeSet {
    pub(super) rows: HashMap<Oid, RowChange>,
}
