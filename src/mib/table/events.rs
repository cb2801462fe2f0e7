use crate::error::ErrorStatus;
use crate::handler::RequestId;
use crate::oid::Oid;
use crate::value::Value;

/// Whether a SET creates a row or modifies an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowEventKind {
    Create,
    Update,
}

/// A row touched by a SET.
#[derive(Debug)]
pub struct RowEvent<'a> {
    pub request: RequestId,
    pub index: &'a Oid,
    pub kind: RowEventKind,
    /// The row as it looks with the request's changes applied, one slot
    /// per column.
    pub values: &'a [Option<Value>],
}

/// A cell written during commit.
#[derive(Debug)]
pub struct CellEvent<'a> {
    pub request: RequestId,
    pub index: &'a Oid,
    pub column: u32,
    pub old: Option<&'a Value>,
    pub new: &'a Value,
}

/// Rejection of a row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowVeto {
    pub status: ErrorStatus,
    /// Column the error is reported against. `None` reports it against the
    /// varbind that completed the row.
    pub column: Option<u32>,
}

impl RowVeto {
    pub fn new(status: ErrorStatus) -> Self {
        Self { status, column: None }
    }

    pub fn at_column(status: ErrorStatus, column: u32) -> Self {
        Self {
            status,
            column: Some(column),
        }
    }
}

/// Observer of row changes.
///
/// Callbacks run synchronously inside the SET phases.
pub trait RowListener: Send + Sync {
    /// Every column of the row addressed by the request has been prepared.
    /// Returning an error vetoes the whole request; a vetoed creation never
    /// becomes visible.
    fn row_changed(&self, event: &RowEvent<'_>) -> Result<(), RowVeto> {
        let _ = event;
        Ok(())
    }

    fn cell_changed(&self, event: &CellEvent<'_>) {
        let _ = event;
    }

    /// Every column of the row has been committed.
    fn row_committed(&self, event: &RowEvent<'_>) {
        let _ = event;
    }

    /// The request is done with the row, whatever its outcome.
    fn row_cleanup(&self, request: RequestId, index: &Oid) {
        let _ = (request, index);
    }
}
