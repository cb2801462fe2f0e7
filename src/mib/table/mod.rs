//! Conceptual tables with two-phase SET.
//!
//! A [`Table`] serves the subtree of its entry OID. Instances are named
//! `entry.column.index`, where the index is the row's OID suffix. Successor
//! search walks columns left to right and rows in index order, skipping
//! not-accessible columns and absent cells.
//!
//! A SET stages values per row in the request scratch. Once every varbind of
//! the request addressing a row has been prepared, the row listeners see the
//! resulting row and may veto it. New rows are inserted whole at commit, so
//! a rejected creation is never visible to other requests.
//!
//! # Example
//!
//! ```
//! use async_snmp_agent::mib::{Column, ColumnAccess, Table};
//! use async_snmp_agent::value::{Value, ValueKind};
//! use async_snmp_agent::oid;
//!
//! let if_table = Table::builder(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1))
//!     .column(Column::new(1, ColumnAccess::ReadOnly, ValueKind::Integer))
//!     .column(Column::new(2, ColumnAccess::ReadOnly, ValueKind::OctetString))
//!     .column(Column::new(7, ColumnAccess::ReadWrite, ValueKind::Integer))
//!     .build()
//!     .unwrap();
//!
//! if_table
//!     .add_row(oid!(1), vec![Value::Integer(1), Value::from("eth0"), Value::Integer(1)])
//!     .unwrap();
//! assert_eq!(if_table.cell(&oid!(1), 2), Some(Value::from("eth0")));
//! ```

mod column;
mod events;
mod row;

pub use column::{Column, ColumnAccess};
pub use events::{CellEvent, RowEvent, RowEventKind, RowListener, RowVeto};
pub use row::Row;

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, ErrorStatus, Result};
use crate::handler::{BoxFuture, ManagedObject, Persistable, Request, SubRequest, Transactional};
use crate::oid::Oid;
use crate::scope::Region;
use crate::value::Value;
use crate::varbind::VarBind;

use super::ValueValidator;
use row::{ChangeSet, RowChange};

/// Builder for [`Table`].
#[derive(Debug)]
pub struct TableBuilder {
    entry: Oid,
    columns: Vec<Column>,
    volatile: bool,
}

impl TableBuilder {
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Mark the table as refreshed on demand. The default lock strategy then
    /// locks it for reads too.
    pub fn volatile(mut self, volatile: bool) -> Self {
        self.volatile = volatile;
        self
    }

    pub fn build(mut self) -> Result<Table> {
        if self.columns.is_empty() {
            return Err(Error::Config(
                format!("table {} has no columns", self.entry).into(),
            )
            .boxed());
        }
        self.columns.sort_by_key(|c| c.id);
        if let Some(pair) = self.columns.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(Error::Config(
                format!("table {}: duplicate column {}", self.entry, pair[0].id).into(),
            )
            .boxed());
        }
        for column in &self.columns {
            if let Some(default) = &column.default {
                if default.kind() != column.kind {
                    return Err(Error::Config(
                        format!(
                            "table {}: default of column {} has kind {:?}",
                            self.entry,
                            column.id,
                            default.kind(),
                        )
                        .into(),
                    )
                    .boxed());
                }
            }
        }
        Ok(Table {
            entry: self.entry,
            columns: self.columns,
            rows: RwLock::new(BTreeMap::new()),
            validators: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            volatile: self.volatile,
        })
    }
}

/// A conceptual table.
pub struct Table {
    entry: Oid,
    columns: Vec<Column>,
    rows: RwLock<BTreeMap<Oid, Row>>,
    validators: RwLock<Vec<Arc<dyn ValueValidator>>>,
    listeners: RwLock<Vec<Arc<dyn RowListener>>>,
    volatile: bool,
}

impl Table {
    pub fn builder(entry: Oid) -> TableBuilder {
        TableBuilder {
            entry,
            columns: Vec::new(),
            volatile: false,
        }
    }

    pub fn entry(&self) -> &Oid {
        &self.entry
    }

    /// Columns in id order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// `entry.column.index`.
    pub fn instance_oid(&self, column: u32, index: &Oid) -> Oid {
        self.entry.child(column).join(index)
    }

    /// Insert a row, one value per column in id order.
    pub fn add_row(&self, index: Oid, values: Vec<Value>) -> Result<()> {
        if index.is_empty() {
            return Err(Error::Config(
                format!("table {}: empty row index", self.entry).into(),
            )
            .boxed());
        }
        if values.len() != self.columns.len() {
            return Err(Error::Config(
                format!(
                    "table {}: expected {} values, got {}",
                    self.entry,
                    self.columns.len(),
                    values.len(),
                )
                .into(),
            )
            .boxed());
        }
        let mismatch = self.columns.iter().zip(&values).find(|(c, v)| c.kind != v.kind());
        if let Some((column, value)) = mismatch {
            return Err(Error::Config(
                format!(
                    "table {}: column {} expects {:?}, got {:?}",
                    self.entry,
                    column.id,
                    column.kind,
                    value.kind(),
                )
                .into(),
            )
            .boxed());
        }

        let mut rows = self.rows.write();
        if rows.contains_key(&index) {
            return Err(Error::Config(
                format!("table {}: row {} exists", self.entry, index).into(),
            )
            .boxed());
        }
        rows.insert(
            index,
            Row {
                values: values.into_iter().map(Some).collect(),
            },
        );
        Ok(())
    }

    pub fn remove_row(&self, index: &Oid) -> Option<Row> {
        self.rows.write().remove(index)
    }

    pub fn row(&self, index: &Oid) -> Option<Row> {
        self.rows.read().get(index).cloned()
    }

    /// Value of column `column` (an id) in row `index`.
    pub fn cell(&self, index: &Oid, column: u32) -> Option<Value> {
        let pos = self.position(column)?;
        self.rows.read().get(index)?.get(pos).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    /// Row indexes in order.
    pub fn indexes(&self) -> Vec<Oid> {
        self.rows.read().keys().cloned().collect()
    }

    pub fn add_validator(&self, validator: impl ValueValidator + 'static) {
        self.validators.write().push(Arc::new(validator));
    }

    pub fn add_listener(&self, listener: Arc<dyn RowListener>) {
        self.listeners.write().push(listener);
    }

    fn key(&self) -> usize {
        self as *const Self as usize
    }

    fn position(&self, column: u32) -> Option<usize> {
        self.columns.binary_search_by_key(&column, |c| c.id).ok()
    }

    /// Column position and row index of an instance OID. The index may be
    /// empty.
    fn parse(&self, oid: &Oid) -> Option<(usize, Oid)> {
        let (column, index) = oid.strip_prefix(&self.entry)?.split_first()?;
        Some((self.position(*column)?, Oid::from_slice(index)))
    }

    /// Column position and row bound at which a walk over `range` starts.
    fn start_of(&self, range: &Region) -> (usize, Bound<Oid>) {
        let lower = range.lower();
        let Some(suffix) = lower.strip_prefix(&self.entry) else {
            let pos = if lower < &self.entry { 0 } else { self.columns.len() };
            return (pos, Bound::Unbounded);
        };
        let Some((column, index)) = suffix.split_first() else {
            return (0, Bound::Unbounded);
        };
        let pos = self.columns.partition_point(|c| c.id < *column);
        if self.columns.get(pos).is_none_or(|c| c.id != *column) || index.is_empty() {
            return (pos, Bound::Unbounded);
        }
        let index = Oid::from_slice(index);
        if range.is_lower_included() {
            (pos, Bound::Included(index))
        } else {
            (pos, Bound::Excluded(index))
        }
    }

    /// First readable cell at or after `(pos, bound)` that `range` covers.
    ///
    /// Rows are seeked from the cursor, so successive steps of a walk never
    /// rescan the rows already returned.
    fn locate(&self, range: &Region, (start, mut bound): (usize, Bound<Oid>)) -> Option<Oid> {
        let rows = self.rows.read();
        for pos in start..self.columns.len() {
            let from = std::mem::replace(&mut bound, Bound::Unbounded);
            let column = &self.columns[pos];
            if !column.access.is_readable() {
                continue;
            }
            let hit = rows
                .range((from, Bound::Unbounded))
                .find(|(_, row)| row.get(pos).is_some());
            if let Some((index, _)) = hit {
                let instance = self.instance_oid(column.id, index);
                return range.covers_oid(&instance).then_some(instance);
            }
        }
        None
    }

    /// Number of varbinds of `request` addressing row `index`.
    fn expected_subs(&self, request: &Request, index: &Oid) -> usize {
        request
            .oids()
            .iter()
            .filter_map(|oid| self.parse(oid))
            .filter(|(_, i)| i == index)
            .count()
    }

    fn check(
        &self,
        pos: usize,
        exists: bool,
        sub: &SubRequest,
    ) -> std::result::Result<(), ErrorStatus> {
        let column = &self.columns[pos];
        if !column.access.is_writable() {
            return Err(ErrorStatus::NotWritable);
        }
        if !exists && column.access != ColumnAccess::ReadCreate {
            return Err(ErrorStatus::NoCreation);
        }
        if sub.value().kind() != column.kind {
            return Err(ErrorStatus::WrongType);
        }
        self.validators
            .read()
            .iter()
            .try_for_each(|v| v.validate(sub.oid(), sub.value()))
    }

    /// Row `index` as it looks with `staged` applied.
    fn merged(&self, index: &Oid, staged: &[Option<Value>]) -> Vec<Option<Value>> {
        let rows = self.rows.read();
        let current = rows.get(index);
        self.columns
            .iter()
            .enumerate()
            .map(|(pos, column)| {
                staged[pos]
                    .clone()
                    .or_else(|| current.and_then(|r| r.get(pos).cloned()))
                    .or_else(|| if current.is_none() { column.default.clone() } else { None })
            })
            .collect()
    }

    fn listeners(&self) -> Vec<Arc<dyn RowListener>> {
        self.listeners.read().clone()
    }
}

impl ManagedObject for Table {
    fn region(&self) -> Region {
        Region::subtree(&self.entry)
    }

    fn find<'a>(&'a self, range: &'a Region, _sub: &'a SubRequest) -> BoxFuture<'a, Option<Oid>> {
        Box::pin(async move { self.locate(range, self.start_of(range)) })
    }

    fn get<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let value = match self.parse(sub.oid()) {
                Some((pos, index)) if self.columns[pos].access.is_readable() => self
                    .rows
                    .read()
                    .get(&index)
                    .and_then(|row| row.get(pos).cloned())
                    .unwrap_or(Value::NoSuchInstance),
                _ => Value::NoSuchObject,
            };
            sub.set_value(value);
        })
    }

    fn is_volatile(&self) -> bool {
        self.volatile
    }

    fn as_transactional(&self) -> Option<&dyn Transactional> {
        Some(self)
    }

    fn as_persistable(&self) -> Option<&dyn Persistable> {
        Some(self)
    }
}

impl Transactional for Table {
    fn prepare<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let cell = self.parse(sub.oid()).filter(|(_, index)| !index.is_empty());
            let Some((pos, index)) = cell else {
                sub.fail(ErrorStatus::NoCreation);
                return;
            };
            let exists = self.rows.read().contains_key(&index);
            let verdict = self.check(pos, exists, sub);
            let request = sub.request().clone();

            let ready = request.scratch().with::<ChangeSet, _>(self.key(), |set| {
                let change = set.rows.entry(index.clone()).or_insert_with(|| {
                    let expected = self.expected_subs(&request, &index);
                    RowChange::new(self.columns.len(), expected, !exists)
                });
                change.prepared += 1;
                match verdict {
                    Ok(()) => change.staged[pos] = Some(sub.value().clone()),
                    Err(_) => change.failed = true,
                }
                let complete = change.prepared >= change.expected && !change.failed;
                complete.then(|| (change.kind(), change.staged.clone()))
            });

            if let Err(status) = verdict {
                tracing::debug!(target: "async_snmp_agent::mib", { snmp.oid = %sub.oid(), status = %status }, "table rejected value");
                sub.fail(status);
                return;
            }
            let Some((kind, staged)) = ready else {
                return;
            };

            let values = self.merged(&index, &staged);
            let event = RowEvent {
                request: request.id(),
                index: &index,
                kind,
                values: &values,
            };
            for listener in self.listeners() {
                if let Err(veto) = listener.row_changed(&event) {
                    tracing::debug!(target: "async_snmp_agent::mib", { row = %index, status = %veto.status }, "row change vetoed");
                    request.scratch().with::<ChangeSet, _>(self.key(), |set| {
                        if let Some(change) = set.rows.get_mut(&index) {
                            change.failed = true;
                        }
                    });
                    let at = veto.column.and_then(|column| {
                        let instance = self.instance_oid(column, &index);
                        request.oids().iter().position(|oid| oid == &instance)
                    });
                    match at {
                        Some(at) => sub.fail_at(veto.status, Some(at)),
                        None => sub.fail(veto.status),
                    }
                    return;
                }
            }
        })
    }

    fn commit<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some((pos, index)) = self.parse(sub.oid()) else {
                sub.fail(ErrorStatus::CommitFailed);
                return;
            };
            let request = sub.request().clone();
            let key = self.key();
            let plan = request.scratch().with::<ChangeSet, _>(key, |set| {
                set.rows.get_mut(&index).map(|change| {
                    change.committed += 1;
                    let insert = change.creating && !change.inserted;
                    change.inserted |= insert;
                    (
                        insert,
                        change.creating,
                        change.committed >= change.expected,
                        change.kind(),
                        change.staged.clone(),
                    )
                })
            });
            let Some((insert, creating, complete, kind, staged)) = plan else {
                sub.fail(ErrorStatus::CommitFailed);
                return;
            };

            let value = sub.value().clone();
            let old = if creating {
                if insert {
                    let row = Row {
                        values: self.merged(&index, &staged),
                    };
                    let inserted = {
                        let mut rows = self.rows.write();
                        if rows.contains_key(&index) {
                            false
                        } else {
                            rows.insert(index.clone(), row);
                            true
                        }
                    };
                    if !inserted {
                        request.scratch().with::<ChangeSet, _>(key, |set| {
                            if let Some(change) = set.rows.get_mut(&index) {
                                change.inserted = false;
                            }
                        });
                        sub.fail(ErrorStatus::CommitFailed);
                        return;
                    }
                    tracing::debug!(target: "async_snmp_agent::mib", { table = %self.entry, row = %index }, "row created");
                }
                None
            } else {
                let old = {
                    let mut rows = self.rows.write();
                    match rows.get_mut(&index) {
                        Some(row) => Some(row.values[pos].replace(value.clone())),
                        None => None,
                    }
                };
                let Some(old) = old else {
                    sub.fail(ErrorStatus::CommitFailed);
                    return;
                };
                sub.set_undo_value(old.clone());
                old
            };

            let listeners = self.listeners();
            let cell = CellEvent {
                request: request.id(),
                index: &index,
                column: self.columns[pos].id,
                old: old.as_ref(),
                new: &value,
            };
            for listener in &listeners {
                listener.cell_changed(&cell);
            }

            if complete {
                let values = self.row(&index).map(|r| r.values).unwrap_or_default();
                let event = RowEvent {
                    request: request.id(),
                    index: &index,
                    kind,
                    values: &values,
                };
                for listener in &listeners {
                    listener.row_committed(&event);
                }
            }
        })
    }

    fn undo<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some((pos, index)) = self.parse(sub.oid()) else {
                sub.replace_status(ErrorStatus::UndoFailed, None);
                return;
            };
            let request = sub.request().clone();
            let creation = request.scratch().with::<ChangeSet, _>(self.key(), |set| {
                set.rows.get_mut(&index).map(|change| {
                    if change.creating {
                        Some(std::mem::replace(&mut change.inserted, false))
                    } else {
                        None
                    }
                })
            });

            match creation {
                Some(Some(true)) => {
                    self.rows.write().remove(&index);
                    tracing::debug!(target: "async_snmp_agent::mib", { table = %self.entry, row = %index }, "row creation undone");
                }
                Some(Some(false)) => {}
                Some(None) => {
                    let previous = sub.take_undo_value();
                    let restored = match self.rows.write().get_mut(&index) {
                        Some(row) => {
                            row.values[pos] = previous;
                            true
                        }
                        None => false,
                    };
                    if !restored {
                        sub.replace_status(ErrorStatus::UndoFailed, None);
                    }
                }
                None => sub.replace_status(ErrorStatus::UndoFailed, None),
            }
        })
    }

    fn cleanup<'a>(&'a self, sub: &'a mut SubRequest) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some((_, index)) = self.parse(sub.oid()) else {
                return;
            };
            let request = sub.request().clone();
            let key = self.key();
            let (done, empty) = request.scratch().with::<ChangeSet, _>(key, |set| {
                let done = match set.rows.get_mut(&index) {
                    Some(change) => {
                        change.cleaned += 1;
                        change.cleaned >= change.prepared
                    }
                    None => false,
                };
                if done {
                    set.rows.remove(&index);
                }
                (done, set.rows.is_empty())
            });
            if empty {
                request.scratch().take::<ChangeSet>(key);
            }
            if done {
                for listener in self.listeners() {
                    listener.row_cleanup(request.id(), &index);
                }
            }
        })
    }
}

impl Persistable for Table {
    fn save(&self) -> Vec<VarBind> {
        let rows = self.rows.read();
        let mut out = Vec::new();
        for (pos, column) in self.columns.iter().enumerate() {
            for (index, row) in rows.iter() {
                if let Some(value) = row.get(pos) {
                    out.push(VarBind::new(self.instance_oid(column.id, index), value.clone()));
                }
            }
        }
        out
    }

    fn load(&self, varbinds: &[VarBind]) -> Result<()> {
        let mut loaded: BTreeMap<Oid, Row> = BTreeMap::new();
        for vb in varbinds {
            let cell = self.parse(&vb.oid).filter(|(_, index)| !index.is_empty());
            let Some((pos, index)) = cell else {
                return Err(Error::Config(
                    format!("table {}: {} is not a cell", self.entry, vb.oid).into(),
                )
                .boxed());
            };
            if vb.value.kind() != self.columns[pos].kind {
                return Err(Error::Config(
                    format!("{}: unexpected {:?}", vb.oid, vb.value.kind()).into(),
                )
                .boxed());
            }
            let row = loaded.entry(index).or_insert_with(|| Row {
                values: vec![None; self.columns.len()],
            });
            row.values[pos] = Some(vb.value.clone());
        }
        *self.rows.write() = loaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{RequestContext, RequestId};
    use crate::oid;
    use crate::value::ValueKind;
    use parking_lot::Mutex;

    const ENTRY: [u32; 9] = [1, 3, 6, 1, 4, 1, 99, 1, 1];

    fn entry() -> Oid {
        Oid::from(ENTRY)
    }

    fn table() -> Table {
        let table = Table::builder(entry())
            .column(Column::new(1, ColumnAccess::NotAccessible, ValueKind::Integer))
            .column(Column::new(2, ColumnAccess::ReadWrite, ValueKind::OctetString))
            .column(Column::new(3, ColumnAccess::ReadCreate, ValueKind::Integer))
            .column(
                Column::new(4, ColumnAccess::ReadCreate, ValueKind::Integer)
                    .with_default(Value::Integer(1)),
            )
            .build()
            .unwrap();
        table
            .add_row(
                oid!(1),
                vec![Value::Integer(1), Value::from("a"), Value::Integer(10), Value::Integer(1)],
            )
            .unwrap();
        table
            .add_row(
                oid!(2),
                vec![Value::Integer(2), Value::from("b"), Value::Integer(20), Value::Integer(1)],
            )
            .unwrap();
        table
    }

    fn request(varbinds: &[VarBind]) -> Arc<Request> {
        Arc::new(Request::new(
            RequestId(9),
            RequestContext::test_context(),
            varbinds.iter().map(|vb| vb.oid.clone()).collect(),
            1472,
        ))
    }

    fn subs(varbinds: &[VarBind]) -> Vec<SubRequest> {
        let request = request(varbinds);
        varbinds
            .iter()
            .enumerate()
            .map(|(i, vb)| SubRequest::new(request.clone(), i, vb.clone()))
            .collect()
    }

    fn cell(column: u32, index: u32) -> Oid {
        entry().child(column).child(index)
    }

    #[tokio::test]
    async fn test_walk_skips_not_accessible_column() {
        let table = table();
        let sub = subs(&[VarBind::null(entry())]).remove(0);
        let mut cursor = Region::after(&entry());
        let mut seen = Vec::new();
        while let Some(instance) = table.find(&cursor, &sub).await {
            cursor.advance_past(&instance);
            seen.push(instance);
        }
        assert_eq!(
            seen,
            vec![cell(2, 1), cell(2, 2), cell(3, 1), cell(3, 2), cell(4, 1), cell(4, 2)]
        );
    }

    #[tokio::test]
    async fn test_walk_respects_upper_bound() {
        let table = table();
        let sub = subs(&[VarBind::null(entry())]).remove(0);
        let only_column_2 = Region::subtree(&entry().child(2));
        assert_eq!(table.find(&only_column_2, &sub).await, Some(cell(2, 1)));
        let past = Region::new(cell(2, 2), false, Some(entry().child(3)), false);
        assert_eq!(table.find(&past, &sub).await, None);
    }

    #[tokio::test]
    async fn test_get_exceptions() {
        let table = table();
        let mut s = subs(&[VarBind::null(cell(2, 2))]).remove(0);
        table.get(&mut s).await;
        assert_eq!(s.value(), &Value::from("b"));

        let mut s = subs(&[VarBind::null(cell(2, 9))]).remove(0);
        table.get(&mut s).await;
        assert_eq!(s.value(), &Value::NoSuchInstance);

        let mut s = subs(&[VarBind::null(cell(1, 1))]).remove(0);
        table.get(&mut s).await;
        assert_eq!(s.value(), &Value::NoSuchObject);

        let mut s = subs(&[VarBind::null(cell(8, 1))]).remove(0);
        table.get(&mut s).await;
        assert_eq!(s.value(), &Value::NoSuchObject);
    }

    #[derive(Default)]
    struct Recorder {
        changed: Mutex<Vec<(Oid, RowEventKind)>>,
        committed: Mutex<Vec<(Oid, RowEventKind)>>,
        cells: Mutex<Vec<u32>>,
        cleaned: Mutex<Vec<Oid>>,
        veto: Option<RowVeto>,
    }

    impl RowListener for Recorder {
        fn row_changed(&self, event: &RowEvent<'_>) -> std::result::Result<(), RowVeto> {
            self.changed.lock().push((event.index.clone(), event.kind));
            self.veto.map_or(Ok(()), Err)
        }

        fn cell_changed(&self, event: &CellEvent<'_>) {
            self.cells.lock().push(event.column);
        }

        fn row_committed(&self, event: &RowEvent<'_>) {
            self.committed.lock().push((event.index.clone(), event.kind));
        }

        fn row_cleanup(&self, _request: RequestId, index: &Oid) {
            self.cleaned.lock().push(index.clone());
        }
    }

    async fn run_set(table: &Table, subs: &mut [SubRequest]) -> bool {
        for sub in subs.iter_mut() {
            table.prepare(sub).await;
        }
        let ok = subs.iter().all(|s| !s.has_error());
        if ok {
            for sub in subs.iter_mut() {
                table.commit(sub).await;
            }
        }
        for sub in subs.iter_mut() {
            table.cleanup(sub).await;
        }
        ok
    }

    #[tokio::test]
    async fn test_create_row_fires_single_events() {
        let table = table();
        let recorder = Arc::new(Recorder::default());
        table.add_listener(recorder.clone());

        let mut subs = subs(&[
            VarBind::new(cell(2, 5), Value::from("new")),
            VarBind::new(cell(3, 5), Value::Integer(50)),
        ]);
        // Column 2 is read-write only, so it cannot create the row.
        assert!(!run_set(&table, &mut subs).await);
        assert_eq!(subs[0].status(), ErrorStatus::NoCreation);
        assert!(table.row(&oid!(5)).is_none());
        assert!(recorder.changed.lock().is_empty());

        let mut subs = self::subs(&[
            VarBind::new(cell(3, 5), Value::Integer(50)),
            VarBind::new(cell(4, 5), Value::Integer(2)),
        ]);
        assert!(run_set(&table, &mut subs).await);
        assert_eq!(*recorder.changed.lock(), vec![(oid!(5), RowEventKind::Create)]);
        assert_eq!(*recorder.committed.lock(), vec![(oid!(5), RowEventKind::Create)]);
        assert_eq!(*recorder.cells.lock(), vec![3, 4]);
        // Both requests touched row 5; each cleaned it up once.
        assert_eq!(*recorder.cleaned.lock(), vec![oid!(5), oid!(5)]);
        assert_eq!(table.cell(&oid!(5), 3), Some(Value::Integer(50)));
        assert_eq!(table.cell(&oid!(5), 4), Some(Value::Integer(2)));
        assert_eq!(table.cell(&oid!(5), 2), None);
        assert!(subs[0].request().scratch().is_empty());
    }

    #[tokio::test]
    async fn test_failed_column_keeps_row_unchanged() {
        let table = table();
        let mut subs = subs(&[
            VarBind::new(cell(2, 1), Value::from("changed")),
            VarBind::new(cell(3, 1), Value::from("not an integer")),
        ]);
        assert!(!run_set(&table, &mut subs).await);
        assert_eq!(subs[1].status(), ErrorStatus::WrongType);
        assert_eq!(table.cell(&oid!(1), 2), Some(Value::from("a")));
        assert_eq!(table.cell(&oid!(1), 3), Some(Value::Integer(10)));
    }

    #[tokio::test]
    async fn test_veto_pins_column() {
        let table = table();
        table.add_listener(Arc::new(Recorder {
            veto: Some(RowVeto::at_column(ErrorStatus::InconsistentValue, 2)),
            ..Default::default()
        }));
        let mut subs = subs(&[
            VarBind::new(cell(2, 1), Value::from("x")),
            VarBind::new(cell(3, 1), Value::Integer(11)),
        ]);
        assert!(!run_set(&table, &mut subs).await);
        assert_eq!(subs[1].status(), ErrorStatus::InconsistentValue);
        assert_eq!(subs[1].error_index(), 1);
        assert_eq!(table.cell(&oid!(1), 3), Some(Value::Integer(10)));
    }

    #[tokio::test]
    async fn test_undo_restores_cells_and_removes_created_rows() {
        let table = table();
        let mut subs = subs(&[
            VarBind::new(cell(3, 1), Value::Integer(99)),
            VarBind::new(cell(3, 7), Value::Integer(70)),
        ]);
        for sub in subs.iter_mut() {
            table.prepare(sub).await;
            assert!(!sub.has_error());
        }
        for sub in subs.iter_mut() {
            table.commit(sub).await;
        }
        assert_eq!(table.cell(&oid!(1), 3), Some(Value::Integer(99)));
        assert!(table.row(&oid!(7)).is_some());

        for sub in subs.iter_mut().rev() {
            table.undo(sub).await;
            assert!(!sub.has_error());
        }
        assert_eq!(table.cell(&oid!(1), 3), Some(Value::Integer(10)));
        assert!(table.row(&oid!(7)).is_none());
    }

    #[tokio::test]
    async fn test_walk_steps_from_cursor() {
        let table = table();
        let sub = subs(&[VarBind::null(entry())]).remove(0);
        let first = table.find(&Region::after(&entry()), &sub).await.unwrap();
        let second = table.find(&Region::after(&first), &sub).await;
        assert_eq!(second, Some(cell(2, 2)));
        assert_eq!(sub.request().scratch().len(), 0);
    }

    #[test]
    fn test_builder_rejects_duplicates() {
        let err = Table::builder(entry())
            .column(Column::new(1, ColumnAccess::ReadOnly, ValueKind::Integer))
            .column(Column::new(1, ColumnAccess::ReadOnly, ValueKind::Integer))
            .build();
        assert!(err.is_err());
        assert!(Table::builder(entry()).build().is_err());
    }

    #[test]
    fn test_persistence() {
        let table = table();
        let saved = table.save();
        assert_eq!(saved.len(), 8);
        table.remove_row(&oid!(1));
        table.load(&saved).unwrap();
        assert_eq!(table.indexes(), vec![oid!(1), oid!(2)]);
        assert_eq!(table.cell(&oid!(1), 2), Some(Value::from("a")));
    }
}
