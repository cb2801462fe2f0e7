use crate::value::{Value, ValueKind};

/// MAX-ACCESS of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ColumnAccess {
    /// Index-only columns. Never returned by GET or GETNEXT.
    NotAccessible,
    ReadOnly,
    ReadWrite,
    /// Writable, and a SET on a missing row creates it.
    ReadCreate,
}

impl ColumnAccess {
    pub fn is_readable(self) -> bool {
        self != ColumnAccess::NotAccessible
    }

    pub fn is_writable(self) -> bool {
        matches!(self, ColumnAccess::ReadWrite | ColumnAccess::ReadCreate)
    }
}

/// A column of a conceptual table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Sub-identifier below the entry OID.
    pub id: u32,
    pub access: ColumnAccess,
    pub kind: ValueKind,
    /// Value given to the cell when a row is created without it.
    pub default: Option<Value>,
}

impl Column {
    pub fn new(id: u32, access: ColumnAccess, kind: ValueKind) -> Self {
        Self {
            id,
            access,
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}
