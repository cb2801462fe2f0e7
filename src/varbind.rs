//! Variable binding (VarBind) type.
//!
//! A VarBind pairs an OID with a value.

use crate::oid::Oid;
use crate::util::tlv_len;
use crate::value::Value;

/// Variable binding - an OID-value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    /// The object identifier.
    pub oid: Oid,
    /// The value.
    pub value: Value,
}

impl VarBind {
    /// Create a new VarBind.
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// Create a VarBind with a NULL value (for GET requests).
    pub fn null(oid: Oid) -> Self {
        Self {
            oid,
            value: Value::Null,
        }
    }

    /// Encoded size of this VarBind in bytes.
    ///
    /// Computed arithmetically; used to keep responses inside the
    /// negotiated maximum message size.
    pub fn encoded_size(&self) -> usize {
        // SEQUENCE { oid, value }
        tlv_len(tlv_len(self.oid.encoded_len()) + self.value.encoded_len())
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)
    }
}

/// Encoded size of a varbind list (the outer SEQUENCE included).
pub fn varbind_list_size(varbinds: &[VarBind]) -> usize {
    tlv_len(varbinds.iter().map(VarBind::encoded_size).sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn test_encoded_size() {
        // 30 0B | 06 07 2B 06 01 02 01 01 00 | 05 00
        let vb = VarBind::null(oid!(1, 3, 6, 1, 2, 1, 1, 0));
        assert_eq!(vb.encoded_size(), 13);

        let vb = VarBind::new(oid!(1, 3, 6, 1, 2, 1, 1, 0), Value::Integer(300));
        assert_eq!(vb.encoded_size(), 15);
    }

    #[test]
    fn test_list_size() {
        assert_eq!(varbind_list_size(&[]), 2);
        let vb = VarBind::null(oid!(1, 3, 6, 1, 2, 1, 1, 0));
        assert_eq!(varbind_list_size(&[vb.clone(), vb]), 28);
    }

    #[test]
    fn test_display() {
        let vb = VarBind::new(oid!(1, 3, 6, 1), Value::from("x"));
        assert_eq!(vb.to_string(), "1.3.6.1 = x");
    }
}
