//! Object Identifier (OID) type.
//!
//! OIDs are the keys of the agent's object space. They are stored as
//! `SmallVec<[u32; 16]>` to avoid heap allocation for common OIDs and are
//! ordered lexicographically, arc by arc, with a proper prefix sorting first.

use crate::error::{Error, OidErrorKind, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs (subidentifiers) allowed in an OID.
///
/// Per RFC 2578 Section 3.5: "there are at most 128 sub-identifiers in a value".
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
///
/// Stored as a sequence of arc values (u32). Uses SmallVec to avoid
/// heap allocation for OIDs with 16 or fewer arcs.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an empty OID.
    ///
    /// The empty OID sorts before every other OID, which makes it the natural
    /// starting cursor for a walk.
    pub fn empty() -> Self {
        Self {
            arcs: SmallVec::new(),
        }
    }

    /// Create an OID from arc values.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_snmp_agent::oid::Oid;
    ///
    /// let oid = Oid::new(vec![1, 3, 6, 1, 2, 1]);
    /// assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1]);
    ///
    /// let oid = Oid::new(0..5);
    /// assert_eq!(oid.arcs(), &[0, 1, 2, 3, 4]);
    /// ```
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse an OID from dotted string notation (e.g., "1.3.6.1.2.1.1.1.0").
    ///
    /// A leading dot is accepted. The empty string parses to the empty OID.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_snmp_agent::oid::Oid;
    ///
    /// let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
    /// assert_eq!(oid.len(), 9);
    ///
    /// assert!(Oid::parse("1.3.x").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }

        let mut arcs = SmallVec::new();

        for part in s.split('.') {
            if part.is_empty() {
                continue;
            }

            let arc: u32 = part.parse().map_err(|_| {
                Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s.to_string()).boxed()
            })?;

            arcs.push(arc);
        }

        Ok(Self { arcs })
    }

    /// Get the arc values.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Get the number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Check if the OID is empty.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Check if this OID starts with another OID.
    ///
    /// An OID always starts with itself, and any OID starts with an empty OID.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_snmp_agent::oid;
    ///
    /// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
    /// assert!(sys_descr.starts_with(&oid!(1, 3, 6, 1, 2, 1, 1)));
    /// assert!(!sys_descr.starts_with(&oid!(1, 3, 6, 1, 2, 1, 2)));
    /// ```
    pub fn starts_with(&self, other: &Oid) -> bool {
        self.arcs.len() >= other.arcs.len() && self.arcs[..other.arcs.len()] == other.arcs[..]
    }

    /// Get the parent OID (all arcs except the last).
    ///
    /// Returns `None` if the OID is empty.
    pub fn parent(&self) -> Option<Oid> {
        if self.arcs.is_empty() {
            None
        } else {
            Some(Oid {
                arcs: SmallVec::from_slice(&self.arcs[..self.arcs.len() - 1]),
            })
        }
    }

    /// Create a child OID by appending an arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Create a new OID by appending all arcs of `suffix`.
    ///
    /// Used to build table instance identifiers from an entry OID, a column
    /// and a row index.
    pub fn join(&self, suffix: &Oid) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.extend_from_slice(&suffix.arcs);
        Oid { arcs }
    }

    /// Return the arcs following `prefix`, or `None` if `self` does not start
    /// with `prefix`.
    pub fn strip_prefix(&self, prefix: &Oid) -> Option<&[u32]> {
        if self.starts_with(prefix) {
            Some(&self.arcs[prefix.len()..])
        } else {
            None
        }
    }

    /// The smallest OID that is greater than every OID in the subtree rooted
    /// at `self`.
    ///
    /// Increments the last arc, dropping trailing arcs that would overflow.
    /// Returns `None` when no such OID exists (the empty OID, or every arc is
    /// `u32::MAX`), meaning the subtree extends to the end of the key space.
    ///
    /// # Examples
    ///
    /// ```
    /// use async_snmp_agent::oid;
    ///
    /// assert_eq!(oid!(1, 3, 6, 1, 2, 1, 1).next_peer(), Some(oid!(1, 3, 6, 1, 2, 1, 2)));
    /// assert_eq!(oid!(1, 3, u32::MAX).next_peer(), Some(oid!(1, 4)));
    /// assert_eq!(oid!().next_peer(), None);
    /// ```
    pub fn next_peer(&self) -> Option<Oid> {
        let mut arcs = self.arcs.clone();
        while let Some(last) = arcs.pop() {
            if last < u32::MAX {
                arcs.push(last + 1);
                return Some(Oid { arcs });
            }
        }
        None
    }

    /// Validate that the OID doesn't exceed the maximum arc count.
    pub fn validate_length(&self) -> Result<()> {
        if self.arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid(OidErrorKind::TooManyArcs {
                count: self.arcs.len(),
                max: MAX_OID_LEN,
            })
            .boxed());
        }
        Ok(())
    }

    /// Number of content octets this OID occupies on the wire.
    ///
    /// Computed arithmetically (X.690 Section 8.19 base-128 subidentifiers)
    /// and used only for response size estimation.
    pub fn encoded_len(&self) -> usize {
        match self.arcs.len() {
            0 => 0,
            1 => subidentifier_len(self.arcs[0].saturating_mul(40)),
            _ => {
                let first = self.arcs[0].saturating_mul(40).saturating_add(self.arcs[1]);
                subidentifier_len(first)
                    + self.arcs[2..]
                        .iter()
                        .map(|&arc| subidentifier_len(arc))
                        .sum::<usize>()
            }
        }
    }
}

/// Octets needed for one base-128 subidentifier.
#[inline]
fn subidentifier_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Box<crate::error::Error>;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::new(arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.cmp(&other.arcs)
    }
}

/// Macro to create an OID from literal arcs.
///
/// # Examples
///
/// ```
/// use async_snmp_agent::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
///
/// // Trailing commas are allowed
/// let sys_name = oid!(1, 3, 6, 1, 2, 1, 1, 5, 0,);
/// assert!(sys_name > sys_descr);
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);

        let leading_dot = Oid::parse(".1.3.6").unwrap();
        assert_eq!(leading_dot, oid!(1, 3, 6));
    }

    #[test]
    fn test_parse_invalid() {
        assert!("1.3.abc.1".parse::<Oid>().is_err());
        assert!("1.3.-6.1".parse::<Oid>().is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        let original = oid!(1, 3, 6, 1, 4, 1, 9, 9, 42);
        let parsed: Oid = original.to_string().parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_ordering_prefix_sorts_first() {
        assert!(oid!(1, 3, 6) < oid!(1, 3, 6, 0));
        assert!(oid!(1, 3, 6, 1) < oid!(1, 3, 7));
        assert!(Oid::empty() < oid!(0));
        assert!(oid!(1, 3, 6, 1, 2) > oid!(1, 3, 6, 1, 1, 999));
    }

    #[test]
    fn test_join_and_strip_prefix() {
        let entry = oid!(1, 3, 6, 1, 2, 1, 2, 2, 1);
        let instance = entry.child(2).join(&oid!(7));
        assert_eq!(instance, oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 7));
        assert_eq!(instance.strip_prefix(&entry), Some(&[2u32, 7][..]));
        assert_eq!(oid!(1, 3).strip_prefix(&entry), None);
    }

    #[test]
    fn test_next_peer_bounds_subtree() {
        let system = oid!(1, 3, 6, 1, 2, 1, 1);
        let upper = system.next_peer().unwrap();
        assert!(oid!(1, 3, 6, 1, 2, 1, 1, 9, 9, 9) < upper);
        assert!(oid!(1, 3, 6, 1, 2, 1, 2) >= upper);
        assert_eq!(oid!(u32::MAX, u32::MAX).next_peer(), None);
    }

    #[test]
    fn test_encoded_len() {
        // 1.3.6.1 encodes as 0x2B 0x06 0x01
        assert_eq!(oid!(1, 3, 6, 1).encoded_len(), 3);
        // 2.999.3: first subidentifier 1079 needs two octets
        assert_eq!(oid!(2, 999, 3).encoded_len(), 3);
        assert_eq!(oid!(1, 3, 6, 1, 4, 1, 200_000).encoded_len(), 8);
        assert_eq!(Oid::empty().encoded_len(), 0);
    }

    #[test]
    fn test_validate_length() {
        let arcs: Vec<u32> = (0..MAX_OID_LEN as u32).collect();
        assert!(Oid::new(arcs).validate_length().is_ok());

        let arcs: Vec<u32> = (0..(MAX_OID_LEN + 1) as u32).collect();
        assert!(Oid::new(arcs).validate_length().is_err());
    }
}
