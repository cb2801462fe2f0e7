//! Regions of the OID space.
//!
//! A [`Region`] is a contiguous interval of OIDs with inclusive or exclusive
//! bounds and an optional unbounded upper end. Managed objects occupy one
//! region each; queries and GETNEXT cursors are regions too.
//!
//! A [`ContextRegion`] adds the context partition the region lives in.
//! `None` is the universal context: it matches every partition.
//!
//! # Example
//!
//! ```
//! use async_snmp_agent::scope::Region;
//! use async_snmp_agent::oid;
//!
//! let system = Region::subtree(&oid!(1, 3, 6, 1, 2, 1, 1));
//! assert!(system.covers_oid(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)));
//! assert!(!system.covers_oid(&oid!(1, 3, 6, 1, 2, 1, 2)));
//!
//! let mut cursor = Region::after(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
//! assert!(cursor.overlaps(&system));
//! cursor.subtract(&system);
//! assert!(!cursor.overlaps(&system));
//! ```

use std::cmp::Ordering;
use std::fmt;

use bytes::Bytes;

use crate::oid::Oid;

/// An interval of the OID space.
///
/// Invariant: an unbounded region never carries `upper_included`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    lower: Oid,
    lower_included: bool,
    upper: Option<Oid>,
    upper_included: bool,
}

impl Region {
    /// Region with explicit bounds. `upper = None` means unbounded.
    pub fn new(lower: Oid, lower_included: bool, upper: Option<Oid>, upper_included: bool) -> Self {
        let upper_included = upper.is_some() && upper_included;
        Self {
            lower,
            lower_included,
            upper,
            upper_included,
        }
    }

    /// The whole OID space.
    pub fn all() -> Self {
        Self::new(Oid::empty(), true, None, false)
    }

    /// Exactly one instance: `[oid, oid]`.
    pub fn instance(oid: &Oid) -> Self {
        Self::new(oid.clone(), true, Some(oid.clone()), true)
    }

    /// Every OID below and including `prefix`: `[prefix, next_peer(prefix))`.
    pub fn subtree(prefix: &Oid) -> Self {
        Self::new(prefix.clone(), true, prefix.next_peer(), false)
    }

    /// Every OID strictly greater than `oid`: the GETNEXT cursor.
    pub fn after(oid: &Oid) -> Self {
        Self::new(oid.clone(), false, None, false)
    }

    /// Every OID from `oid` onwards.
    pub fn from_oid(oid: &Oid) -> Self {
        Self::new(oid.clone(), true, None, false)
    }

    pub fn lower(&self) -> &Oid {
        &self.lower
    }

    pub fn is_lower_included(&self) -> bool {
        self.lower_included
    }

    /// Upper bound, `None` when unbounded.
    pub fn upper(&self) -> Option<&Oid> {
        self.upper.as_ref()
    }

    pub fn is_upper_included(&self) -> bool {
        self.upper_included
    }

    /// A region that contains no OID.
    pub fn is_empty(&self) -> bool {
        match &self.upper {
            None => false,
            Some(upper) => match self.lower.cmp(upper) {
                Ordering::Greater => true,
                Ordering::Equal => !(self.lower_included && self.upper_included),
                Ordering::Less => false,
            },
        }
    }

    /// True if `oid` lies within the bounds.
    pub fn covers_oid(&self, oid: &Oid) -> bool {
        let above_lower = match oid.cmp(&self.lower) {
            Ordering::Greater => true,
            Ordering::Equal => self.lower_included,
            Ordering::Less => false,
        };
        above_lower && self.below_upper(oid)
    }

    /// True if `oid` does not exceed the upper bound.
    pub fn below_upper(&self, oid: &Oid) -> bool {
        match &self.upper {
            None => true,
            Some(upper) => match oid.cmp(upper) {
                Ordering::Less => true,
                Ordering::Equal => self.upper_included,
                Ordering::Greater => false,
            },
        }
    }

    /// True if every OID of `other` lies in `self`, judged on the bounds.
    pub fn covers(&self, other: &Region) -> bool {
        let lower_ok = match self.lower.cmp(&other.lower) {
            Ordering::Less => true,
            Ordering::Equal => self.lower_included || !other.lower_included,
            Ordering::Greater => false,
        };
        let upper_ok = match (&self.upper, &other.upper) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(mine), Some(theirs)) => match mine.cmp(theirs) {
                Ordering::Greater => true,
                Ordering::Equal => self.upper_included || !other.upper_included,
                Ordering::Less => false,
            },
        };
        lower_ok && upper_ok
    }

    /// True if the regions share at least one OID.
    pub fn overlaps(&self, other: &Region) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.starts_before_end_of(other) && other.starts_before_end_of(self)
    }

    /// True if some OID of `self` could precede or equal the end of `other`.
    pub(crate) fn starts_before_end_of(&self, other: &Region) -> bool {
        match &other.upper {
            None => true,
            Some(upper) => match self.lower.cmp(upper) {
                Ordering::Less => true,
                Ordering::Equal => self.lower_included && other.upper_included,
                Ordering::Greater => false,
            },
        }
    }

    /// Advance the lower bound past `other`.
    ///
    /// The new lower bound is `other`'s upper bound with its inclusion
    /// flipped. Subtracting an unbounded region leaves `self` empty.
    pub fn subtract(&mut self, other: &Region) {
        match &other.upper {
            Some(upper) => {
                self.lower = upper.clone();
                self.lower_included = !other.upper_included;
            }
            None => {
                self.upper = Some(self.lower.clone());
                self.lower_included = false;
                self.upper_included = false;
            }
        }
    }

    /// Move the lower bound to just past `oid`.
    pub fn advance_past(&mut self, oid: &Oid) {
        self.lower = oid.clone();
        self.lower_included = false;
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.lower_included { '[' } else { '(' };
        match &self.upper {
            Some(upper) => {
                let close = if self.upper_included { ']' } else { ')' };
                write!(f, "{}{}, {}{}", open, self.lower, upper, close)
            }
            None => write!(f, "{}{}, +inf)", open, self.lower),
        }
    }
}

/// A region within a context partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextRegion {
    context: Option<Bytes>,
    region: Region,
}

impl ContextRegion {
    pub fn new(context: Option<Bytes>, region: Region) -> Self {
        Self { context, region }
    }

    /// A region visible in every context.
    pub fn universal(region: Region) -> Self {
        Self::new(None, region)
    }

    pub fn context(&self) -> Option<&Bytes> {
        self.context.as_ref()
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn into_region(self) -> Region {
        self.region
    }

    /// True if the contexts can see each other: equal, or either one universal.
    pub fn context_matches(&self, other: Option<&Bytes>) -> bool {
        match (&self.context, other) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => true,
        }
    }

    /// Context-aware covers.
    pub fn covers(&self, other: &ContextRegion) -> bool {
        self.context_matches(other.context()) && self.region.covers(&other.region)
    }

    /// Context-aware overlaps.
    pub fn overlaps(&self, other: &ContextRegion) -> bool {
        self.context_matches(other.context()) && self.region.overlaps(&other.region)
    }
}

impl fmt::Display for ContextRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(context) => write!(f, "{}@'{}'", self.region, String::from_utf8_lossy(context)),
            None => write!(f, "{}", self.region),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn test_empty() {
        assert!(!Region::instance(&oid!(1, 3)).is_empty());
        assert!(Region::new(oid!(1, 3), false, Some(oid!(1, 3)), true).is_empty());
        assert!(Region::new(oid!(1, 4), true, Some(oid!(1, 3)), true).is_empty());
        assert!(!Region::after(&oid!(1, 3)).is_empty());
    }

    #[test]
    fn test_unbounded_never_upper_included() {
        let r = Region::new(oid!(1), true, None, true);
        assert!(!r.is_upper_included());
        assert_eq!(r, Region::from_oid(&oid!(1)));
    }

    #[test]
    fn test_covers_oid() {
        let r = Region::subtree(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1));
        assert!(r.covers_oid(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1)));
        assert!(r.covers_oid(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 7)));
        assert!(!r.covers_oid(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 2)));

        let after = Region::after(&oid!(1, 3));
        assert!(!after.covers_oid(&oid!(1, 3)));
        assert!(after.covers_oid(&oid!(1, 3, 0)));
    }

    #[test]
    fn test_covers_region() {
        let table = Region::subtree(&oid!(1, 3, 6, 1, 2, 1, 2, 2));
        let entry = Region::subtree(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1));
        assert!(table.covers(&entry));
        assert!(!entry.covers(&table));
        assert!(Region::all().covers(&table));
        assert!(!table.covers(&Region::all()));
        assert!(table.covers(&table));
    }

    #[test]
    fn test_overlaps() {
        let a = Region::new(oid!(1, 1), true, Some(oid!(1, 5)), false);
        let b = Region::new(oid!(1, 5), true, Some(oid!(1, 9)), false);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));

        let c = Region::new(oid!(1, 4), true, None, false);
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));

        let scalar = Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
        assert!(!Region::after(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).overlaps(&scalar));
        assert!(Region::after(&oid!(1, 3, 6, 1, 2, 1, 1)).overlaps(&scalar));
    }

    #[test]
    fn test_subtract() {
        let table = Region::subtree(&oid!(1, 3, 6, 1, 2, 1, 2, 2));
        let mut cursor = Region::after(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 5));
        cursor.subtract(&table);
        assert_eq!(cursor.lower(), &oid!(1, 3, 6, 1, 2, 1, 2, 3));
        assert!(cursor.is_lower_included());
        assert!(!cursor.overlaps(&table));

        let scalar = Region::instance(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
        let mut cursor = Region::from_oid(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0));
        cursor.subtract(&scalar);
        assert!(!cursor.is_lower_included());
        assert!(!cursor.covers_oid(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)));

        let mut cursor = Region::all();
        cursor.subtract(&Region::from_oid(&oid!(1)));
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_context_matching() {
        let universal = ContextRegion::universal(Region::subtree(&oid!(1, 3)));
        let tenant = ContextRegion::new(
            Some(Bytes::from_static(b"tenant")),
            Region::subtree(&oid!(1, 3, 6)),
        );
        let other = ContextRegion::new(
            Some(Bytes::from_static(b"other")),
            Region::subtree(&oid!(1, 3, 6)),
        );
        assert!(universal.covers(&tenant));
        assert!(tenant.overlaps(&universal));
        assert!(!tenant.overlaps(&other));
        assert_eq!(tenant.to_string(), "[1.3.6, 1.3.7)@'tenant'");
    }
}
