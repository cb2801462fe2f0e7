//! Registry ordering.
//!
//! Each context partition of the registry is a `BTreeMap` keyed by
//! [`RegionOrd`]. Stored regions sort by upper bound (unbounded last, an
//! exclusive bound before an inclusive one at the same OID), ties broken by
//! lower bound. Because regions within a partition never overlap, this is
//! also the order of their lower bounds.
//!
//! A query is turned into a probe key that sorts immediately before the
//! first stored region whose upper bound admits the query's lower bound, so
//! `range(probe..)` yields the candidates in the order a scan must visit
//! them.

use crate::oid::Oid;
use crate::scope::Region;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum UpperKey {
    Bounded { oid: Oid, included: bool },
    Unbounded,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Tie {
    Before,
    Lower { oid: Oid, excluded: bool },
    After,
}

/// Ordering key for regions and query probes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RegionOrd {
    upper: UpperKey,
    tie: Tie,
}

impl RegionOrd {
    /// Key of a stored region.
    pub fn of_region(region: &Region) -> Self {
        let upper = match region.upper() {
            Some(oid) => UpperKey::Bounded {
                oid: oid.clone(),
                included: region.is_upper_included(),
            },
            None => UpperKey::Unbounded,
        };
        Self {
            upper,
            tie: Tie::Lower {
                oid: region.lower().clone(),
                excluded: !region.is_lower_included(),
            },
        }
    }

    /// Probe for a query over `region`.
    ///
    /// Sorts before every stored region that may contain `region.lower()`
    /// and after every stored region that ends before it.
    pub fn probe(region: &Region) -> Self {
        let tie = if region.is_lower_included() {
            Tie::Before
        } else {
            Tie::After
        };
        Self {
            upper: UpperKey::Bounded {
                oid: region.lower().clone(),
                included: true,
            },
            tie,
        }
    }
}
