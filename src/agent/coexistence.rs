//! Community-based admission (RFC 3584 coexistence).
//!
//! SNMPv1 and SNMPv2c messages name neither a principal nor a context. The
//! [`CommunityTable`] maps each accepted community to the security name
//! used for access control and the context the request runs in.

use bytes::Bytes;
use subtle::ConstantTimeEq;

/// One `snmpCommunityTable` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunityEntry {
    pub community: Bytes,
    pub security_name: Bytes,
    pub context_name: Bytes,
}

/// Accepted communities.
#[derive(Debug, Clone, Default)]
pub struct CommunityTable {
    entries: Vec<CommunityEntry>,
}

impl CommunityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `community`, mapping it to `security_name` in `context_name`.
    /// A community added twice keeps its first mapping.
    pub fn add(
        &mut self,
        community: impl Into<Bytes>,
        security_name: impl Into<Bytes>,
        context_name: impl Into<Bytes>,
    ) {
        let community = community.into();
        if self.entries.iter().any(|e| e.community == community) {
            return;
        }
        self.entries.push(CommunityEntry {
            community,
            security_name: security_name.into(),
            context_name: context_name.into(),
        });
    }

    /// Resolve a community.
    ///
    /// Every entry is compared in constant time, whether or not an earlier
    /// one matched, so the answer time does not reveal how much of a guess
    /// was right.
    pub fn resolve(&self, community: &[u8]) -> Option<&CommunityEntry> {
        let mut found = None;
        for entry in &self.entries {
            if entry.community.len() == community.len()
                && bool::from(entry.community.as_ref().ct_eq(community))
                && found.is_none()
            {
                found = Some(entry);
            }
        }
        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Contexts named by the table.
    pub fn contexts(&self) -> impl Iterator<Item = &Bytes> {
        self.entries.iter().map(|e| &e.context_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        let mut table = CommunityTable::new();
        table.add("public", "reader", "");
        table.add("tenant-a", "tenant", "vrf-a");

        let entry = table.resolve(b"tenant-a").unwrap();
        assert_eq!(&entry.security_name[..], b"tenant");
        assert_eq!(&entry.context_name[..], b"vrf-a");
        assert!(table.resolve(b"publi").is_none());
        assert!(table.resolve(b"private").is_none());
    }

    #[test]
    fn test_empty_table_rejects_everything() {
        let table = CommunityTable::new();
        assert!(table.is_empty());
        assert!(table.resolve(b"").is_none());
        assert!(table.resolve(b"public").is_none());
    }

    #[test]
    fn test_first_mapping_wins() {
        let mut table = CommunityTable::new();
        table.add("public", "first", "");
        table.add("public", "second", "other");

        assert_eq!(table.len(), 1);
        assert_eq!(&table.resolve(b"public").unwrap().security_name[..], b"first");
    }
}
