//! View-based Access Control Model (RFC 3415).
//!
//! [`VacmConfig`] answers the two questions the dispatcher asks through
//! [`AccessControl`]: which view applies to a request, and whether an OID
//! lies inside that view.
//!
//! Resolution runs through three tables:
//! 1. security-to-group: `(securityModel, securityName)` → group
//! 2. access: `(group, context, securityModel, securityLevel)` → view names
//! 3. view tree family: view name → included/excluded subtrees
//!
//! # Example
//!
//! ```rust
//! use async_snmp_agent::agent::VacmBuilder;
//! use async_snmp_agent::handler::{SecurityLevel, SecurityModel};
//! use async_snmp_agent::query::{AccessControl, AccessKind};
//! use async_snmp_agent::oid;
//!
//! let vacm = VacmBuilder::new()
//!     .group("public", SecurityModel::V2c, "readers")
//!     .access("readers", |a| a.read_view("system"))
//!     .view("system", |v| v.include(oid!(1, 3, 6, 1, 2, 1, 1)))
//!     .build();
//!
//! let view = vacm
//!     .resolve_view(b"", b"public", SecurityModel::V2c, SecurityLevel::NoAuthNoPriv, AccessKind::Read)
//!     .unwrap();
//! assert!(vacm.is_permitted(&view, &oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)));
//! assert!(!vacm.is_permitted(&view, &oid!(1, 3, 6, 1, 2, 1, 2, 1, 0)));
//! ```

use std::collections::HashMap;

use bytes::Bytes;

use crate::handler::{SecurityLevel, SecurityModel};
use crate::oid::Oid;
use crate::query::{AccessControl, AccessKind};

/// How an access entry's context name is compared with the request's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ContextMatch {
    #[default]
    Exact,
    Prefix,
}

impl ContextMatch {
    fn accepts(self, entry: &[u8], context: &[u8]) -> bool {
        match self {
            ContextMatch::Exact => entry == context,
            ContextMatch::Prefix => context.starts_with(entry),
        }
    }
}

/// One family of a view: a subtree, a wildcard mask and whether it is
/// included or excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewFamily {
    pub subtree: Oid,
    /// One bit per arc, most significant bit first. A zero bit accepts any
    /// value for that arc; arcs past the end of the mask must match.
    pub mask: Vec<u8>,
    pub included: bool,
}

impl ViewFamily {
    pub fn matches(&self, oid: &Oid) -> bool {
        let arcs = oid.arcs();
        let subtree = self.subtree.arcs();
        if arcs.len() < subtree.len() {
            return false;
        }
        subtree
            .iter()
            .zip(arcs)
            .enumerate()
            .all(|(i, (want, got))| !self.must_match(i) || want == got)
    }

    fn must_match(&self, arc: usize) -> bool {
        match self.mask.get(arc / 8) {
            Some(byte) => byte & (0x80 >> (arc % 8)) != 0,
            None => true,
        }
    }
}

/// A named collection of view families.
#[derive(Debug, Clone, Default)]
pub struct View {
    families: Vec<ViewFamily>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(self, subtree: Oid) -> Self {
        self.family(subtree, Vec::new(), true)
    }

    pub fn include_masked(self, subtree: Oid, mask: Vec<u8>) -> Self {
        self.family(subtree, mask, true)
    }

    pub fn exclude(self, subtree: Oid) -> Self {
        self.family(subtree, Vec::new(), false)
    }

    pub fn exclude_masked(self, subtree: Oid, mask: Vec<u8>) -> Self {
        self.family(subtree, mask, false)
    }

    fn family(mut self, subtree: Oid, mask: Vec<u8>, included: bool) -> Self {
        self.families.push(ViewFamily {
            subtree,
            mask,
            included,
        });
        self
    }

    pub fn families(&self) -> &[ViewFamily] {
        &self.families
    }

    /// True if `oid` is in the view.
    ///
    /// Among the families matching `oid`, the one with the longest subtree
    /// decides; on equal length the lexicographically greater subtree wins
    /// (RFC 3415 Section 5).
    pub fn contains(&self, oid: &Oid) -> bool {
        self.families
            .iter()
            .filter(|family| family.matches(oid))
            .max_by(|a, b| {
                a.subtree
                    .len()
                    .cmp(&b.subtree.len())
                    .then_with(|| a.subtree.cmp(&b.subtree))
            })
            .is_some_and(|family| family.included)
    }
}

/// Row of the access table.
#[derive(Debug, Clone)]
pub struct AccessEntry {
    pub group: Bytes,
    pub context: Bytes,
    pub context_match: ContextMatch,
    /// `Any` matches every model.
    pub security_model: SecurityModel,
    /// Minimum level a request needs.
    pub security_level: SecurityLevel,
    pub read_view: Bytes,
    pub write_view: Bytes,
    pub notify_view: Bytes,
}

impl AccessEntry {
    pub fn new(group: impl Into<Bytes>) -> Self {
        Self {
            group: group.into(),
            context: Bytes::new(),
            context_match: ContextMatch::Exact,
            security_model: SecurityModel::Any,
            security_level: SecurityLevel::NoAuthNoPriv,
            read_view: Bytes::new(),
            write_view: Bytes::new(),
            notify_view: Bytes::new(),
        }
    }

    pub fn context(mut self, context: impl Into<Bytes>) -> Self {
        self.context = context.into();
        self
    }

    /// Match the request context against `context` as a prefix.
    pub fn context_prefix(mut self, prefix: impl Into<Bytes>) -> Self {
        self.context = prefix.into();
        self.context_match = ContextMatch::Prefix;
        self
    }

    pub fn security_model(mut self, model: SecurityModel) -> Self {
        self.security_model = model;
        self
    }

    pub fn security_level(mut self, level: SecurityLevel) -> Self {
        self.security_level = level;
        self
    }

    pub fn read_view(mut self, view: impl Into<Bytes>) -> Self {
        self.read_view = view.into();
        self
    }

    pub fn write_view(mut self, view: impl Into<Bytes>) -> Self {
        self.write_view = view.into();
        self
    }

    pub fn notify_view(mut self, view: impl Into<Bytes>) -> Self {
        self.notify_view = view.into();
        self
    }

    fn applies(
        &self,
        group: &[u8],
        context: &[u8],
        model: SecurityModel,
        level: SecurityLevel,
    ) -> bool {
        self.group.as_ref() == group
            && self.context_match.accepts(&self.context, context)
            && (self.security_model == model || self.security_model == SecurityModel::Any)
            && level >= self.security_level
    }

    /// Preference among applicable entries: a specific model beats `Any`,
    /// an exact context beats a prefix, longer context beats shorter, higher
    /// level beats lower.
    fn rank(&self, model: SecurityModel) -> (bool, bool, usize, SecurityLevel) {
        (
            self.security_model == model,
            self.context_match == ContextMatch::Exact,
            self.context.len(),
            self.security_level,
        )
    }

    fn view_for(&self, access: AccessKind) -> &Bytes {
        match access {
            AccessKind::Read => &self.read_view,
            AccessKind::Write => &self.write_view,
            AccessKind::Notify => &self.notify_view,
        }
    }
}

/// VACM tables.
#[derive(Debug, Clone, Default)]
pub struct VacmConfig {
    groups: HashMap<(SecurityModel, Bytes), Bytes>,
    access: Vec<AccessEntry>,
    views: HashMap<Bytes, View>,
}

impl VacmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(
        &mut self,
        security_name: impl Into<Bytes>,
        model: SecurityModel,
        group: impl Into<Bytes>,
    ) {
        self.groups.insert((model, security_name.into()), group.into());
    }

    pub fn add_access(&mut self, entry: AccessEntry) {
        self.access.push(entry);
    }

    pub fn add_view(&mut self, name: impl Into<Bytes>, view: View) {
        self.views.insert(name.into(), view);
    }

    /// Group of a principal. A mapping under `SecurityModel::Any` applies
    /// when there is none for the exact model.
    pub fn group(&self, model: SecurityModel, security_name: &[u8]) -> Option<&Bytes> {
        let name = Bytes::copy_from_slice(security_name);
        self.groups
            .get(&(model, name.clone()))
            .or_else(|| self.groups.get(&(SecurityModel::Any, name)))
    }

    /// Best access entry for a group in a context.
    pub fn access_entry(
        &self,
        group: &[u8],
        context: &[u8],
        model: SecurityModel,
        level: SecurityLevel,
    ) -> Option<&AccessEntry> {
        self.access
            .iter()
            .filter(|entry| entry.applies(group, context, model, level))
            .max_by_key(|entry| entry.rank(model))
    }

    pub fn view(&self, name: &[u8]) -> Option<&View> {
        self.views.get(name)
    }
}

impl AccessControl for VacmConfig {
    fn resolve_view(
        &self,
        context: &[u8],
        security_name: &[u8],
        model: SecurityModel,
        level: SecurityLevel,
        access: AccessKind,
    ) -> Option<Bytes> {
        let group = self.group(model, security_name)?;
        let entry = self.access_entry(group, context, model, level)?;
        let view = entry.view_for(access);
        if view.is_empty() {
            None
        } else {
            Some(view.clone())
        }
    }

    fn is_permitted(&self, view: &[u8], oid: &Oid) -> bool {
        self.views.get(view).is_some_and(|v| v.contains(oid))
    }
}

/// Builder for [`VacmConfig`].
#[derive(Debug, Default)]
pub struct VacmBuilder {
    config: VacmConfig,
}

impl VacmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(
        mut self,
        security_name: impl Into<Bytes>,
        model: SecurityModel,
        group: impl Into<Bytes>,
    ) -> Self {
        self.config.add_group(security_name, model, group);
        self
    }

    pub fn access(
        mut self,
        group: impl Into<Bytes>,
        configure: impl FnOnce(AccessEntry) -> AccessEntry,
    ) -> Self {
        self.config.add_access(configure(AccessEntry::new(group)));
        self
    }

    pub fn view(mut self, name: impl Into<Bytes>, configure: impl FnOnce(View) -> View) -> Self {
        self.config.add_view(name, configure(View::new()));
        self
    }

    pub fn build(self) -> VacmConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn read(
        vacm: &VacmConfig,
        name: &[u8],
        model: SecurityModel,
        level: SecurityLevel,
    ) -> Option<Bytes> {
        vacm.resolve_view(b"", name, model, level, AccessKind::Read)
    }

    #[test]
    fn test_view_subtree() {
        let view = View::new().include(oid!(1, 3, 6, 1, 2, 1));

        assert!(view.contains(&oid!(1, 3, 6, 1, 2, 1)));
        assert!(view.contains(&oid!(1, 3, 6, 1, 2, 1, 2, 1, 1)));
        assert!(!view.contains(&oid!(1, 3, 6, 1, 2)));
        assert!(!view.contains(&oid!(1, 3, 6, 1, 4, 1)));
    }

    #[test]
    fn test_longest_family_decides() {
        let view = View::new()
            .include(oid!(1, 3, 6, 1, 2, 1))
            .exclude(oid!(1, 3, 6, 1, 2, 1, 1))
            .include(oid!(1, 3, 6, 1, 2, 1, 1, 5));

        assert!(view.contains(&oid!(1, 3, 6, 1, 2, 1, 2, 1, 0)));
        assert!(!view.contains(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)));
        // The re-included sysName sits under the excluded system group.
        assert!(view.contains(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)));
    }

    #[test]
    fn test_masked_family() {
        // ifDescr with the column arc pinned and everything after wild.
        let family = ViewFamily {
            subtree: oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 7),
            mask: vec![0xff, 0xc0],
            included: true,
        };

        assert!(family.matches(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 1)));
        assert!(family.matches(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 999)));
        assert!(!family.matches(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 3, 1)));
        assert!(!family.matches(&oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2)));
    }

    #[test]
    fn test_group_falls_back_to_any_model() {
        let vacm = VacmBuilder::new()
            .group("ops", SecurityModel::Any, "operators")
            .group("public", SecurityModel::V2c, "readers")
            .build();

        assert_eq!(vacm.group(SecurityModel::V1, b"ops").map(|g| &g[..]), Some(&b"operators"[..]));
        assert!(vacm.group(SecurityModel::V1, b"public").is_none());
    }

    #[test]
    fn test_resolve_view_per_access_kind() {
        let vacm = VacmBuilder::new()
            .group("admin", SecurityModel::Usm, "admins")
            .access("admins", |a| {
                a.security_model(SecurityModel::Usm)
                    .security_level(SecurityLevel::AuthPriv)
                    .read_view("all")
                    .write_view("system")
            })
            .build();

        let resolve =
            |level, access| vacm.resolve_view(b"", b"admin", SecurityModel::Usm, level, access);

        assert_eq!(
            resolve(SecurityLevel::AuthPriv, AccessKind::Read).as_deref(),
            Some(&b"all"[..])
        );
        assert_eq!(
            resolve(SecurityLevel::AuthPriv, AccessKind::Write).as_deref(),
            Some(&b"system"[..])
        );
        // No notify view configured.
        assert!(resolve(SecurityLevel::AuthPriv, AccessKind::Notify).is_none());
        // Level too low.
        assert!(resolve(SecurityLevel::AuthNoPriv, AccessKind::Read).is_none());
    }

    #[test]
    fn test_specific_model_preferred() {
        let vacm = VacmBuilder::new()
            .group("public", SecurityModel::V2c, "readers")
            .access("readers", |a| a.read_view("narrow"))
            .access("readers", |a| a.security_model(SecurityModel::V2c).read_view("wide"))
            .build();

        let view = read(&vacm, b"public", SecurityModel::V2c, SecurityLevel::NoAuthNoPriv);
        assert_eq!(view.as_deref(), Some(&b"wide"[..]));
    }

    #[test]
    fn test_context_prefix() {
        let vacm = VacmBuilder::new()
            .group("tenant", SecurityModel::Usm, "tenants")
            .access("tenants", |a| a.context_prefix("vrf-").read_view("all"))
            .build();

        let resolve = |context: &[u8]| {
            vacm.resolve_view(
                context,
                b"tenant",
                SecurityModel::Usm,
                SecurityLevel::NoAuthNoPriv,
                AccessKind::Read,
            )
        };
        assert!(resolve(b"vrf-blue").is_some());
        assert!(resolve(b"mgmt").is_none());
    }

    #[test]
    fn test_is_permitted_unknown_view() {
        let vacm = VacmBuilder::new()
            .view("all", |v| v.include(oid!(1, 3, 6, 1)))
            .build();

        assert!(vacm.is_permitted(b"all", &oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)));
        assert!(!vacm.is_permitted(b"missing", &oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)));
    }
}
