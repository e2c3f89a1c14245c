//! Sites looked up by tag, the way a host solver addresses them.

use std::collections::{BTreeMap, HashMap};

use hs_core::SiteTag;
use hs_site::Site;

use crate::error::{AppError, AppResult};

/// Owns the live sites of one run.
#[derive(Default)]
pub struct SiteRegistry {
    sites: BTreeMap<SiteTag, Box<dyn Site>>,
    ids: HashMap<String, SiteTag>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `site` under its own tag and the project id.
    pub fn insert(&mut self, id: impl Into<String>, site: Box<dyn Site>) -> AppResult<SiteTag> {
        let tag = site.tag();
        if self.sites.contains_key(&tag) {
            return Err(AppError::DuplicateSite(tag));
        }
        let id = id.into();
        tracing::debug!(site = %site.label(), %id, "site registered");
        self.ids.insert(id, tag);
        self.sites.insert(tag, site);
        Ok(tag)
    }

    pub fn get_mut(&mut self, tag: SiteTag) -> Option<&mut Box<dyn Site>> {
        self.sites.get_mut(&tag)
    }

    pub fn get(&self, tag: SiteTag) -> Option<&dyn Site> {
        self.sites.get(&tag).map(|s| s.as_ref())
    }

    pub fn tag_of(&self, id: &str) -> Option<SiteTag> {
        self.ids.get(id).copied()
    }

    pub fn remove(&mut self, tag: SiteTag) -> Option<Box<dyn Site>> {
        self.ids.retain(|_, t| *t != tag);
        self.sites.remove(&tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = SiteTag> + '_ {
        self.sites.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Closes every site, returning the first error after trying them all.
    pub fn close_all(&mut self) -> AppResult<()> {
        let mut first = None;
        for (tag, mut site) in std::mem::take(&mut self.sites) {
            if let Err(e) = site.close() {
                tracing::warn!(%tag, error = %e, "site did not close cleanly");
                first.get_or_insert(e);
            }
        }
        self.ids.clear();
        match first {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_controls::{ExperimentalControl, Loopback};
    use hs_core::Tag;
    use hs_site::LocalSite;

    fn site(tag: u32) -> Box<dyn Site> {
        let control = ExperimentalControl::new(Tag::new(1), Box::new(Loopback::new()));
        Box::new(LocalSite::with_control(Tag::new(tag), control))
    }

    #[test]
    fn lookup_by_tag_and_id() {
        let mut registry = SiteRegistry::new();
        let tag = registry.insert("a", site(4)).unwrap();
        registry.insert("b", site(2)).unwrap();
        assert_eq!(registry.tag_of("a"), Some(tag));
        assert_eq!(registry.get(tag).unwrap().label(), "local#4");
        assert_eq!(registry.tags().collect::<Vec<_>>(), vec![Tag::new(2), Tag::new(4)]);
    }

    #[test]
    fn duplicate_tag_is_rejected() {
        let mut registry = SiteRegistry::new();
        registry.insert("a", site(1)).unwrap();
        assert!(matches!(
            registry.insert("b", site(1)),
            Err(AppError::DuplicateSite(t)) if t == Tag::new(1)
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_and_close() {
        let mut registry = SiteRegistry::new();
        registry.insert("a", site(1)).unwrap();
        registry.insert("b", site(2)).unwrap();
        assert!(registry.remove(Tag::new(1)).is_some());
        assert_eq!(registry.tag_of("a"), None);
        registry.close_all().unwrap();
        assert!(registry.is_empty());
    }
}
