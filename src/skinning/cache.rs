use std::sync::Arc;

use rustc_hash::FxHashMap;
use slotmap::{SlotMap, new_key_type};
use uuid::Uuid;

use crate::scene::{NodeHandle, NodeHierarchy};
use crate::skinning::palette::PaletteAllocator;
use crate::skinning::{SkinDescriptor, SkinInstance};

new_key_type! {
    pub struct SkinInstanceKey;
}

struct CacheEntry {
    instance: SkinInstance,
    cache_key: (NodeHandle, Uuid),
    ref_count: usize,
}

/// Shares skin instances between mesh instances.
///
/// Every mesh instance bound to the same root bone with the same descriptor
/// draws with the same palette, so it is computed once per frame. The root
/// bone is only used as an identity key.
#[derive(Default)]
pub struct SkinInstanceCache {
    entries: SlotMap<SkinInstanceKey, CacheEntry>,
    lookup: FxHashMap<(NodeHandle, Uuid), SkinInstanceKey>,
}

impl SkinInstanceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the shared instance for `(root_bone, skin)`, creating and
    /// binding it on first use.
    pub fn acquire(
        &mut self,
        skin: &Arc<SkinDescriptor>,
        hierarchy: &dyn NodeHierarchy,
        root_bone: NodeHandle,
        fallback: NodeHandle,
        allocator: &dyn PaletteAllocator,
    ) -> SkinInstanceKey {
        let cache_key = (root_bone, skin.id());
        if let Some(&key) = self.lookup.get(&cache_key)
            && let Some(entry) = self.entries.get_mut(key)
        {
            entry.ref_count += 1;
            return key;
        }

        let mut instance = SkinInstance::new(Arc::clone(skin), allocator);
        instance.bind(hierarchy, root_bone, fallback);

        let key = self.entries.insert(CacheEntry {
            instance,
            cache_key,
            ref_count: 1,
        });
        self.lookup.insert(cache_key, key);
        log::debug!("Created skin instance for '{}'", skin.name());
        key
    }

    /// Drops one reference. Returns `true` when the instance was destroyed.
    pub fn release(&mut self, key: SkinInstanceKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.ref_count -= 1;
        if entry.ref_count > 0 {
            return false;
        }

        if let Some(entry) = self.entries.remove(key) {
            self.lookup.remove(&entry.cache_key);
        }
        true
    }

    #[must_use]
    pub fn get(&self, key: SkinInstanceKey) -> Option<&SkinInstance> {
        self.entries.get(key).map(|entry| &entry.instance)
    }

    pub fn get_mut(&mut self, key: SkinInstanceKey) -> Option<&mut SkinInstance> {
        self.entries.get_mut(key).map(|entry| &mut entry.instance)
    }

    #[must_use]
    pub fn ref_count(&self, key: SkinInstanceKey) -> usize {
        self.entries.get(key).map_or(0, |entry| entry.ref_count)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SkinInstanceKey, &mut SkinInstance)> {
        self.entries
            .iter_mut()
            .map(|(key, entry)| (key, &mut entry.instance))
    }
}
