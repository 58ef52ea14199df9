//! Type-indexed cache of resolvable bean definitions

use std::collections::HashMap;

use tracing::debug;

use crate::definition::BeanHandle;
use crate::types::BeanType;

/// Maps a bean type to every resolved definition cached under it,
/// in resolution order.
#[derive(Debug, Default)]
pub struct BeanCache {
    items: HashMap<BeanType, Vec<BeanHandle>>,
}

impl BeanCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Definitions cached under `bean_type`; creates an empty entry on first access
    pub fn get(&mut self, bean_type: BeanType) -> &[BeanHandle] {
        self.items.entry(bean_type).or_default()
    }

    /// Read-only lookup that never creates entries
    pub fn peek(&self, bean_type: BeanType) -> &[BeanHandle] {
        self.items
            .get(&bean_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn store(&mut self, bean_type: BeanType, handle: BeanHandle, bean_id: &str) {
        debug!(bean_type = %bean_type, bean = bean_id, "cached bean");
        self.items.entry(bean_type).or_default().push(handle);
    }

    /// Number of cached types, including lazily created empty ones
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
