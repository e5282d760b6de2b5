//! Definition store: identifier → archetype.
//!
//! Three tables:
//! - **templates** -- concrete archetypes authored by content.
//! - **abstracts** -- non-instantiable `copy-from` bases, load time only.
//! - **runtime** -- archetypes synthesized on demand after freeze.
//!
//! Lifecycle: insert while building, [`DefinitionStore::freeze`] once
//! finalized, then read-only except for the runtime table, which is guarded
//! by its own lock so it can be filled from shared references.

use crate::archetype::Archetype;
use crate::id::ItypeId;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("no archetype with id '{0}'")]
    NotFound(ItypeId),
    #[error("store is frozen; cannot insert static archetype '{0}'")]
    Frozen(ItypeId),
    #[error("catalog enumeration requires a frozen store")]
    NotFrozen,
    #[error("'{0}' is already a static archetype")]
    DuplicateStatic(ItypeId),
    #[error("catalog has already been finalized")]
    AlreadyFrozen,
}

/// A borrowed static archetype or a shared runtime one.
#[derive(Debug, Clone)]
pub enum ArchetypeRef<'a> {
    Static(&'a Archetype),
    Runtime(Arc<Archetype>),
}

impl Deref for ArchetypeRef<'_> {
    type Target = Archetype;

    fn deref(&self) -> &Archetype {
        match self {
            ArchetypeRef::Static(a) => a,
            ArchetypeRef::Runtime(a) => a,
        }
    }
}

impl ArchetypeRef<'_> {
    pub fn is_runtime(&self) -> bool {
        matches!(self, ArchetypeRef::Runtime(_))
    }
}

#[derive(Debug, Default)]
pub struct DefinitionStore {
    templates: HashMap<ItypeId, Archetype>,
    abstracts: HashMap<ItypeId, Archetype>,
    runtime: RwLock<HashMap<ItypeId, Arc<Archetype>>>,
    frozen: bool,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a concrete archetype. Returns the one it replaced.
    pub fn insert(&mut self, archetype: Archetype) -> Result<Option<Archetype>, StoreError> {
        if self.frozen {
            return Err(StoreError::Frozen(archetype.id));
        }
        // A concrete definition supersedes an abstract of the same name.
        self.abstracts.remove(&archetype.id);
        Ok(self.templates.insert(archetype.id.clone(), archetype))
    }

    /// Insert or replace an abstract template.
    pub fn insert_abstract(&mut self, archetype: Archetype) -> Result<Option<Archetype>, StoreError> {
        if self.frozen {
            return Err(StoreError::Frozen(archetype.id));
        }
        Ok(self.abstracts.insert(archetype.id.clone(), archetype))
    }

    pub fn lookup(&self, id: &ItypeId) -> Result<&Archetype, StoreError> {
        self.templates
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    pub fn lookup_abstract(&self, id: &ItypeId) -> Option<&Archetype> {
        self.abstracts.get(id)
    }

    /// Whether a concrete archetype with this id was authored.
    pub fn has(&self, id: &ItypeId) -> bool {
        self.templates.contains_key(id)
    }

    pub fn has_abstract(&self, id: &ItypeId) -> bool {
        self.abstracts.contains_key(id)
    }

    /// Static first, then the runtime table.
    pub fn lookup_any(&self, id: &ItypeId) -> Option<ArchetypeRef<'_>> {
        if let Some(a) = self.templates.get(id) {
            return Some(ArchetypeRef::Static(a));
        }
        self.runtime_read().get(id).cloned().map(ArchetypeRef::Runtime)
    }

    /// Every concrete archetype, sorted by id. Only valid after freeze.
    pub fn all(&self) -> Result<Vec<&Archetype>, StoreError> {
        if !self.frozen {
            return Err(StoreError::NotFrozen);
        }
        let mut out: Vec<&Archetype> = self.templates.values().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ItypeId> {
        self.templates.keys()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Mutable access to the concrete table while building.
    pub fn templates_mut(&mut self) -> Result<&mut HashMap<ItypeId, Archetype>, StoreError> {
        if self.frozen {
            return Err(StoreError::NotFrozen);
        }
        Ok(&mut self.templates)
    }

    pub fn templates(&self) -> &HashMap<ItypeId, Archetype> {
        &self.templates
    }

    pub fn freeze(&mut self) {
        // Abstracts are load-time only.
        self.abstracts.clear();
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Drop every table and return to the unfrozen state.
    pub fn reset(&mut self) {
        self.templates.clear();
        self.abstracts.clear();
        self.runtime_write().clear();
        self.frozen = false;
    }

    /// Insert a synthesized archetype into the runtime table.
    ///
    /// Idempotent: if the id is already present the existing entry is
    /// returned and `archetype` is discarded. The boolean is `true` when
    /// this call performed the insertion.
    pub fn insert_runtime(&self, archetype: Archetype) -> Result<(Arc<Archetype>, bool), StoreError> {
        if self.templates.contains_key(&archetype.id) {
            return Err(StoreError::DuplicateStatic(archetype.id));
        }
        let mut runtime = self.runtime_write();
        if let Some(existing) = runtime.get(&archetype.id) {
            return Ok((Arc::clone(existing), false));
        }
        let entry = Arc::new(archetype);
        runtime.insert(entry.id.clone(), Arc::clone(&entry));
        Ok((entry, true))
    }

    pub fn runtime_len(&self) -> usize {
        self.runtime_read().len()
    }

    fn runtime_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ItypeId, Arc<Archetype>>> {
        self.runtime.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn runtime_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ItypeId, Arc<Archetype>>> {
        self.runtime.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
