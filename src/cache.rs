use std::{
    any::{Any, TypeId},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use log::debug;

use crate::{
    compile::{self, CompileContext, CompiledShape},
    error::MapError,
    shape::{Mappable, ShapeId},
};

#[derive(Clone)]
struct CacheEntry {
    id: ShapeId,
    trace: Arc<str>,
    compiled: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct MappingCache {
    entries: DashMap<TypeId, CacheEntry>,
    compilations: AtomicUsize,
}

impl MappingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Mappable>(&self) -> Option<Arc<CompiledShape<T>>> {
        let compiled = Arc::clone(&self.entries.get(&TypeId::of::<T>())?.compiled);
        compiled.downcast::<CompiledShape<T>>().ok()
    }

    pub fn contains<T: Mappable>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub(crate) fn get_or_compile<T: Mappable>(
        &self,
        ctx: &mut CompileContext<'_>,
    ) -> Result<Arc<CompiledShape<T>>, MapError> {
        if let Some(hit) = self.get::<T>() {
            debug!("Reusing compiled shape '{}'", hit.id());
            return Ok(hit);
        }

        // No guard is held here: nested shapes insert into the same map.
        let compiled = Arc::new(compile::compile::<T>(ctx)?);
        self.compilations.fetch_add(1, Ordering::Relaxed);

        match self.entries.entry(TypeId::of::<T>()) {
            Entry::Occupied(existing) => {
                debug!(
                    "Discarding redundant compilation of '{}'",
                    existing.get().id
                );
                Arc::clone(&existing.get().compiled)
                    .downcast::<CompiledShape<T>>()
                    .map_err(|_| MapError::InvalidShape {
                        shape: compiled.id().name(),
                        reason: "cache entry holds a different shape".to_string(),
                    })
            }
            Entry::Vacant(slot) => {
                slot.insert(CacheEntry {
                    id: compiled.id(),
                    trace: Arc::from(compiled.trace()),
                    compiled: Arc::clone(&compiled) as Arc<dyn Any + Send + Sync>,
                });
                Ok(compiled)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of compilations performed, including ones discarded after a race.
    pub fn compilations(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    pub fn traces(&self) -> Vec<(String, String)> {
        let mut traces = self
            .entries
            .iter()
            .map(|entry| (entry.id.name(), entry.trace.to_string()))
            .collect::<Vec<_>>();
        traces.sort();
        traces
    }
}
