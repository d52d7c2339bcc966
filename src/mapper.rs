//! The mapper facade.
//!
//! ```
//! use rowmap::{
//!     mapper::Mapper,
//!     shape::{Fields, Mappable},
//!     source::{RowSource, Table},
//!     value::Value,
//! };
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Person {
//!     name: String,
//!     age: i32,
//! }
//!
//! impl Mappable for Person {
//!     fn declare(fields: &mut Fields<Self>) {
//!         fields.column("name", "strName", |p| &mut p.name);
//!         fields.column("age", "intAge", |p| &mut p.age).convert();
//!     }
//! }
//!
//! let mut table = Table::new(["strName", "intAge"]);
//! table.push_row([Some(Value::from("Ann")), Some(Value::from("30"))])?;
//!
//! let mapper = Mapper::new();
//! mapper.configure::<Person>()?;
//!
//! let mut reader = table.reader();
//! reader.advance()?;
//! let person = mapper.map::<Person>(&reader)?;
//! assert_eq!(person, Person { name: "Ann".into(), age: 30 });
//! # Ok::<(), rowmap::error::MapError>(())
//! ```

use std::{iter::FusedIterator, sync::Arc};

use log::{debug, warn};

use crate::{
    cache::MappingCache,
    compile::{CompileContext, CompiledShape},
    config::{MapperConfig, UnconfiguredPolicy},
    convert::{ConversionResolver, ConverterTable, NamedConverters},
    error::MapError,
    shape::{Mappable, ShapeId},
    source::RowSource,
};

#[derive(Debug, Clone, Default)]
pub struct MapperOptions {
    /// Replaces the built-in type-keyed converters when set.
    pub converters: Option<ConverterTable>,
    /// Identifier-keyed converters, consulted before the type-keyed table.
    pub named_converters: Option<NamedConverters>,
    pub unconfigured: UnconfiguredPolicy,
}

/// Registers shapes once and maps rows into them.
///
/// The mapper owns its cache: shapes configured on one mapper are unknown to
/// another. It is `Send + Sync`, and `configure` may race across threads.
pub struct Mapper {
    cache: MappingCache,
    resolver: ConversionResolver,
    unconfigured: UnconfiguredPolicy,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapper {
    pub fn new() -> Self {
        Self::with_options(MapperOptions::default())
    }

    pub fn with_options(options: MapperOptions) -> Self {
        let types = options.converters.unwrap_or_else(ConverterTable::defaults);
        Self {
            cache: MappingCache::new(),
            resolver: ConversionResolver::new(types, options.named_converters),
            unconfigured: options.unconfigured,
        }
    }

    pub fn from_config(config: &MapperConfig) -> Self {
        Self::with_options(MapperOptions {
            converters: Some(ConverterTable::from_settings(&config.conversions)),
            named_converters: None,
            unconfigured: config.unconfigured,
        })
    }

    /// Scans and compiles `T` unless it is already cached. Nested shapes are
    /// compiled and cached along the way.
    pub fn configure<T: Mappable>(&self) -> Result<(), MapError> {
        if self.cache.contains::<T>() {
            debug!("Shape '{}' is already configured", ShapeId::of::<T>());
            return Ok(());
        }
        let mut ctx = CompileContext::new(&self.cache, &self.resolver);
        let compiled = self.cache.get_or_compile::<T>(&mut ctx)?;
        debug!(
            "Configured shape '{}' ({} cached shape(s))",
            compiled.id(),
            self.cache.len()
        );
        Ok(())
    }

    pub fn is_configured<T: Mappable>(&self) -> bool {
        self.cache.contains::<T>()
    }

    pub fn trace<T: Mappable>(&self) -> Option<String> {
        self.cache
            .get::<T>()
            .map(|compiled| compiled.trace().to_string())
    }

    pub fn cache(&self) -> &MappingCache {
        &self.cache
    }

    pub fn map<T: Mappable>(&self, row: &dyn RowSource) -> Result<T, MapError> {
        match self.cache.get::<T>() {
            Some(compiled) => compiled.map(row),
            None => self.unconfigured::<T>(),
        }
    }

    /// Lazily maps every remaining row of `source`. Each item advances the
    /// source by one row; the sequence ends after the first error.
    pub fn map_all<'s, T, R>(&self, source: &'s mut R) -> MapAll<'s, T, R>
    where
        T: Mappable,
        R: RowSource,
    {
        let (compiled, pending) = match self.cache.get::<T>() {
            Some(compiled) => (Some(compiled), None),
            None => match self.unconfigured {
                UnconfiguredPolicy::DefaultInstance => {
                    warn!(
                        "Shape '{}' is not configured; no rows will be mapped",
                        ShapeId::of::<T>()
                    );
                    (None, None)
                }
                UnconfiguredPolicy::Fail => (None, Some(not_configured::<T>())),
            },
        };
        MapAll {
            source,
            compiled,
            pending,
            done: false,
        }
    }

    fn unconfigured<T: Mappable>(&self) -> Result<T, MapError> {
        match self.unconfigured {
            UnconfiguredPolicy::DefaultInstance => {
                warn!(
                    "Shape '{}' is not configured; returning a default instance",
                    ShapeId::of::<T>()
                );
                Ok(T::default())
            }
            UnconfiguredPolicy::Fail => Err(not_configured::<T>()),
        }
    }
}

fn not_configured<T: Mappable>() -> MapError {
    MapError::NotConfigured {
        shape: ShapeId::of::<T>().name(),
    }
}

pub struct MapAll<'s, T, R> {
    source: &'s mut R,
    compiled: Option<Arc<CompiledShape<T>>>,
    pending: Option<MapError>,
    done: bool,
}

impl<T, R> Iterator for MapAll<'_, T, R>
where
    T: Mappable,
    R: RowSource,
{
    type Item = Result<T, MapError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(err) = self.pending.take() {
            self.done = true;
            return Some(Err(err));
        }
        let Some(compiled) = self.compiled.as_ref() else {
            self.done = true;
            return None;
        };
        match self.source.advance() {
            Ok(true) => {
                let item = compiled.map(&*self.source);
                if item.is_err() {
                    self.done = true;
                }
                Some(item)
            }
            Ok(false) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<T, R> FusedIterator for MapAll<'_, T, R>
where
    T: Mappable,
    R: RowSource,
{
}
