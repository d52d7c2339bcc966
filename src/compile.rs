//! Shape compilation.
//!
//! Compiling a shape turns each scanned binding into a step closure that
//! already holds its typed converter and field accessor, so mapping a row is
//! a sequence of column lookups and direct calls. Leaf steps run first, then
//! composite steps, each of which invokes the nested shape's compiled entry
//! taken from the [`MappingCache`].
//!
//! The human-readable trace of every binding is recorded here, at compile
//! time, and attached to cast failures raised while mapping rows.

use std::{fmt::Write as _, sync::Arc};

use log::debug;

use crate::{
    cache::MappingCache,
    convert::{ConversionResolver, ConvertError, ConvertFn},
    error::MapError,
    shape::{LeafBinding, Mappable, ShapeId, scan},
    source::RowSource,
};

pub(crate) type Step<T> = Box<dyn Fn(&mut T, &dyn RowSource) -> Result<(), RowFault> + Send + Sync>;

/// State carried through one (possibly recursive) compilation.
pub struct CompileContext<'a> {
    cache: &'a MappingCache,
    resolver: &'a ConversionResolver,
    in_progress: Vec<ShapeId>,
}

impl<'a> CompileContext<'a> {
    pub(crate) fn new(cache: &'a MappingCache, resolver: &'a ConversionResolver) -> Self {
        Self {
            cache,
            resolver,
            in_progress: Vec::new(),
        }
    }

    /// Compiled entry of a nested shape, compiling and caching it on a miss.
    pub(crate) fn nested<N: Mappable>(&mut self) -> Result<Arc<CompiledShape<N>>, MapError> {
        let cache = self.cache;
        cache.get_or_compile::<N>(self)
    }
}

pub struct CompiledShape<T> {
    id: ShapeId,
    steps: Vec<Step<T>>,
    trace: String,
}

impl<T: Mappable> CompiledShape<T> {
    pub fn id(&self) -> ShapeId {
        self.id
    }

    /// One line per binding, nested shapes indented under their field.
    pub fn trace(&self) -> &str {
        &self.trace
    }

    pub fn map(&self, row: &dyn RowSource) -> Result<T, MapError> {
        self.run(row)
            .map_err(|fault| fault.into_error(&self.id.name(), &self.trace))
    }

    fn run(&self, row: &dyn RowSource) -> Result<T, RowFault> {
        let mut target = T::default();
        for step in &self.steps {
            step(&mut target, row)?;
        }
        Ok(target)
    }
}

/// Compiles `T`, resolving nested shapes through the context's cache.
pub fn compile<T: Mappable>(ctx: &mut CompileContext<'_>) -> Result<CompiledShape<T>, MapError> {
    let id = ShapeId::of::<T>();
    if ctx.in_progress.contains(&id) {
        let cycle = ctx
            .in_progress
            .iter()
            .chain(std::iter::once(&id))
            .map(ShapeId::name)
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(MapError::InvalidShape {
            shape: id.name(),
            reason: format!("nested shapes form a cycle: {cycle}"),
        });
    }
    ctx.in_progress.push(id);
    let compiled = compile_shape::<T>(ctx, id);
    ctx.in_progress.pop();
    compiled
}

fn compile_shape<T: Mappable>(
    ctx: &mut CompileContext<'_>,
    id: ShapeId,
) -> Result<CompiledShape<T>, MapError> {
    let shape = scan::<T>()?;
    let shape_name = id.name();
    let mut steps = Vec::with_capacity(shape.leaves().len() + shape.composites().len());
    let mut trace = String::new();

    for leaf in shape.leaves() {
        let (step, description) =
            leaf.build(ctx.resolver)
                .map_err(|unsupported| MapError::UnsupportedConversion {
                    shape: shape_name.clone(),
                    field: leaf.field().to_string(),
                    target: unsupported.target,
                    request: format!("{}: {}", leaf.converter(), unsupported.detail),
                })?;
        let nullable = if leaf.is_nullable() { ", nullable" } else { "" };
        let _ = writeln!(
            trace,
            "{shape_name}.{} <- \"{}\" via {description}{nullable}",
            leaf.field(),
            leaf.column()
        );
        steps.push(step);
    }

    for composite in shape.composites() {
        let (step, nested_trace) = composite.build(ctx)?;
        let _ = writeln!(
            trace,
            "{shape_name}.{} <- nested {}",
            composite.field(),
            composite.nested()
        );
        for line in nested_trace.lines() {
            let _ = writeln!(trace, "  {line}");
        }
        steps.push(step);
    }

    debug!(
        "Compiled shape '{}' into {} step(s)",
        shape_name,
        steps.len()
    );
    Ok(CompiledShape { id, steps, trace })
}

pub(crate) fn leaf_step<T, F, G, A>(
    leaf: &LeafBinding<T>,
    routine: ConvertFn<F>,
    access: Arc<A>,
    wrap: fn(F) -> G,
) -> Step<T>
where
    T: 'static,
    F: 'static,
    G: 'static,
    A: Fn(&mut T) -> &mut G + Send + Sync + 'static,
{
    let field = leaf.field();
    let column = leaf.column().to_string();
    let nullable = leaf.is_nullable();
    Box::new(move |target: &mut T, row: &dyn RowSource| {
        if nullable {
            match row.ordinal(&column) {
                None => return Err(RowFault::new(field, &column, FaultKind::Missing)),
                Some(ordinal) if row.is_null(ordinal) => return Ok(()),
                Some(_) => {}
            }
        }
        let Some(value) = row.get(&column) else {
            let kind = if row.ordinal(&column).is_some() {
                FaultKind::Null
            } else {
                FaultKind::Missing
            };
            return Err(RowFault::new(field, &column, kind));
        };
        let converted = routine(value)
            .map_err(|err| RowFault::new(field, &column, FaultKind::Convert(err)))?;
        *access(target) = wrap(converted);
        Ok(())
    })
}

pub(crate) fn composite_step<T, N, A>(
    field: &'static str,
    nested: Arc<CompiledShape<N>>,
    access: Arc<A>,
) -> Step<T>
where
    T: 'static,
    N: Mappable,
    A: Fn(&mut T) -> &mut N + Send + Sync + 'static,
{
    Box::new(move |target: &mut T, row: &dyn RowSource| {
        let value = nested.run(row).map_err(|fault| fault.within(field))?;
        *access(target) = value;
        Ok(())
    })
}

#[derive(Debug)]
pub(crate) enum FaultKind {
    Missing,
    Null,
    Convert(ConvertError),
}

/// A row-time failure, located by its dotted binding path.
#[derive(Debug)]
pub(crate) struct RowFault {
    binding: String,
    column: String,
    kind: FaultKind,
}

impl RowFault {
    fn new(field: &str, column: &str, kind: FaultKind) -> Self {
        Self {
            binding: field.to_string(),
            column: column.to_string(),
            kind,
        }
    }

    fn within(mut self, field: &str) -> Self {
        self.binding = format!("{field}.{}", self.binding);
        self
    }

    fn into_error(self, shape: &str, trace: &str) -> MapError {
        let reason = match self.kind {
            FaultKind::Missing => {
                return MapError::MissingColumn {
                    shape: shape.to_string(),
                    binding: self.binding,
                    column: self.column,
                };
            }
            FaultKind::Null => "null value in a non-nullable binding".to_string(),
            FaultKind::Convert(err) => err.to_string(),
        };
        MapError::CastFailure {
            shape: shape.to_string(),
            binding: self.binding,
            column: self.column,
            reason,
            trace: trace.to_string(),
        }
    }
}
