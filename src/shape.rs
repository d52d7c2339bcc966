//! Declarative shape metadata.
//!
//! A target type describes its bindings once by implementing [`Mappable`]:
//!
//! ```
//! use rowmap::shape::{Fields, Mappable};
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     name: String,
//!     age: i32,
//!     nickname: Option<String>,
//! }
//!
//! impl Mappable for Person {
//!     fn declare(fields: &mut Fields<Self>) {
//!         fields.column("name", "strName", |p| &mut p.name);
//!         fields.column("age", "intAge", |p| &mut p.age).convert();
//!         fields.nullable_column("nickname", "strNick", |p| &mut p.nickname);
//!     }
//! }
//! ```
//!
//! [`scan`] collects those declarations into a [`Shape`], validating that each
//! field is bound at most once. Fields that are not declared keep their
//! `Default` value.

use std::{
    any::{TypeId, type_name},
    collections::HashMap,
    fmt,
    sync::Arc,
};

use log::debug;

use crate::{
    compile::{self, CompileContext, Step},
    convert::{ConversionResolver, ConverterRequest, Unsupported, short_type_name},
    error::MapError,
};

/// A type that can be materialised from a row.
pub trait Mappable: Default + 'static {
    fn declare(fields: &mut Fields<Self>);
}

/// Stable identity of a shape: its type.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId {
    type_id: TypeId,
    type_name: &'static str,
}

impl ShapeId {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> String {
        short_type_name(self.type_name)
    }
}

impl fmt::Debug for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShapeId({})", self.type_name)
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

type LeafFactory<T> =
    Box<dyn Fn(&LeafBinding<T>, &ConversionResolver) -> Result<(Step<T>, String), Unsupported>>;

type CompositeFactory<T> = Box<dyn Fn(&mut CompileContext<'_>) -> Result<(Step<T>, String), MapError>>;

/// One column bound to one field.
pub struct LeafBinding<T> {
    field: &'static str,
    column: String,
    nullable: bool,
    converter: ConverterRequest,
    target: &'static str,
    factory: LeafFactory<T>,
}

impl<T> LeafBinding<T> {
    /// Use the type-keyed converter for the field's type.
    pub fn convert(&mut self) -> &mut Self {
        self.converter = ConverterRequest::ByType;
        self
    }

    /// Use the converter registered under `id`, falling back to the
    /// type-keyed table when no such identifier is configured.
    pub fn convert_with(&mut self, id: impl Into<String>) -> &mut Self {
        self.converter = ConverterRequest::ById(id.into());
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn converter(&self) -> &ConverterRequest {
        &self.converter
    }

    /// Field value type, without module paths.
    pub fn target(&self) -> String {
        short_type_name(self.target)
    }

    pub(crate) fn build(&self, resolver: &ConversionResolver) -> Result<(Step<T>, String), Unsupported> {
        (self.factory)(self, resolver)
    }
}

impl<T> fmt::Debug for LeafBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafBinding")
            .field("field", &self.field)
            .field("column", &self.column)
            .field("nullable", &self.nullable)
            .field("converter", &self.converter)
            .field("target", &self.target())
            .finish()
    }
}

/// A field holding a nested shape read from the same row.
pub struct CompositeBinding<T> {
    field: &'static str,
    nested: ShapeId,
    factory: CompositeFactory<T>,
}

impl<T> CompositeBinding<T> {
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn nested(&self) -> ShapeId {
        self.nested
    }

    pub(crate) fn build(&self, ctx: &mut CompileContext<'_>) -> Result<(Step<T>, String), MapError> {
        (self.factory)(ctx)
    }
}

impl<T> fmt::Debug for CompositeBinding<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeBinding")
            .field("field", &self.field)
            .field("nested", &self.nested)
            .finish()
    }
}

/// Collects the binding declarations of one shape.
pub struct Fields<T> {
    leaves: Vec<LeafBinding<T>>,
    composites: Vec<CompositeBinding<T>>,
}

impl<T: 'static> Fields<T> {
    fn new() -> Self {
        Self {
            leaves: Vec::new(),
            composites: Vec::new(),
        }
    }

    /// Binds `column` to a field that must always receive a value.
    pub fn column<F, A>(
        &mut self,
        field: &'static str,
        column: impl Into<String>,
        access: A,
    ) -> &mut LeafBinding<T>
    where
        F: 'static,
        A: Fn(&mut T) -> &mut F + Send + Sync + 'static,
    {
        let access = Arc::new(access);
        let factory: LeafFactory<T> = Box::new(move |leaf, resolver| {
            let resolved = resolver.resolve::<F>(&leaf.converter)?;
            let step =
                compile::leaf_step(leaf, resolved.routine, Arc::clone(&access), std::convert::identity::<F>);
            Ok((step, resolved.description))
        });
        self.push_leaf(field, column.into(), false, type_name::<F>(), factory)
    }

    /// Binds `column` to an `Option` field; a null cell leaves it `None`.
    pub fn nullable_column<F, A>(
        &mut self,
        field: &'static str,
        column: impl Into<String>,
        access: A,
    ) -> &mut LeafBinding<T>
    where
        F: 'static,
        A: Fn(&mut T) -> &mut Option<F> + Send + Sync + 'static,
    {
        let access = Arc::new(access);
        let factory: LeafFactory<T> = Box::new(move |leaf, resolver| {
            let resolved = resolver.resolve::<F>(&leaf.converter)?;
            let step = compile::leaf_step(leaf, resolved.routine, Arc::clone(&access), Some);
            Ok((step, resolved.description))
        });
        self.push_leaf(field, column.into(), true, type_name::<F>(), factory)
    }

    /// Binds a field whose type is itself a shape, mapped from the same row.
    pub fn nested<N, A>(&mut self, field: &'static str, access: A) -> &mut CompositeBinding<T>
    where
        N: Mappable,
        A: Fn(&mut T) -> &mut N + Send + Sync + 'static,
    {
        let access = Arc::new(access);
        let factory: CompositeFactory<T> = Box::new(move |ctx| {
            let nested = ctx.nested::<N>()?;
            let trace = nested.trace().to_string();
            Ok((compile::composite_step(field, nested, Arc::clone(&access)), trace))
        });
        let idx = self.composites.len();
        self.composites.push(CompositeBinding {
            field,
            nested: ShapeId::of::<N>(),
            factory,
        });
        &mut self.composites[idx]
    }

    fn push_leaf(
        &mut self,
        field: &'static str,
        column: String,
        nullable: bool,
        target: &'static str,
        factory: LeafFactory<T>,
    ) -> &mut LeafBinding<T> {
        let idx = self.leaves.len();
        self.leaves.push(LeafBinding {
            field,
            column,
            nullable,
            converter: ConverterRequest::Direct,
            target,
            factory,
        });
        &mut self.leaves[idx]
    }
}

/// The scanned bindings of one target type, in declaration order.
pub struct Shape<T> {
    id: ShapeId,
    leaves: Vec<LeafBinding<T>>,
    composites: Vec<CompositeBinding<T>>,
}

impl<T> Shape<T> {
    pub fn id(&self) -> ShapeId {
        self.id
    }

    pub fn leaves(&self) -> &[LeafBinding<T>] {
        &self.leaves
    }

    pub fn composites(&self) -> &[CompositeBinding<T>] {
        &self.composites
    }
}

impl<T> fmt::Debug for Shape<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("id", &self.id)
            .field("leaves", &self.leaves)
            .field("composites", &self.composites)
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BindingKind {
    Column,
    Nested,
}

/// Reads the declarations of `T` and validates them.
pub fn scan<T: Mappable>() -> Result<Shape<T>, MapError> {
    let id = ShapeId::of::<T>();
    let mut fields = Fields::<T>::new();
    T::declare(&mut fields);

    let invalid = |reason: String| MapError::InvalidShape {
        shape: id.name(),
        reason,
    };

    let mut seen: HashMap<&'static str, BindingKind> = HashMap::new();
    let declared = fields
        .leaves
        .iter()
        .map(|leaf| (leaf.field, BindingKind::Column))
        .chain(
            fields
                .composites
                .iter()
                .map(|composite| (composite.field, BindingKind::Nested)),
        );
    for (field, kind) in declared {
        if field.trim().is_empty() {
            return Err(invalid("a binding has a blank field name".to_string()));
        }
        if let Some(previous) = seen.insert(field, kind) {
            let reason = if previous == kind {
                format!("field '{field}' is declared more than once")
            } else {
                format!("field '{field}' is bound both to a column and to a nested shape")
            };
            return Err(invalid(reason));
        }
    }
    if let Some(leaf) = fields.leaves.iter().find(|leaf| leaf.column.trim().is_empty()) {
        return Err(invalid(format!(
            "field '{}' is bound to a blank column name",
            leaf.field
        )));
    }

    debug!(
        "Scanned shape '{}': {} column binding(s), {} nested binding(s)",
        id,
        fields.leaves.len(),
        fields.composites.len()
    );
    Ok(Shape {
        id,
        leaves: fields.leaves,
        composites: fields.composites,
    })
}
