//! Conversion routines and their resolution.
//!
//! A [`Converter`] turns one raw [`Value`] into a typed field value. Converters
//! are registered in two tables:
//!
//! - [`ConverterTable`]: keyed by target type. The built-in defaults cover
//!   text to date/time, integer, float, decimal, GUID, flag text to `bool`
//!   and delimited text to `Vec<String>`. A caller-supplied table replaces the
//!   defaults entirely.
//! - [`NamedConverters`]: keyed by an explicit identifier, consulted first for
//!   bindings that request one.
//!
//! Bindings without a converter request use a fixed direct-extraction table
//! that only accepts a cell already holding the field's native variant.
//!
//! [`ConversionResolver::resolve`] picks the routine for a field type once, at
//! compile time, and hands back a typed closure so that row mapping never
//! downcasts.

use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::Arc,
};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::value::{
    DEFAULT_DATE_FORMATS, DEFAULT_DATETIME_FORMATS, Value, parse_guid, parse_naive_date_with,
    parse_naive_datetime_with,
};

pub type ConvertFn<F> = Arc<dyn Fn(&Value) -> Result<F, ConvertError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ConvertError(String);

impl ConvertError {
    pub fn new(message: impl Into<String>) -> Self {
        ConvertError(message.into())
    }

    pub fn unexpected(expected: &str, value: &Value) -> Self {
        ConvertError(format!(
            "expected {expected}, found {} '{value}'",
            value.kind()
        ))
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// How a leaf binding asks for its conversion routine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum ConverterRequest {
    /// The cell must already hold the field's native variant.
    #[default]
    Direct,
    ByType,
    ById(String),
}

impl fmt::Display for ConverterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConverterRequest::Direct => write!(f, "direct"),
            ConverterRequest::ByType => write!(f, "by type"),
            ConverterRequest::ById(id) => write!(f, "by id '{id}'"),
        }
    }
}

/// A type-erased conversion routine for one target type.
#[derive(Clone)]
pub struct Converter {
    target: TypeId,
    target_name: &'static str,
    routine: Arc<dyn Any + Send + Sync>,
}

impl Converter {
    pub fn new<F, C>(routine: C) -> Self
    where
        F: 'static,
        C: Fn(&Value) -> Result<F, ConvertError> + Send + Sync + 'static,
    {
        let routine: ConvertFn<F> = Arc::new(routine);
        Self {
            target: TypeId::of::<F>(),
            target_name: type_name::<F>(),
            routine: Arc::new(routine),
        }
    }

    pub fn target(&self) -> TypeId {
        self.target
    }

    pub fn target_name(&self) -> String {
        short_type_name(self.target_name)
    }

    fn typed<F: 'static>(&self) -> Option<ConvertFn<F>> {
        self.routine.downcast_ref::<ConvertFn<F>>().cloned()
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("target", &self.target_name())
            .finish()
    }
}

/// Type-keyed conversion routines.
#[derive(Debug, Clone, Default)]
pub struct ConverterTable {
    by_type: HashMap<TypeId, Converter>,
}

impl ConverterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defaults() -> Self {
        Self::from_settings(&ConversionSettings::default())
    }

    pub fn from_settings(settings: &ConversionSettings) -> Self {
        let settings = Arc::new(settings.clone());
        let mut table = Self::new();

        let s = Arc::clone(&settings);
        table.insert(Converter::new(move |v| text_to_datetime(v, &s)));
        let s = Arc::clone(&settings);
        table.insert(Converter::new(move |v| text_to_date(v, &s)));
        let s = Arc::clone(&settings);
        table.insert(Converter::new(move |v| text_to_i64(v, &s)));
        let s = Arc::clone(&settings);
        table.insert(Converter::new(move |v| {
            let wide = text_to_i64(v, &s)?;
            i32::try_from(wide)
                .map_err(|_| ConvertError::new(format!("{wide} is out of range for i32")))
        }));
        let s = Arc::clone(&settings);
        table.insert(Converter::new(move |v| text_to_f64(v, &s)));
        let s = Arc::clone(&settings);
        table.insert(Converter::new(move |v| text_to_decimal(v, &s)));
        let s = Arc::clone(&settings);
        table.insert(Converter::new(move |v| flag_to_bool(v, &s)));
        let s = Arc::clone(&settings);
        table.insert(Converter::new(move |v| delimited_to_list(v, &s)));
        let s = Arc::clone(&settings);
        table.insert(Converter::new(move |v| text_to_guid(v, &s)));
        table.insert(Converter::new(|v: &Value| Ok(v.as_display())));
        table
    }

    /// Registers `converter`, returning the one it replaced for the same type.
    pub fn insert(&mut self, converter: Converter) -> Option<Converter> {
        self.by_type.insert(converter.target, converter)
    }

    pub fn with(mut self, converter: Converter) -> Self {
        self.insert(converter);
        self
    }

    pub fn contains<F: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<F>())
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    fn get<F: 'static>(&self) -> Option<ConvertFn<F>> {
        self.by_type.get(&TypeId::of::<F>())?.typed::<F>()
    }

    /// Exact-variant extraction used by bindings without a converter request.
    fn direct() -> Self {
        Self::new()
            .with(Converter::new(|v: &Value| match v {
                Value::String(s) => Ok(s.clone()),
                other => Err(ConvertError::unexpected("string", other)),
            }))
            .with(Converter::new(|v: &Value| match v {
                Value::Integer(i) => Ok(*i),
                other => Err(ConvertError::unexpected("integer", other)),
            }))
            .with(Converter::new(|v: &Value| match v {
                Value::Integer(i) => i32::try_from(*i)
                    .map_err(|_| ConvertError::new(format!("{i} is out of range for i32"))),
                other => Err(ConvertError::unexpected("integer", other)),
            }))
            .with(Converter::new(|v: &Value| match v {
                Value::Float(f) => Ok(*f),
                Value::Integer(i) => Ok(*i as f64),
                other => Err(ConvertError::unexpected("float", other)),
            }))
            .with(Converter::new(|v: &Value| match v {
                Value::Boolean(b) => Ok(*b),
                other => Err(ConvertError::unexpected("boolean", other)),
            }))
            .with(Converter::new(|v: &Value| match v {
                Value::Date(d) => Ok(*d),
                other => Err(ConvertError::unexpected("date", other)),
            }))
            .with(Converter::new(|v: &Value| match v {
                Value::DateTime(dt) => Ok(*dt),
                other => Err(ConvertError::unexpected("datetime", other)),
            }))
            .with(Converter::new(|v: &Value| match v {
                Value::Decimal(d) => Ok(*d),
                other => Err(ConvertError::unexpected("decimal", other)),
            }))
            .with(Converter::new(|v: &Value| match v {
                Value::Guid(g) => Ok(*g),
                other => Err(ConvertError::unexpected("guid", other)),
            }))
    }
}

/// Identifier-keyed conversion routines.
#[derive(Debug, Clone, Default)]
pub struct NamedConverters {
    by_id: HashMap<String, Converter>,
}

impl NamedConverters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, converter: Converter) -> Option<Converter> {
        self.by_id.insert(id.into(), converter)
    }

    pub fn with(mut self, id: impl Into<String>, converter: Converter) -> Self {
        self.insert(id, converter);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Converter> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Options for the built-in type-keyed converters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConversionSettings {
    pub date_formats: Vec<String>,
    pub datetime_formats: Vec<String>,
    pub true_tokens: Vec<String>,
    pub false_tokens: Vec<String>,
    pub list_delimiter: char,
    /// Trim surrounding whitespace from text cells before parsing.
    pub trim: bool,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|s| s.to_string()).collect(),
            datetime_formats: DEFAULT_DATETIME_FORMATS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            true_tokens: ["true", "t", "yes", "y", "1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            false_tokens: ["false", "f", "no", "n", "0"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            list_delimiter: ',',
            trim: true,
        }
    }
}

impl ConversionSettings {
    fn text<'a>(&self, value: &'a str) -> &'a str {
        if self.trim { value.trim() } else { value }
    }
}

/// A routine picked for one field, with the label recorded in the trace.
pub struct Resolved<F> {
    pub routine: ConvertFn<F>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsupported {
    pub target: String,
    pub detail: String,
}

/// Resolves converter requests against the configured tables.
#[derive(Debug, Clone)]
pub struct ConversionResolver {
    types: ConverterTable,
    named: Option<NamedConverters>,
    direct: ConverterTable,
}

impl Default for ConversionResolver {
    fn default() -> Self {
        Self::new(ConverterTable::defaults(), None)
    }
}

impl ConversionResolver {
    pub fn new(types: ConverterTable, named: Option<NamedConverters>) -> Self {
        Self {
            types,
            named,
            direct: ConverterTable::direct(),
        }
    }

    pub fn resolve<F: 'static>(&self, request: &ConverterRequest) -> Result<Resolved<F>, Unsupported> {
        let target = short_type_name(type_name::<F>());
        match request {
            ConverterRequest::Direct => self
                .direct
                .get::<F>()
                .map(|routine| Resolved {
                    routine,
                    description: format!("direct {target}"),
                })
                .ok_or_else(|| Unsupported {
                    target: target.clone(),
                    detail: "no direct cast; request a converter".to_string(),
                }),
            ConverterRequest::ById(id) => {
                if let Some(converter) = self.named.as_ref().and_then(|named| named.get(id)) {
                    return converter
                        .typed::<F>()
                        .map(|routine| Resolved {
                            routine,
                            description: format!("named '{id}'"),
                        })
                        .ok_or_else(|| Unsupported {
                            target: target.clone(),
                            detail: format!(
                                "converter '{id}' produces {}",
                                converter.target_name()
                            ),
                        });
                }
                self.by_type::<F>(&target)
                    .map_err(|_| Unsupported {
                        target: target.clone(),
                        detail: format!("no converter '{id}' and none registered for the type"),
                    })
            }
            ConverterRequest::ByType => self.by_type::<F>(&target),
        }
    }

    fn by_type<F: 'static>(&self, target: &str) -> Result<Resolved<F>, Unsupported> {
        self.types
            .get::<F>()
            .map(|routine| Resolved {
                routine,
                description: format!("by-type {target}"),
            })
            .ok_or_else(|| Unsupported {
                target: target.to_string(),
                detail: "no converter registered for the type".to_string(),
            })
    }
}

/// Strips module paths from a `type_name`, keeping generic structure:
/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
pub fn short_type_name(name: &str) -> String {
    let mut output = String::with_capacity(name.len());
    let mut segment = String::new();
    for ch in name.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == ':' {
            segment.push(ch);
        } else {
            output.push_str(segment.rsplit("::").next().unwrap_or_default());
            segment.clear();
            output.push(ch);
        }
    }
    output.push_str(segment.rsplit("::").next().unwrap_or_default());
    output
}

fn text_to_datetime(value: &Value, settings: &ConversionSettings) -> Result<NaiveDateTime, ConvertError> {
    match value {
        Value::DateTime(dt) => Ok(*dt),
        Value::Date(d) => d
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| ConvertError::new(format!("'{d}' has no midnight"))),
        Value::String(s) => {
            let text = settings.text(s);
            parse_naive_datetime_with(text, &settings.datetime_formats)
                .or_else(|| {
                    parse_naive_date_with(text, &settings.date_formats)
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .ok_or_else(|| ConvertError::new(format!("'{s}' is not a recognised datetime")))
        }
        other => Err(ConvertError::unexpected("datetime text", other)),
    }
}

fn text_to_date(value: &Value, settings: &ConversionSettings) -> Result<NaiveDate, ConvertError> {
    match value {
        Value::Date(d) => Ok(*d),
        Value::DateTime(dt) => Ok(dt.date()),
        Value::String(s) => {
            let text = settings.text(s);
            parse_naive_date_with(text, &settings.date_formats)
                .or_else(|| {
                    parse_naive_datetime_with(text, &settings.datetime_formats).map(|dt| dt.date())
                })
                .ok_or_else(|| ConvertError::new(format!("'{s}' is not a recognised date")))
        }
        other => Err(ConvertError::unexpected("date text", other)),
    }
}

fn text_to_i64(value: &Value, settings: &ConversionSettings) -> Result<i64, ConvertError> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Float(f) if f.fract() == 0.0 => f
            .to_i64()
            .ok_or_else(|| ConvertError::new(format!("{f} is out of range for i64"))),
        Value::String(s) => settings
            .text(s)
            .parse::<i64>()
            .map_err(|err| ConvertError::new(format!("'{s}' is not an integer: {err}"))),
        other => Err(ConvertError::unexpected("integer text", other)),
    }
}

fn text_to_f64(value: &Value, settings: &ConversionSettings) -> Result<f64, ConvertError> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Integer(i) => Ok(*i as f64),
        Value::Decimal(d) => d
            .to_f64()
            .ok_or_else(|| ConvertError::new(format!("{d} does not fit in f64"))),
        Value::String(s) => settings
            .text(s)
            .parse::<f64>()
            .map_err(|err| ConvertError::new(format!("'{s}' is not a float: {err}"))),
        other => Err(ConvertError::unexpected("float text", other)),
    }
}

fn text_to_decimal(value: &Value, settings: &ConversionSettings) -> Result<Decimal, ConvertError> {
    match value {
        Value::Decimal(d) => Ok(*d),
        Value::Integer(i) => Ok(Decimal::from(*i)),
        Value::Float(f) => {
            Decimal::from_f64(*f).ok_or_else(|| ConvertError::new(format!("{f} does not fit in a decimal")))
        }
        Value::String(s) => {
            let text = settings.text(s);
            Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .map_err(|err| ConvertError::new(format!("'{s}' is not a decimal: {err}")))
        }
        other => Err(ConvertError::unexpected("decimal text", other)),
    }
}

fn flag_to_bool(value: &Value, settings: &ConversionSettings) -> Result<bool, ConvertError> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Integer(0) => Ok(false),
        Value::Integer(1) => Ok(true),
        Value::String(s) => {
            let text = settings.text(s);
            if settings.true_tokens.iter().any(|t| t.eq_ignore_ascii_case(text)) {
                Ok(true)
            } else if settings.false_tokens.iter().any(|t| t.eq_ignore_ascii_case(text)) {
                Ok(false)
            } else {
                Err(ConvertError::new(format!("'{s}' is not a recognised flag")))
            }
        }
        other => Err(ConvertError::unexpected("flag text", other)),
    }
}

fn delimited_to_list(value: &Value, settings: &ConversionSettings) -> Result<Vec<String>, ConvertError> {
    match value {
        Value::String(s) => Ok(s
            .split(settings.list_delimiter)
            .map(|item| settings.text(item))
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()),
        other => Err(ConvertError::unexpected("delimited text", other)),
    }
}

fn text_to_guid(value: &Value, _settings: &ConversionSettings) -> Result<Uuid, ConvertError> {
    match value {
        Value::Guid(g) => Ok(*g),
        Value::String(s) => {
            parse_guid(s).ok_or_else(|| ConvertError::new(format!("'{s}' is not a GUID")))
        }
        other => Err(ConvertError::unexpected("GUID text", other)),
    }
}
