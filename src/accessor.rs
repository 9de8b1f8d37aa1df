//! Field accessors and side channels
//!
//! Bindings reach into records through closures. The typed closures are
//! wrapped in small adapters ([`ScalarField`], [`ArrayField`], [`MapField`])
//! that run the converter for the element type, so processors only see the
//! object-safe traits [`ScalarAccess`], [`ArrayAccess`] and [`MapAccess`].
//!
//! Positions, labels and comments observed while mapping are reported
//! through [`SideChannels`]: into the record's own [`FieldMetadata`] when it
//! keeps one, otherwise to the binding's explicit callbacks, otherwise
//! nowhere.

use crate::address::CellAddress;
use crate::converter::{CellConvert, ConvertContext, ConvertError, FieldOptions};
use crate::mapping::Record;
use crate::workbook::Sheet;
use serde::Serialize;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Positions, labels and comments keyed by field path.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldMetadata {
    pub positions: BTreeMap<String, CellAddress>,
    pub labels: BTreeMap<String, String>,
    pub comments: BTreeMap<String, String>,
}

impl FieldMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self, key: &str) -> Option<CellAddress> {
        self.positions.get(key).copied()
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn comment(&self, key: &str) -> Option<&str> {
        self.comments.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.labels.is_empty() && self.comments.is_empty()
    }
}

/// `items[3]`
pub fn indexed(name: &str, index: usize) -> String {
    format!("{}[{}]", name, index)
}

/// `attendance[May]`
pub fn keyed(name: &str, key: &str) -> String {
    format!("{}[{}]", name, key)
}

/// `rows[2].price`
pub fn nested(parent: &str, child: &str) -> String {
    format!("{}.{}", parent, child)
}

type PositionSetter<R> = Box<dyn Fn(&mut R, &str, CellAddress) + Send + Sync>;
type TextSetter<R> = Box<dyn Fn(&mut R, &str, &str) + Send + Sync>;
type TextGetter<R> = Box<dyn Fn(&R, &str) -> Option<String> + Send + Sync>;

/// Explicit side-channel callbacks of one binding. The `&str` argument is
/// the key inside the record (`name`, `items[3]`).
pub struct SideChannels<R> {
    position: Option<PositionSetter<R>>,
    label: Option<TextSetter<R>>,
    comment: Option<TextSetter<R>>,
    comment_source: Option<TextGetter<R>>,
}

impl<R> Default for SideChannels<R> {
    fn default() -> Self {
        Self {
            position: None,
            label: None,
            comment: None,
            comment_source: None,
        }
    }
}

impl<R: Record> SideChannels<R> {
    pub fn on_position(&mut self, setter: impl Fn(&mut R, &str, CellAddress) + Send + Sync + 'static) {
        self.position = Some(Box::new(setter));
    }

    pub fn on_label(&mut self, setter: impl Fn(&mut R, &str, &str) + Send + Sync + 'static) {
        self.label = Some(Box::new(setter));
    }

    pub fn on_comment(&mut self, setter: impl Fn(&mut R, &str, &str) + Send + Sync + 'static) {
        self.comment = Some(Box::new(setter));
    }

    pub fn comment_source(&mut self, getter: impl Fn(&R, &str) -> Option<String> + Send + Sync + 'static) {
        self.comment_source = Some(Box::new(getter));
    }

    pub fn set_position(&self, record: &mut R, key: &str, address: CellAddress) {
        if let Some(metadata) = record.metadata_mut() {
            metadata.positions.insert(key.to_string(), address);
        } else if let Some(setter) = &self.position {
            setter(record, key, address);
        }
    }

    pub fn set_label(&self, record: &mut R, key: &str, label: &str) {
        if let Some(metadata) = record.metadata_mut() {
            metadata.labels.insert(key.to_string(), label.to_string());
        } else if let Some(setter) = &self.label {
            setter(record, key, label);
        }
    }

    pub fn set_comment(&self, record: &mut R, key: &str, comment: &str) {
        if let Some(metadata) = record.metadata_mut() {
            metadata.comments.insert(key.to_string(), comment.to_string());
        } else if let Some(setter) = &self.comment {
            setter(record, key, comment);
        }
    }

    /// Comment to write next to the value on save.
    pub fn comment(&self, record: &R, key: &str) -> Option<String> {
        match record.metadata() {
            Some(metadata) => metadata.comment(key).map(String::from),
            None => self.comment_source.as_ref().and_then(|getter| getter(record, key)),
        }
    }
}

/// One value of a record bound to one cell.
pub trait ScalarAccess<R>: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn load(
        &self,
        record: &mut R,
        sheet: &Sheet,
        address: CellAddress,
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Result<(), ConvertError>;

    fn save(
        &self,
        record: &R,
        sheet: &mut Sheet,
        address: CellAddress,
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Result<(), ConvertError>;

    /// Display text of the current value, for merging equal neighbours.
    fn text(&self, record: &R, options: &FieldOptions, cx: ConvertContext<'_>) -> Option<String>;
}

pub struct ScalarField<R, T, G, S> {
    get: G,
    set: S,
    _marker: PhantomData<fn(&mut R) -> T>,
}

impl<R, T, G, S> ScalarField<R, T, G, S>
where
    T: CellConvert,
    G: Fn(&R) -> Option<T> + Send + Sync,
    S: Fn(&mut R, Option<T>) + Send + Sync,
{
    pub fn new(get: G, set: S) -> Self {
        Self {
            get,
            set,
            _marker: PhantomData,
        }
    }
}

impl<R, T, G, S> ScalarAccess<R> for ScalarField<R, T, G, S>
where
    T: CellConvert,
    G: Fn(&R) -> Option<T> + Send + Sync,
    S: Fn(&mut R, Option<T>) + Send + Sync,
{
    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn load(
        &self,
        record: &mut R,
        sheet: &Sheet,
        address: CellAddress,
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Result<(), ConvertError> {
        let value = cx.registry.load::<T>(sheet, address, options, cx.config)?;
        (self.set)(record, value);
        Ok(())
    }

    fn save(
        &self,
        record: &R,
        sheet: &mut Sheet,
        address: CellAddress,
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Result<(), ConvertError> {
        let value = (self.get)(record);
        cx.registry
            .save::<T>(sheet, address, value.as_ref(), options, cx.config)
    }

    fn text(&self, record: &R, options: &FieldOptions, cx: ConvertContext<'_>) -> Option<String> {
        (self.get)(record).map(|v| v.format_text(options, cx.config))
    }
}

/// A list of values bound to a run of cells.
pub trait ArrayAccess<R>: Send + Sync {
    fn type_name(&self) -> &'static str;

    /// Load one element per address. Failed elements are left empty and
    /// returned with their index.
    fn load(
        &self,
        record: &mut R,
        sheet: &Sheet,
        addresses: &[CellAddress],
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Vec<(usize, ConvertError)>;

    /// Write the elements into `addresses`. Addresses past the last element
    /// receive the field formula, if there is one, and are otherwise left
    /// alone.
    fn save(
        &self,
        record: &R,
        sheet: &mut Sheet,
        addresses: &[CellAddress],
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Result<(), (usize, ConvertError)>;

    /// Display text of every element; its length is the element count.
    fn texts(&self, record: &R, options: &FieldOptions, cx: ConvertContext<'_>) -> Vec<Option<String>>;
}

pub struct ArrayField<R, T, G, S> {
    get: G,
    set: S,
    _marker: PhantomData<fn(&mut R) -> T>,
}

impl<R, T, G, S> ArrayField<R, T, G, S>
where
    T: CellConvert,
    G: Fn(&R) -> Vec<Option<T>> + Send + Sync,
    S: Fn(&mut R, Vec<Option<T>>) + Send + Sync,
{
    pub fn new(get: G, set: S) -> Self {
        Self {
            get,
            set,
            _marker: PhantomData,
        }
    }
}

impl<R, T, G, S> ArrayAccess<R> for ArrayField<R, T, G, S>
where
    T: CellConvert,
    G: Fn(&R) -> Vec<Option<T>> + Send + Sync,
    S: Fn(&mut R, Vec<Option<T>>) + Send + Sync,
{
    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn load(
        &self,
        record: &mut R,
        sheet: &Sheet,
        addresses: &[CellAddress],
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Vec<(usize, ConvertError)> {
        let mut failures = Vec::new();
        let mut values = Vec::with_capacity(addresses.len());
        for (index, address) in addresses.iter().enumerate() {
            match cx.registry.load::<T>(sheet, *address, options, cx.config) {
                Ok(value) => values.push(value),
                Err(error) => {
                    values.push(None);
                    failures.push((index, error));
                }
            }
        }
        (self.set)(record, values);
        failures
    }

    fn save(
        &self,
        record: &R,
        sheet: &mut Sheet,
        addresses: &[CellAddress],
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Result<(), (usize, ConvertError)> {
        let values = (self.get)(record);
        for (index, address) in addresses.iter().enumerate() {
            if index >= values.len() && options.formula.is_none() {
                break;
            }
            let value = values.get(index).and_then(|v| v.as_ref());
            cx.registry
                .save::<T>(sheet, *address, value, options, cx.config)
                .map_err(|e| (index, e))?;
        }
        Ok(())
    }

    fn texts(&self, record: &R, options: &FieldOptions, cx: ConvertContext<'_>) -> Vec<Option<String>> {
        (self.get)(record)
            .iter()
            .map(|v| v.as_ref().map(|v| v.format_text(options, cx.config)))
            .collect()
    }
}

/// Values keyed by header label.
pub trait MapAccess<R>: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn load(
        &self,
        record: &mut R,
        sheet: &Sheet,
        entries: &[(String, CellAddress)],
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Vec<(String, ConvertError)>;

    /// Write the value of every entry; keys missing from the map are blanked.
    fn save(
        &self,
        record: &R,
        sheet: &mut Sheet,
        entries: &[(String, CellAddress)],
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Result<(), (String, ConvertError)>;
}

pub struct MapField<R, T, G, S> {
    get: G,
    set: S,
    _marker: PhantomData<fn(&mut R) -> T>,
}

impl<R, T, G, S> MapField<R, T, G, S>
where
    T: CellConvert,
    G: Fn(&R) -> BTreeMap<String, Option<T>> + Send + Sync,
    S: Fn(&mut R, BTreeMap<String, Option<T>>) + Send + Sync,
{
    pub fn new(get: G, set: S) -> Self {
        Self {
            get,
            set,
            _marker: PhantomData,
        }
    }
}

impl<R, T, G, S> MapAccess<R> for MapField<R, T, G, S>
where
    T: CellConvert,
    G: Fn(&R) -> BTreeMap<String, Option<T>> + Send + Sync,
    S: Fn(&mut R, BTreeMap<String, Option<T>>) + Send + Sync,
{
    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn load(
        &self,
        record: &mut R,
        sheet: &Sheet,
        entries: &[(String, CellAddress)],
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Vec<(String, ConvertError)> {
        let mut failures = Vec::new();
        let mut values = BTreeMap::new();
        for (key, address) in entries {
            match cx.registry.load::<T>(sheet, *address, options, cx.config) {
                Ok(value) => {
                    values.insert(key.clone(), value);
                }
                Err(error) => {
                    values.insert(key.clone(), None);
                    failures.push((key.clone(), error));
                }
            }
        }
        (self.set)(record, values);
        failures
    }

    fn save(
        &self,
        record: &R,
        sheet: &mut Sheet,
        entries: &[(String, CellAddress)],
        options: &FieldOptions,
        cx: ConvertContext<'_>,
    ) -> Result<(), (String, ConvertError)> {
        let values = (self.get)(record);
        for (key, address) in entries {
            let value = values.get(key).and_then(|v| v.as_ref());
            cx.registry
                .save::<T>(sheet, *address, value, options, cx.config)
                .map_err(|e| (key.clone(), e))?;
        }
        Ok(())
    }
}
