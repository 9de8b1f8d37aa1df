//! Cell converters
//!
//! A converter moves one value between a cell and a typed field. Loading
//! reads the cell's formatted text, applies the field's default and trim
//! options, takes the raw cell value when the target accepts it natively
//! ([`coerce`]) and otherwise parses the text with the target's formatter.
//! Saving writes a formula, a blank, or the native cell value plus number
//! format.
//!
//! [`ConverterRegistry`] resolves a converter per target type; types without
//! an override use [`DefaultCellConverter`].

pub mod coerce;
pub mod formula;

pub use coerce::{Coercion, Native, TargetKind};

use crate::address::CellAddress;
use crate::config::MapperConfig;
use crate::formatter::{
    BooleanFormatter, DateFormatter, DatePattern, EnumFormatter, NumberFormatter, Numeric,
    StringFormatter, Temporal, TextFormatter, TextParseError, XlsEnum,
};
use crate::workbook::{CellValue, Sheet};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Formula written instead of (or in the absence of) a value.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaOption {
    pub template: String,
    /// Write the formula even when the field has a value.
    pub primary: bool,
}

/// Per-field boolean literals. Empty lists fall back to the mapper config.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanOptions {
    pub load_for_true: Vec<String>,
    pub load_for_false: Vec<String>,
    /// Text written for `true`; a native boolean cell when unset.
    pub save_as_true: Option<String>,
    pub save_as_false: Option<String>,
    pub ignore_case: bool,
    pub fail_to_false: bool,
}

impl Default for BooleanOptions {
    fn default() -> Self {
        Self {
            load_for_true: Vec::new(),
            load_for_false: Vec::new(),
            save_as_true: None,
            save_as_false: None,
            ignore_case: true,
            fail_to_false: false,
        }
    }
}

/// Conversion options attached to a field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOptions {
    /// Text used when the cell is blank (load) or the value is absent (save).
    pub default_value: Option<String>,
    pub trim: bool,
    pub formula: Option<FormulaOption>,
    /// Text pattern: a decimal pattern for numbers, a date pattern for dates.
    pub pattern: Option<String>,
    /// Excel number format applied on save.
    pub excel_pattern: Option<String>,
    pub boolean: Option<BooleanOptions>,
    pub enum_ignore_case: bool,
    pub enum_alias: bool,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn with_formula(mut self, template: impl Into<String>) -> Self {
        self.formula = Some(FormulaOption {
            template: template.into(),
            primary: false,
        });
        self
    }

    pub fn with_primary_formula(mut self, template: impl Into<String>) -> Self {
        self.formula = Some(FormulaOption {
            template: template.into(),
            primary: true,
        });
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_excel_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.excel_pattern = Some(pattern.into());
        self
    }

    pub fn with_boolean(mut self, options: BooleanOptions) -> Self {
        self.boolean = Some(options);
        self
    }

    pub fn with_enum_ignore_case(mut self) -> Self {
        self.enum_ignore_case = true;
        self
    }

    pub fn with_enum_alias(mut self) -> Self {
        self.enum_alias = true;
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    #[error("cannot convert '{observed_text}' to {type_name}: {message}")]
    TypeMismatch {
        type_name: String,
        observed_text: String,
        message: String,
    },

    #[error("{0}")]
    Formula(String),
}

impl From<TextParseError> for ConvertError {
    fn from(error: TextParseError) -> Self {
        ConvertError::TypeMismatch {
            message: error.to_string(),
            type_name: error.type_name,
            observed_text: error.text,
        }
    }
}

/// A type that can be bound to a single cell.
pub trait CellConvert: Sized + Clone + Send + Sync + 'static {
    fn type_name() -> &'static str;

    fn target_kind() -> TargetKind;

    /// Take a natively coerced cell value; `None` falls back to text parsing.
    fn from_native(_native: &Native) -> Option<Self> {
        None
    }

    fn parse_text(
        text: &str,
        options: &FieldOptions,
        config: &MapperConfig,
    ) -> Result<Self, TextParseError>;

    fn format_text(&self, options: &FieldOptions, config: &MapperConfig) -> String;

    fn to_cell_value(&self, options: &FieldOptions, config: &MapperConfig) -> CellValue;

    /// Number format written when neither the field nor the template cell
    /// has one.
    fn default_number_format(_options: &FieldOptions) -> Option<String> {
        None
    }
}

impl CellConvert for String {
    fn type_name() -> &'static str {
        "String"
    }

    fn target_kind() -> TargetKind {
        TargetKind::Text
    }

    fn parse_text(text: &str, _: &FieldOptions, _: &MapperConfig) -> Result<Self, TextParseError> {
        StringFormatter.parse(text)
    }

    fn format_text(&self, _: &FieldOptions, _: &MapperConfig) -> String {
        StringFormatter.format(self)
    }

    fn to_cell_value(&self, options: &FieldOptions, config: &MapperConfig) -> CellValue {
        CellValue::Text(self.format_text(options, config))
    }
}

fn boolean_formatter(options: &FieldOptions, config: &MapperConfig) -> BooleanFormatter {
    let defaults = BooleanOptions::default();
    let boolean = options.boolean.as_ref().unwrap_or(&defaults);
    let pick = |own: &Vec<String>, global: &Vec<String>| {
        if own.is_empty() {
            global.clone()
        } else {
            own.clone()
        }
    };
    BooleanFormatter::new(
        pick(&boolean.load_for_true, &config.boolean_true_literals),
        pick(&boolean.load_for_false, &config.boolean_false_literals),
    )
    .with_ignore_case(boolean.ignore_case)
    .with_fail_to_false(boolean.fail_to_false)
}

impl CellConvert for bool {
    fn type_name() -> &'static str {
        "bool"
    }

    fn target_kind() -> TargetKind {
        TargetKind::Boolean
    }

    fn from_native(native: &Native) -> Option<Self> {
        match native {
            Native::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn parse_text(
        text: &str,
        options: &FieldOptions,
        config: &MapperConfig,
    ) -> Result<Self, TextParseError> {
        boolean_formatter(options, config).parse(text)
    }

    fn format_text(&self, options: &FieldOptions, config: &MapperConfig) -> String {
        boolean_formatter(options, config).format(self)
    }

    fn to_cell_value(&self, options: &FieldOptions, _: &MapperConfig) -> CellValue {
        let literal = options.boolean.as_ref().and_then(|b| {
            if *self {
                b.save_as_true.clone()
            } else {
                b.save_as_false.clone()
            }
        });
        match literal {
            Some(text) => CellValue::Text(text),
            None => CellValue::Bool(*self),
        }
    }
}

fn number_formatter<N: Numeric>(
    options: &FieldOptions,
    text: &str,
) -> Result<NumberFormatter<N>, TextParseError> {
    match &options.pattern {
        Some(pattern) => NumberFormatter::with_pattern(pattern)
            .map_err(|e| TextParseError::new(text, N::TYPE_NAME).with_detail(e)),
        None => Ok(NumberFormatter::new()),
    }
}

macro_rules! numeric_convert {
    ($($t:ty),*) => {
        $(
            impl CellConvert for $t {
                fn type_name() -> &'static str {
                    <$t as Numeric>::TYPE_NAME
                }

                fn target_kind() -> TargetKind {
                    if <$t as Numeric>::INTEGRAL {
                        TargetKind::Integer
                    } else {
                        TargetKind::Float
                    }
                }

                fn from_native(native: &Native) -> Option<Self> {
                    match native {
                        Native::Number(n) => <$t as Numeric>::from_f64(*n),
                        _ => None,
                    }
                }

                fn parse_text(
                    text: &str,
                    options: &FieldOptions,
                    _: &MapperConfig,
                ) -> Result<Self, TextParseError> {
                    number_formatter::<$t>(options, text)?.parse(text)
                }

                fn format_text(&self, options: &FieldOptions, _: &MapperConfig) -> String {
                    number_formatter::<$t>(options, "")
                        .unwrap_or_default()
                        .format(self)
                }

                fn to_cell_value(&self, _: &FieldOptions, _: &MapperConfig) -> CellValue {
                    CellValue::Number(Numeric::to_f64(*self))
                }

                fn default_number_format(options: &FieldOptions) -> Option<String> {
                    options.pattern.clone()
                }
            }
        )*
    };
}

numeric_convert!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize, f32, f64);

fn date_formatter<D: Temporal>(
    options: &FieldOptions,
    text: &str,
) -> Result<DateFormatter<D>, TextParseError> {
    match &options.pattern {
        Some(pattern) => DateFormatter::with_pattern(pattern)
            .map_err(|e| TextParseError::new(text, D::TYPE_NAME).with_detail(e)),
        None => Ok(DateFormatter::new()),
    }
}

macro_rules! temporal_convert {
    ($($t:ty),*) => {
        $(
            impl CellConvert for $t {
                fn type_name() -> &'static str {
                    <$t as Temporal>::TYPE_NAME
                }

                fn target_kind() -> TargetKind {
                    TargetKind::Temporal
                }

                fn from_native(native: &Native) -> Option<Self> {
                    match native {
                        Native::DateTime(dt) => Some(<$t as Temporal>::from_datetime(*dt)),
                        _ => None,
                    }
                }

                fn parse_text(
                    text: &str,
                    options: &FieldOptions,
                    _: &MapperConfig,
                ) -> Result<Self, TextParseError> {
                    date_formatter::<$t>(options, text)?.parse(text)
                }

                fn format_text(&self, options: &FieldOptions, _: &MapperConfig) -> String {
                    date_formatter::<$t>(options, "")
                        .unwrap_or_default()
                        .format(self)
                }

                fn to_cell_value(&self, _: &FieldOptions, _: &MapperConfig) -> CellValue {
                    CellValue::DateTime(Temporal::to_datetime(*self))
                }

                fn default_number_format(options: &FieldOptions) -> Option<String> {
                    let pattern = options
                        .pattern
                        .as_deref()
                        .unwrap_or(<$t as Temporal>::DEFAULT_PATTERN);
                    DatePattern::parse(pattern)
                        .ok()
                        .map(|p| p.excel_format().to_string())
                }
            }
        )*
    };
}

temporal_convert!(NaiveDate, NaiveDateTime, NaiveTime, DateTime<Utc>);

impl<E: XlsEnum> CellConvert for E {
    fn type_name() -> &'static str {
        <E as XlsEnum>::type_name()
    }

    fn target_kind() -> TargetKind {
        TargetKind::Enum
    }

    fn parse_text(text: &str, options: &FieldOptions, _: &MapperConfig) -> Result<Self, TextParseError> {
        EnumFormatter::<E>::new(options.enum_ignore_case, options.enum_alias).parse(text)
    }

    fn format_text(&self, options: &FieldOptions, _: &MapperConfig) -> String {
        EnumFormatter::<E>::new(options.enum_ignore_case, options.enum_alias).format(self)
    }

    fn to_cell_value(&self, options: &FieldOptions, config: &MapperConfig) -> CellValue {
        CellValue::Text(self.format_text(options, config))
    }
}

/// Moves values of `T` between cells and fields.
pub trait CellConverter<T>: Send + Sync {
    /// Read the cell at `address`; `Ok(None)` for a blank cell without default.
    fn load(
        &self,
        sheet: &Sheet,
        address: CellAddress,
        options: &FieldOptions,
        config: &MapperConfig,
    ) -> Result<Option<T>, ConvertError>;

    fn save(
        &self,
        sheet: &mut Sheet,
        address: CellAddress,
        value: Option<&T>,
        options: &FieldOptions,
        config: &MapperConfig,
    ) -> Result<(), ConvertError>;
}

/// The converter used for every [`CellConvert`] type without an override.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCellConverter;

impl<T: CellConvert> CellConverter<T> for DefaultCellConverter {
    fn load(
        &self,
        sheet: &Sheet,
        address: CellAddress,
        options: &FieldOptions,
        config: &MapperConfig,
    ) -> Result<Option<T>, ConvertError> {
        let text = sheet.formatted_text(address);
        let text = if options.trim {
            text.trim().to_string()
        } else {
            text
        };
        let blank = match T::target_kind() {
            TargetKind::Text => text.is_empty(),
            _ => text.trim().is_empty(),
        };

        if blank {
            if let Some(default) = &options.default_value {
                let default = if options.trim { default.trim() } else { default };
                return Ok(Some(T::parse_text(default, options, config)?));
            }
            if T::target_kind() == TargetKind::Text && options.trim {
                return Ok(Some(T::parse_text("", options, config)?));
            }
            return Ok(None);
        }

        if let Coercion::Native(native) =
            coerce::coerce(T::target_kind(), sheet.value(address), sheet.date1904())
        {
            if let Some(value) = T::from_native(&native) {
                return Ok(Some(value));
            }
        }
        Ok(Some(T::parse_text(&text, options, config)?))
    }

    fn save(
        &self,
        sheet: &mut Sheet,
        address: CellAddress,
        value: Option<&T>,
        options: &FieldOptions,
        config: &MapperConfig,
    ) -> Result<(), ConvertError> {
        if let Some(formula) = &options.formula {
            if formula.primary || value.is_none() {
                let expanded =
                    formula::expand(&formula.template, address).map_err(ConvertError::Formula)?;
                sheet.set_formula(address, &expanded);
                apply_number_format::<T>(sheet, address, options);
                return Ok(());
            }
        }

        let value = match (value, &options.default_value) {
            (Some(value), _) => Some(value.clone()),
            (None, Some(default)) => Some(T::parse_text(default, options, config)?),
            (None, None) => None,
        };
        match value {
            Some(value) => {
                sheet.set_value(address, value.to_cell_value(options, config));
                apply_number_format::<T>(sheet, address, options);
            }
            None => sheet.clear(address),
        }
        Ok(())
    }
}

fn apply_number_format<T: CellConvert>(sheet: &mut Sheet, address: CellAddress, options: &FieldOptions) {
    if let Some(format) = &options.excel_pattern {
        sheet.set_number_format(address, Some(format));
    } else if sheet.cell(address).style.number_format.is_none() {
        if let Some(format) = T::default_number_format(options) {
            sheet.set_number_format(address, Some(&format));
        }
    }
}

/// What a converter call needs besides the cell and the value.
#[derive(Debug, Clone, Copy)]
pub struct ConvertContext<'a> {
    pub registry: &'a ConverterRegistry,
    pub config: &'a MapperConfig,
}

/// Converter lookup by target type.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    overrides: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("overrides", &self.overrides.len())
            .finish()
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the converter used for `T`.
    pub fn register<T: 'static>(&mut self, converter: impl CellConverter<T> + 'static) {
        let converter: Arc<dyn CellConverter<T>> = Arc::new(converter);
        self.overrides.insert(TypeId::of::<T>(), Arc::new(converter));
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.overrides.contains_key(&TypeId::of::<T>())
    }

    fn lookup<T: 'static>(&self) -> Option<Arc<dyn CellConverter<T>>> {
        self.overrides
            .get(&TypeId::of::<T>())?
            .downcast_ref::<Arc<dyn CellConverter<T>>>()
            .cloned()
    }

    pub fn load<T: CellConvert>(
        &self,
        sheet: &Sheet,
        address: CellAddress,
        options: &FieldOptions,
        config: &MapperConfig,
    ) -> Result<Option<T>, ConvertError> {
        match self.lookup::<T>() {
            Some(converter) => converter.load(sheet, address, options, config),
            None => DefaultCellConverter.load(sheet, address, options, config),
        }
    }

    pub fn save<T: CellConvert>(
        &self,
        sheet: &mut Sheet,
        address: CellAddress,
        value: Option<&T>,
        options: &FieldOptions,
        config: &MapperConfig,
    ) -> Result<(), ConvertError> {
        match self.lookup::<T>() {
            Some(converter) => converter.save(sheet, address, value, options, config),
            None => DefaultCellConverter.save(sheet, address, value, options, config),
        }
    }
}
