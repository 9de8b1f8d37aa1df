//! Enumerations matched by variant name or by an alias

use super::{TextFormatter, TextParseError};
use std::marker::PhantomData;

/// A closed set of values stored as text.
///
/// ```
/// use royalbit_sheetmap::formatter::XlsEnum;
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Role { Admin, Member }
///
/// impl XlsEnum for Role {
///     fn variants() -> &'static [Self] { &[Role::Admin, Role::Member] }
///     fn name(&self) -> &'static str {
///         match self { Role::Admin => "Admin", Role::Member => "Member" }
///     }
///     fn alias(&self) -> Option<&'static str> {
///         Some(match self { Role::Admin => "管理者", Role::Member => "一般" })
///     }
/// }
/// ```
pub trait XlsEnum: Copy + PartialEq + Send + Sync + 'static {
    fn variants() -> &'static [Self];

    fn name(&self) -> &'static str;

    /// Alternate text, used instead of the name when a field asks for it.
    fn alias(&self) -> Option<&'static str> {
        None
    }

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("enum")
    }
}

#[derive(Debug, Clone)]
pub struct EnumFormatter<E> {
    ignore_case: bool,
    use_alias: bool,
    _marker: PhantomData<fn() -> E>,
}

impl<E: XlsEnum> Default for EnumFormatter<E> {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl<E: XlsEnum> EnumFormatter<E> {
    pub fn new(ignore_case: bool, use_alias: bool) -> Self {
        Self {
            ignore_case,
            use_alias,
            _marker: PhantomData,
        }
    }

    fn text_of(&self, value: &E) -> &'static str {
        if self.use_alias {
            value.alias().unwrap_or_else(|| value.name())
        } else {
            value.name()
        }
    }
}

impl<E: XlsEnum> TextFormatter<E> for EnumFormatter<E> {
    fn parse(&self, text: &str) -> Result<E, TextParseError> {
        let trimmed = text.trim();
        E::variants()
            .iter()
            .find(|variant| {
                let candidate = self.text_of(variant);
                if self.ignore_case {
                    candidate.to_lowercase() == trimmed.to_lowercase()
                } else {
                    candidate == trimmed
                }
            })
            .copied()
            .ok_or_else(|| {
                let valid: Vec<&str> = E::variants().iter().map(|v| self.text_of(v)).collect();
                TextParseError::new(text, E::type_name())
                    .with_detail(format!("expected one of [{}]", valid.join(", ")))
            })
    }

    fn format(&self, value: &E) -> String {
        self.text_of(value).to_string()
    }
}
