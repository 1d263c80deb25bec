//! Data-driven dialect descriptors.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{standard_type_name, Dialect, Feature, PlaceholderStyle};
use crate::types::ColumnType;

/// A dialect described entirely by data, loadable from JSON.
///
/// ```rust
/// use schemix_core::dialect::{CustomDialect, Dialect, Feature};
/// use schemix_core::ColumnType;
///
/// let dialect: CustomDialect = serde_json::from_str(r#"{
///     "name": "mssql",
///     "quotes": ["[", "]"],
///     "placeholder": "named_colon",
///     "types": { "text": "NVARCHAR(MAX)", "varchar": "NVARCHAR({length})", "json": null },
///     "features": ["right_join", "full_outer_join"]
/// }"#).unwrap();
///
/// assert_eq!(dialect.quote_identifier("users"), "[users]");
/// assert_eq!(dialect.placeholder(2), ":p2");
/// assert_eq!(dialect.type_name(ColumnType::Varchar(50)).unwrap(), "NVARCHAR(50)");
/// assert!(dialect.type_name(ColumnType::Json).is_none());
/// assert!(dialect.supports(Feature::FullOuterJoin));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomDialect {
    /// Name used in error messages.
    pub name: String,
    /// Opening and closing identifier quotes.
    #[serde(default = "default_quotes")]
    pub quotes: (char, char),
    /// Placeholder style.
    #[serde(default)]
    pub placeholder: PlaceholderStyle,
    /// Native type names keyed by bare type name (`varchar`, `jsonb`, ...).
    ///
    /// `{length}`, `{precision}` and `{scale}` are substituted; `null`
    /// marks the type as unsupported. Missing entries use the standard
    /// spelling.
    #[serde(default)]
    pub types: BTreeMap<String, Option<String>>,
    /// Supported optional features.
    #[serde(default)]
    pub features: BTreeSet<Feature>,
    /// Keyword appended to autoincrementing primary keys.
    #[serde(default)]
    pub autoincrement: Option<String>,
    /// Render boolean defaults as `1`/`0`.
    #[serde(default)]
    pub integer_booleans: bool,
}

const fn default_quotes() -> (char, char) {
    ('"', '"')
}

impl CustomDialect {
    /// Creates an ANSI-like descriptor with no optional features.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quotes: default_quotes(),
            placeholder: PlaceholderStyle::default(),
            types: BTreeMap::new(),
            features: BTreeSet::new(),
            autoincrement: None,
            integer_booleans: false,
        }
    }

    /// Adds a supported feature.
    #[must_use]
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.insert(feature);
        self
    }

    /// Sets the placeholder style.
    #[must_use]
    pub fn with_placeholder(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder = style;
        self
    }
}

fn fill_template(template: &str, ty: ColumnType) -> Option<String> {
    let mut out = template.to_string();
    match ty {
        ColumnType::Char(n) | ColumnType::Varchar(n) => {
            out = out.replace("{length}", &n.to_string());
        }
        ColumnType::Numeric { precision, scale } => {
            if let Some(p) = precision {
                out = out.replace("{precision}", &p.to_string());
            }
            if let Some(s) = scale {
                out = out.replace("{scale}", &s.to_string());
            }
        }
        _ => {}
    }
    // Unresolved parameters fall back to the standard spelling
    (!out.contains('{')).then_some(out)
}

impl Dialect for CustomDialect {
    fn name(&self) -> &str {
        &self.name
    }

    fn identifier_quotes(&self) -> (char, char) {
        self.quotes
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        self.placeholder
    }

    fn type_name(&self, ty: ColumnType) -> Option<String> {
        match self.types.get(ty.kind()) {
            Some(None) => None,
            Some(Some(template)) => {
                Some(fill_template(template, ty).unwrap_or_else(|| standard_type_name(ty)))
            }
            None => Some(standard_type_name(ty)),
        }
    }

    fn supports(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    fn autoincrement_keyword(&self) -> Option<&str> {
        self.autoincrement.as_deref()
    }

    fn boolean_literal(&self, value: bool) -> &'static str {
        match (self.integer_booleans, value) {
            (true, true) => "1",
            (true, false) => "0",
            (false, true) => "TRUE",
            (false, false) => "FALSE",
        }
    }
}
