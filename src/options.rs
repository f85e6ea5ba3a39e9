//! Codec configuration

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default parser recursion guard
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 512;

/// Options recognized by the encoder, parser, renderer and binder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodecOptions {
    /// Emit `null` for absent optional fields instead of omitting them
    pub include_nulls: bool,
    /// Reject object keys that match no field of the target record
    pub strict_field_matching: bool,
    /// Maximum array/object nesting accepted by the parser
    pub max_nesting_depth: usize,
    /// strftime pattern for timestamps; RFC 3339 when unset
    pub date_format: Option<String>,
    /// Round floats to this many decimal places when encoding
    pub numeric_precision: Option<u32>,
    /// Write every non-ASCII character as a `\uXXXX` escape
    pub escape_unicode: bool,
    /// Indent rendered output with two spaces per level
    pub pretty: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            include_nulls: false,
            strict_field_matching: false,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            date_format: None,
            numeric_precision: None,
            escape_unicode: false,
            pretty: false,
        }
    }
}

impl CodecOptions {
    /// Reject unknown fields and keep nulls, for exact schema round-trips
    pub fn strict() -> Self {
        Self {
            include_nulls: true,
            strict_field_matching: true,
            ..Self::default()
        }
    }

    /// Indented output
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            ..Self::default()
        }
    }

    pub fn with_include_nulls(mut self, include_nulls: bool) -> Self {
        self.include_nulls = include_nulls;
        self
    }

    pub fn with_strict_field_matching(mut self, strict: bool) -> Self {
        self.strict_field_matching = strict;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = Some(format.into());
        self
    }

    pub fn with_numeric_precision(mut self, digits: u32) -> Self {
        self.numeric_precision = Some(digits);
        self
    }

    pub fn with_escape_unicode(mut self, escape: bool) -> Self {
        self.escape_unicode = escape;
        self
    }

    /// Load options from a JSON document; missing keys keep their defaults
    pub fn from_json_str(text: &str) -> Result<Self> {
        let options: CodecOptions = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject settings the codec cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.max_nesting_depth == 0 {
            return Err(Error::Config("maxNestingDepth must be at least 1".into()));
        }
        if let Some(digits) = self.numeric_precision {
            // 10^digits must stay finite and exact enough to be useful
            if digits > 17 {
                return Err(Error::Config(format!(
                    "numericPrecision {digits} exceeds the 17 significant digits of a double"
                )));
            }
        }
        if let Some(format) = &self.date_format {
            use chrono::format::{Item, StrftimeItems};
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(Error::Config(format!("invalid dateFormat {format:?}")));
            }
        }
        Ok(())
    }
}
