//! One-call entry points: encode + render, parse + bind

use crate::decode::{Binder, Decode};
use crate::encode::{Encode, Encoder};
use crate::error::{BindingError, EncodingError, ParseError, Result};
use crate::options::CodecOptions;
use crate::value::Value;
use crate::{parser, render};

/// A configured codec. The free functions of this crate use
/// `Codec::default()`.
#[derive(Debug, Clone, Default)]
pub struct Codec {
    options: CodecOptions,
}

impl Codec {
    /// Build a codec, rejecting options it cannot honor (see
    /// [`CodecOptions::validate`])
    pub fn new(options: CodecOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &CodecOptions {
        &self.options
    }

    /// Encode to the intermediate value
    pub fn to_value<T: Encode + ?Sized>(&self, value: &T) -> std::result::Result<Value, EncodingError> {
        Encoder::new(&self.options).encode(value)
    }

    /// Bind the intermediate value to `T`
    pub fn from_value<T: Decode>(&self, value: &Value) -> std::result::Result<T, BindingError> {
        Binder::new(&self.options).bind(value)
    }

    pub fn parse(&self, text: &str) -> std::result::Result<Value, ParseError> {
        parser::parse_with(text, &self.options)
    }

    pub fn render(&self, value: &Value) -> String {
        render::render_with(value, &self.options)
    }

    pub fn to_json_text<T: Encode + ?Sized>(&self, value: &T) -> Result<String> {
        let encoded = self.to_value(value)?;
        Ok(self.render(&encoded))
    }

    pub fn from_json_text<T: Decode>(&self, text: &str) -> Result<T> {
        let parsed = self.parse(text)?;
        Ok(self.from_value(&parsed)?)
    }

    pub fn from_slice<T: Decode>(&self, bytes: &[u8]) -> Result<T> {
        let parsed = parser::parse_slice(bytes, &self.options)?;
        Ok(self.from_value(&parsed)?)
    }
}

/// Encode and render compact JSON
pub fn to_json_text<T: Encode + ?Sized>(value: &T) -> Result<String> {
    Codec::default().to_json_text(value)
}

/// Encode and render indented JSON
pub fn to_json_text_pretty<T: Encode + ?Sized>(value: &T) -> Result<String> {
    let codec = Codec {
        options: CodecOptions::pretty(),
    };
    codec.to_json_text(value)
}

/// Parse JSON text and bind it to `T`
pub fn from_json_text<T: Decode>(text: &str) -> Result<T> {
    Codec::default().from_json_text(text)
}

/// Parse UTF-8 bytes and bind them to `T`
pub fn from_slice<T: Decode>(bytes: &[u8]) -> Result<T> {
    Codec::default().from_slice(bytes)
}

pub fn to_value<T: Encode + ?Sized>(value: &T) -> std::result::Result<Value, EncodingError> {
    Codec::default().to_value(value)
}

pub fn from_value<T: Decode>(value: &Value) -> std::result::Result<T, BindingError> {
    Codec::default().from_value(value)
}
