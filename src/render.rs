//! JSON text rendering for [`Value`]
//!
//! Output is always valid JSON: strings are escaped per RFC 8259, floats use
//! the shortest representation that parses back to the same double, and the
//! only values JSON cannot express (NaN and the infinities, which the encoder
//! never produces) are written as `null`.

use std::fmt;

use crate::options::CodecOptions;
use crate::value::{Map, Value};

/// Render compact JSON
pub fn render(v: &Value) -> String {
    render_with(v, &CodecOptions::default())
}

/// Render with explicit options (`pretty`, `escape_unicode`)
pub fn render_with(v: &Value, opts: &CodecOptions) -> String {
    let mut buf = String::new();
    write_value(&mut buf, v, opts, 0);
    buf
}

/// Render indented JSON
pub fn render_pretty(v: &Value) -> String {
    render_with(v, &CodecOptions::pretty())
}

impl Value {
    /// Compact JSON text
    pub fn to_json_string(&self) -> String {
        render(self)
    }

    pub fn to_json_string_with(&self, opts: &CodecOptions) -> String {
        render_with(self, opts)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self))
    }
}

pub(crate) fn write_value(buf: &mut String, v: &Value, opts: &CodecOptions, level: usize) {
    match v {
        Value::Null => buf.push_str("null"),
        Value::Bool(b) => buf.push_str(if *b { "true" } else { "false" }),
        Value::Int(n) => buf.push_str(&n.to_string()),
        Value::Float(f) => write_float(buf, *f),
        Value::String(s) => write_string(buf, s, opts.escape_unicode),
        Value::Array(items) => write_array(buf, items, opts, level),
        Value::Object(map) => write_map(buf, map, opts, level),
    }
}

pub(crate) fn write_float(buf: &mut String, f: f64) {
    if !f.is_finite() {
        buf.push_str("null");
        return;
    }

    // Negative zero has no integer spelling
    let f = if f == 0.0 { 0.0 } else { f };
    let abs = f.abs();

    if f.fract() == 0.0 && abs < 1e15 {
        buf.push_str(&(f as i64).to_string());
    } else if abs >= 1e15 || abs < 1e-5 {
        buf.push_str(&format!("{f:e}"));
    } else {
        buf.push_str(&f.to_string());
    }
}

pub(crate) fn write_string(buf: &mut String, s: &str, escape_unicode: bool) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            '\u{08}' => buf.push_str("\\b"),
            '\u{0c}' => buf.push_str("\\f"),
            c if (c as u32) < 0x20 => push_unicode_escape(buf, c as u16),
            c if escape_unicode && !c.is_ascii() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    push_unicode_escape(buf, *unit);
                }
            }
            c => buf.push(c),
        }
    }
    buf.push('"');
}

fn push_unicode_escape(buf: &mut String, unit: u16) {
    buf.push_str(&format!("\\u{unit:04x}"));
}

fn write_array(buf: &mut String, items: &[Value], opts: &CodecOptions, level: usize) {
    if items.is_empty() {
        buf.push_str("[]");
        return;
    }

    buf.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        newline_indent(buf, opts, level + 1);
        write_value(buf, item, opts, level + 1);
    }
    newline_indent(buf, opts, level);
    buf.push(']');
}

pub(crate) fn write_map(buf: &mut String, map: &Map, opts: &CodecOptions, level: usize) {
    if map.is_empty() {
        buf.push_str("{}");
        return;
    }

    buf.push('{');
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        newline_indent(buf, opts, level + 1);
        write_string(buf, key, opts.escape_unicode);
        buf.push_str(if opts.pretty { ": " } else { ":" });
        write_value(buf, value, opts, level + 1);
    }
    newline_indent(buf, opts, level);
    buf.push('}');
}

fn newline_indent(buf: &mut String, opts: &CodecOptions, level: usize) {
    if opts.pretty {
        buf.push('\n');
        for _ in 0..level {
            buf.push_str("  ");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;
    use pretty_assertions::assert_eq;

    fn float(f: f64) -> String {
        render(&Value::Float(f))
    }

    #[test]
    fn test_render_scalars() {
        assert_eq!(render(&Value::Null), "null");
        assert_eq!(render(&Value::Bool(true)), "true");
        assert_eq!(render(&Value::Int(-42)), "-42");
        assert_eq!(render(&Value::string("hi")), "\"hi\"");
    }

    #[test]
    fn test_render_floats() {
        assert_eq!(float(3.0), "3");
        assert_eq!(float(-0.0), "0");
        assert_eq!(float(3.14), "3.14");
        assert_eq!(float(1e20), "1e20");
        assert_eq!(float(1.5e-7), "1.5e-7");
        assert_eq!(float(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(float(f64::NAN), "null");
        assert_eq!(float(f64::NEG_INFINITY), "null");
    }

    #[test]
    fn test_render_escapes() {
        let s = Value::string("a\"b\\c\n\t\u{1}\u{8}\u{c}/");
        assert_eq!(render(&s), r#""a\"b\\c\n\t\u0001\b\f/""#);
    }

    #[test]
    fn test_render_unicode_raw_and_escaped() {
        let s = Value::string("测试😀");
        assert_eq!(render(&s), "\"测试😀\"");

        let opts = CodecOptions::default().with_escape_unicode(true);
        assert_eq!(render_with(&s, &opts), r#""\u6d4b\u8bd5\ud83d\ude00""#);
    }

    #[test]
    fn test_render_preserves_insertion_order() {
        let mut map = Map::new();
        map.insert("z", 1);
        map.insert("a", Value::array(vec![Value::Null, Value::Bool(false)]));
        assert_eq!(render(&Value::Object(map)), r#"{"z":1,"a":[null,false]}"#);
    }

    #[test]
    fn test_render_pretty() {
        let mut inner = Map::new();
        inner.insert("k", "v");
        let mut map = Map::new();
        map.insert("list", Value::array(vec![Value::Int(1), Value::Int(2)]));
        map.insert("empty", Value::array(vec![]));
        map.insert("obj", inner);

        let expected = "{\n  \"list\": [\n    1,\n    2\n  ],\n  \"empty\": [],\n  \"obj\": {\n    \"k\": \"v\"\n  }\n}";
        assert_eq!(render_pretty(&Value::Object(map)), expected);
    }

    #[test]
    fn test_render_is_valid_json() {
        let mut map = Map::new();
        map.insert("text", "line\u{2028}\u{1f}end");
        map.insert("n", Value::Float(-1.25e300));
        map.insert("nested", Value::array(vec![Value::object(Map::new())]));
        let text = render(&Value::Object(map));

        let oracle: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(oracle["text"], "line\u{2028}\u{1f}end");
        assert_eq!(oracle["n"].as_f64(), Some(-1.25e300));
    }
}
