//! json-bind - object <-> JSON codec
//!
//! Converts structured Rust values to JSON text and back through an
//! intermediate [`Value`] tree. Record types describe their fields once
//! (see [`record!`]); the descriptors are cached per type for the life of
//! the process and drive both encoding and binding.
//!
//! # Example
//!
//! ```rust
//! use json_bind::{from_json_text, record, to_json_text};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct User {
//!     id: i32,
//!     name: String,
//!     age: i32,
//! }
//!
//! record!(User { id, name, age });
//!
//! let user = User { id: 1, name: "测试用户".into(), age: 30 };
//! let text = to_json_text(&user).unwrap();
//! assert_eq!(text, r#"{"id":1,"name":"测试用户","age":30}"#);
//!
//! let parsed: User = from_json_text(&text).unwrap();
//! assert_eq!(parsed, user);
//! ```
//!
//! Schema-less documents are built directly on [`Map`]:
//!
//! ```rust
//! use json_bind::Map;
//!
//! let mut object = Map::new();
//! object.insert("key", "value");
//! assert_eq!(object.to_json_string(), r#"{"key":"value"}"#);
//! ```

mod bytes;
mod canonical;
mod codec;
mod decode;
mod descriptor;
mod encode;
mod error;
mod json_bridge;
mod options;
mod parser;
mod path;
mod render;
mod value;

pub use bytes::*;
pub use canonical::*;
pub use codec::*;
pub use decode::*;
pub use descriptor::*;
pub use encode::*;
pub use error::*;
pub use json_bridge::*;
pub use options::*;
pub use parser::{parse, parse_slice, parse_with, Parser};
pub use path::*;
pub use render::{render, render_pretty, render_with};
pub use value::*;

#[cfg(test)]
mod tests;
