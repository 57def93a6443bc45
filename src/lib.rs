//! A restricted, non-Turing-complete template language: interpolation,
//! conditionals, and fixed iteration over a data scope, with HTML
//! escaping on by default and no way for template content to execute
//! code.
//!
//! Template syntax never causes an error. A malformed token renders as
//! its own literal source text, so a broken template degrades on the
//! page instead of taking the host application down with it.
//!
//! ```rust
//! use std::collections::HashMap;
//!
//! let mut data = HashMap::new();
//! data.insert("name", "<World>");
//!
//! let out = stencil::render_template("Hello, {{ name }}!", &data).unwrap();
//! assert_eq!(out, "Hello, &lt;World&gt;!");
//! ```
//!
//! The grammar in brief:
//!
//! - `{{ key }}` interpolates a dot-path, HTML-escaped; `{{= key }}`
//!   skips escaping. Fallbacks chain with `||` (replace when empty)
//!   and `??` (replace when null/absent); filters pipe with
//!   `| name(args)`.
//! - `{% if test %} ... {% elseif test %} ... {% else %} ... {% endif %}`
//!   branches on a boolean/comparison expression.
//! - `{% each list as item, index %} ... {% endeach %}` iterates lists
//!   and records.
//! - `{# ... #}` is a comment. `-`/`~` markers next to any delimiter
//!   trim surrounding whitespace.
//!
//! Custom filters register on an [`Engine`]:
//!
//! ```rust
//! use std::collections::HashMap;
//! use stencil::{Data, Engine};
//!
//! let mut engine = Engine::new();
//! engine.register_filter("first_word", |value, _args| {
//!     let s = value.to_string();
//!     Data::String(s.split_whitespace().next().unwrap_or("").to_string())
//! }).unwrap();
//!
//! let mut data = HashMap::new();
//! data.insert("title", "Pride and Prejudice");
//! let out = engine.render("{{ title | first_word | upper }}", &data).unwrap();
//! assert_eq!(out, "PRIDE");
//! ```

#[macro_use]
mod macros;

pub mod builder;
pub mod encoder;

mod data;
mod engine;
mod error;
mod expr;
mod filters;
mod parser;
mod scope;
mod template;

pub use crate::builder::{MapBuilder, VecBuilder};
pub use crate::data::Data;
pub use crate::encoder::{to_data, Encoder};
pub use crate::engine::Engine;
pub use crate::error::Error;
pub use crate::filters::{DateFormatter, FilterFn};
pub use crate::template::{escape_html, Template};

pub type Result<T> = std::result::Result<T, Error>;

/// Compiles a template from a string. Never fails: malformed syntax
/// becomes literal text in the compiled template.
pub fn compile_str(source: &str) -> Template {
    Template::new(parser::parse(source))
}

/// Parse and render against a default engine in one step.
pub fn render_template<T: serde::Serialize>(source: &str, data: &T) -> Result<String> {
    Engine::new().render(source, data)
}
