//! `mnemos-markup` – the Markup Protocol Codec.
//!
//! Records travel to and from a text generator as tagged markup:
//!
//! ```text
//! <output>
//!   <answer>Paris</answer>
//!   <tags>
//!     <item>geography</item>
//!   </tags>
//! </output>
//! ```
//!
//! # Modules
//!
//! - [`escape`] – the fixed `& < >` escape set.
//! - [`encode`] – [`encode`][encode::encode] renders a record,
//!   [`describe`][encode::describe] renders a schema description block for
//!   the generator prompt.
//! - [`tree`] – single-pass lexer, lenient element tree builder and
//!   nesting-aware pair matcher over the restricted tag grammar.
//! - [`decode`] – [`decode`][decode::decode]: wrapper location, think splice,
//!   typed walk with scalar coercion, final validation.

pub mod decode;
pub mod encode;
pub mod escape;
pub mod tree;

/// The fixed tag delimiting the structured block in generated text.
pub const WRAPPER_TAG: &str = "output";

pub use decode::{decode, decode_loose};
pub use encode::{describe, encode, encode_as};
pub use escape::{escape, unescape};
