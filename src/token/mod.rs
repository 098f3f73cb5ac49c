//! # Token Module
//!
//! Streaming, pull-based value tokenizer used to decode textual literals.
//!
//! ## Overview
//!
//! The tokenizer is a single-pass cursor over a byte sequence. Each call to
//! [`Tokenizer::parse`] produces exactly one token and at most one payload
//! (boolean, number, or string), valid only until the next call. No tree is
//! materialized — consumers drive the cursor and build whatever structure
//! they need, as the binary value codec does for `json`-typed values.
//!
//! ## Grammar
//!
//! - Structural brackets `[` `]` `{` `}` emit their tokens directly.
//! - `"` starts a string; the 8 single-character escapes and `\uXXXX` are
//!   decoded inline. A string followed by `:` is reclassified as a field
//!   name with the separator consumed.
//! - A digit or leading `+`/`-` starts a manual float scan with optional
//!   fraction and exponent.
//! - `t`/`f`/`n` must spell `true`/`false`/`null` exactly.
//! - A comma after a value is consumed by lookahead.
//!
//! ## Failure policy
//!
//! No recovery: any structural violation aborts the parse with a
//! descriptive [`TokenError`]. The caller must discard the cursor.

mod core;

pub use core::{TokenError, TokenKind, Tokenizer};
