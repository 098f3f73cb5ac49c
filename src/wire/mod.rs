//! # Wire Module
//!
//! Binary framing primitives and the typed value codec.
//!
//! ## Overview
//!
//! The wire layer has two halves:
//!
//! - [`varint`] — LEB128 variable-length integers used for route
//!   identities, presence bitmasks, string lengths, and zigzag-encoded
//!   signed integers.
//! - [`ValueCodec`] — the seam for reading and writing one typed value at
//!   a time. The dispatcher only ever talks to this trait; [`BinaryCodec`]
//!   is the in-tree implementation, which routes `json`-typed values
//!   through the streaming tokenizer.
//!
//! ## Frame layout
//!
//! Request: `varint routeIdentity | <typed path value>* | varlong
//! presenceBitmask | <typed query value>*` — query values present only for
//! set bits, in declaration order.
//!
//! Response: `byte statusCode | <typed result value>` on success, or
//! `byte statusCode | string message` on any error.

mod codec;
pub mod varint;

pub use codec::{BinaryCodec, CodecError, ValueCodec};
