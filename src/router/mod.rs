//! # Router Module
//!
//! Registration surface turning typed route descriptions into compiled,
//! immutable dispatch units.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Parsing path templates into ordered segment lists
//! - Running the two-phase plugin protocol for every registration
//! - Binding handler argument slots to path placeholders and query
//!   descriptors
//! - Compiling routes and wrapping handlers with plugin call injection
//! - Emitting documentation entries into the configured sink
//!
//! ## Registration flow
//!
//! 1. The path template (e.g. `/item/{id:int}`) is parsed into literal and
//!    typed placeholder segments, and a providers table sized to the
//!    handler arity starts with every slot unclaimed.
//! 2. Each registered plugin is consulted via `is_used`; used plugins may
//!    claim argument slots and extend the path/query shape through a
//!    [`RouteModifier`](crate::plugin::RouteModifier) before automatic
//!    binding runs.
//! 3. Automatic binding walks the (possibly extended) placeholders left to
//!    right, then declared queries in declaration order, claiming the next
//!    unclaimed slot each. A placeholder with no free slot — or a slot
//!    nothing binds — fails the registration.
//! 4. The route is compiled under the display name `"<METHOD> <path>"`,
//!    whose hash plus version is the wire identity. Identity collisions
//!    are rejected at registration rather than silently aliasing.
//!
//! Registration errors are startup-fatal misconfigurations, never
//! per-request errors. The route table is built once before the dispatcher
//! is constructed and is read-only afterwards.

mod core;

pub use core::{BoundQuery, RegistrationError, Route, RouteDesc, Router, TypedSegment};
