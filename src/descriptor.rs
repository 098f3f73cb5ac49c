//! # Descriptor Module
//!
//! Immutable value objects describing the shape of a route: path segments,
//! query parameters, opaque route properties, and the identity hash used to
//! resolve routes on the wire.
//!
//! All descriptor types are plain data. They are assembled at registration
//! time, frozen into a compiled [`Route`](crate::router::Route), and read
//! concurrently without synchronization for the lifetime of the process.

use serde::Serialize;
use serde_json::Value;

/// Multiplier folding the route version into the identity hash.
///
/// Odd constant so that distinct versions of the same name land on distinct
/// identities for all realistic version ranges.
pub const VERSION_MULTIPLIER: u32 = 0x9E37_79B9;

/// Hash a route or parameter name (32-bit FNV-1a).
///
/// The same function is used for route identity at registration time and at
/// lookup time, and for precomputed query parameter hashes.
#[must_use]
pub fn route_hash(name: &str) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for b in name.as_bytes() {
        h ^= u32::from(*b);
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

/// Compute the wire identity of a `(name, version)` pair.
///
/// Identity is `hash(name) + version * VERSION_MULTIPLIER` with wrapping
/// arithmetic. The result is not collision-free by construction; the router
/// rejects colliding registrations instead of silently aliasing.
#[must_use]
pub fn route_identity(name: &str, version: u32) -> u32 {
    route_hash(name).wrapping_add(version.wrapping_mul(VERSION_MULTIPLIER))
}

/// The closed set of wire-typed parameter and result types.
///
/// Every handler argument, query parameter, and result value carries one of
/// these tags. The binary codec is total for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Int,
    Long,
    Float,
    Double,
    Str,
    /// A structured value carried as a textual literal and decoded through
    /// the streaming tokenizer.
    Json,
}

impl ParamType {
    /// Resolve a type name used inside a `{name:type}` path placeholder.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(ParamType::Bool),
            "int" => Some(ParamType::Int),
            "long" => Some(ParamType::Long),
            "float" => Some(ParamType::Float),
            "double" => Some(ParamType::Double),
            "str" | "string" => Some(ParamType::Str),
            "json" => Some(ParamType::Json),
            _ => None,
        }
    }

    /// The lowercase wire name, as written in path templates.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Bool => "bool",
            ParamType::Int => "int",
            ParamType::Long => "long",
            ParamType::Float => "float",
            ParamType::Double => "double",
            ParamType::Str => "str",
            ParamType::Json => "json",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One segment of a route path: literal text or a typed placeholder.
///
/// Placeholders are written `{name:type}` in path templates; a bare
/// `{name}` defaults to [`ParamType::Str`]. Segment positions are fixed
/// once the route is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Literal(String),
    Param { name: String, ty: ParamType },
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Literal(text) => write!(f, "{}", text),
            PathSegment::Param { name, ty } => write!(f, "{{{}:{}}}", name, ty),
        }
    }
}

/// A declared query parameter.
///
/// A present `default` makes the parameter optional: when its presence bit
/// is unset on the wire, the default value is used instead. A parameter
/// without a default is required and its absence fails the whole request.
#[derive(Debug, Clone)]
pub struct QueryParam {
    pub name: String,
    /// Precomputed name hash for wire-side matching.
    pub hash: u32,
    pub ty: ParamType,
    pub default: Option<Value>,
    pub description: String,
}

impl QueryParam {
    /// Declare a required query parameter.
    #[must_use]
    pub fn required(name: &str, ty: ParamType, description: &str) -> Self {
        QueryParam {
            name: name.to_string(),
            hash: route_hash(name),
            ty,
            default: None,
            description: description.to_string(),
        }
    }

    /// Declare an optional query parameter with a default value.
    #[must_use]
    pub fn optional(name: &str, ty: ParamType, default: Value, description: &str) -> Self {
        QueryParam {
            name: name.to_string(),
            hash: route_hash(name),
            ty,
            default: Some(default),
            description: description.to_string(),
        }
    }

    /// Whether the parameter may be omitted from the wire frame.
    #[inline]
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }
}

/// Opaque route metadata consulted by plugins at registration time.
///
/// The router never interprets property values; they exist so a plugin can
/// decide whether it applies to a route (e.g. "requires peer address").
#[derive(Debug, Clone, Serialize)]
pub struct RouteProperty {
    pub name: String,
    pub value: Value,
}

impl RouteProperty {
    #[must_use]
    pub fn new(name: &str, value: Value) -> Self {
        RouteProperty {
            name: name.to_string(),
            value,
        }
    }
}

/// The supported dispatch methods.
///
/// Part of a route's display name (`"GET /item/{id:int}"`) and therefore of
/// its wire identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
