use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{error, info};

use crate::descriptor::{
    route_identity, Method, ParamType, PathSegment, QueryParam, RouteProperty,
};
use crate::dispatcher::HandlerBody;
use crate::docs::{DocParam, DocSink, NullDocSink, RouteDoc};
use crate::limits::DispatchLimits;
use crate::plugin::{BoundPlugin, Plugin, RouteModifier};

/// Registration-time failures.
///
/// All of these are fatal misconfigurations surfaced at startup — none of
/// them can occur per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A `{...}` placeholder with an empty name or a malformed body.
    InvalidPlaceholder { route: String, segment: String },
    /// A placeholder naming a type outside the wire type set.
    UnknownParamType { route: String, ty: String },
    /// A path placeholder or query with no unclaimed handler argument left
    /// to bind — the handler declares fewer parameters than the route
    /// shape needs.
    UnboundParameter { route: String, name: String },
    /// A handler argument that nothing binds: not claimed by a plugin and
    /// left over after path and query binding.
    UnusedArgument { route: String, index: usize },
    /// A parameter bound to an argument slot of a different declared type.
    TypeMismatch {
        route: String,
        name: String,
        declared: ParamType,
        bound: ParamType,
    },
    /// A plugin claimed a slot that was already claimed.
    SlotAlreadyClaimed { route: String, index: usize },
    /// A plugin claimed a slot index past the handler arity.
    SlotOutOfRange {
        route: String,
        index: usize,
        arity: usize,
    },
    /// Two distinct `(name, version)` pairs hashing to the same identity.
    IdentityCollision {
        identity: u32,
        existing: String,
        name: String,
    },
    /// Handler arity above the configured limit.
    TooManyArguments {
        route: String,
        arity: usize,
        max: usize,
    },
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::InvalidPlaceholder { route, segment } => {
                write!(f, "route '{}': malformed placeholder '{}'", route, segment)
            }
            RegistrationError::UnknownParamType { route, ty } => {
                write!(f, "route '{}': unknown parameter type '{}'", route, ty)
            }
            RegistrationError::UnboundParameter { route, name } => {
                write!(
                    f,
                    "route '{}': no handler argument left to bind parameter '{}'",
                    route, name
                )
            }
            RegistrationError::UnusedArgument { route, index } => {
                write!(
                    f,
                    "route '{}': handler argument {} is bound to nothing",
                    route, index
                )
            }
            RegistrationError::TypeMismatch {
                route,
                name,
                declared,
                bound,
            } => {
                write!(
                    f,
                    "route '{}': parameter '{}' is declared '{}' but binds an argument of type '{}'",
                    route, name, declared, bound
                )
            }
            RegistrationError::SlotAlreadyClaimed { route, index } => {
                write!(
                    f,
                    "route '{}': argument slot {} claimed twice",
                    route, index
                )
            }
            RegistrationError::SlotOutOfRange {
                route,
                index,
                arity,
            } => {
                write!(
                    f,
                    "route '{}': claimed slot {} is out of range for arity {}",
                    route, index, arity
                )
            }
            RegistrationError::IdentityCollision {
                identity,
                existing,
                name,
            } => {
                write!(
                    f,
                    "identity 0x{:08x} of '{}' collides with already-registered '{}'",
                    identity, name, existing
                )
            }
            RegistrationError::TooManyArguments { route, arity, max } => {
                write!(
                    f,
                    "route '{}': handler arity {} exceeds limit of {}",
                    route, arity, max
                )
            }
        }
    }
}

impl std::error::Error for RegistrationError {}

/// A typed path placeholder bound to a handler argument slot.
#[derive(Debug, Clone)]
pub struct TypedSegment {
    pub name: String,
    pub ty: ParamType,
    /// Index in the handler argument array this placeholder fills.
    pub arg_index: usize,
}

/// A declared query parameter bound to a handler argument slot.
#[derive(Debug, Clone)]
pub struct BoundQuery {
    pub param: QueryParam,
    pub arg_index: usize,
}

/// A compiled, immutable dispatch unit.
///
/// Created once at registration, stored behind `Arc` in the dispatcher's
/// identity table, and read concurrently for the process lifetime. The
/// handler is the application body wrapped with plugin call injection.
pub struct Route {
    /// Display name, `"<METHOD> <path>"` — the hash input for identity.
    pub name: String,
    pub method: Method,
    pub version: u32,
    /// Wire identity: `hash(name) + version * VERSION_MULTIPLIER`.
    pub identity: u32,
    /// Full ordered segment list, literals included.
    pub segments: Vec<PathSegment>,
    /// Typed placeholders in declared order with their bound slots.
    pub typed_segments: Vec<TypedSegment>,
    /// Declared queries in declaration order with their bound slots.
    pub queries: Vec<BoundQuery>,
    pub properties: Vec<RouteProperty>,
    pub result_ty: ParamType,
    /// Declared handler arity (the size of the call argument array).
    pub arg_count: usize,
    pub description: String,
    /// Documentation grouping active at registration; no dispatch effect.
    pub category: Option<String>,
    pub(crate) plugins: Arc<[BoundPlugin]>,
    pub(crate) handler: HandlerBody,
}

impl Route {
    /// Invoke the compiled handler (plugin injection included).
    #[inline]
    pub(crate) fn handler(&self) -> &HandlerBody {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("identity", &format_args!("0x{:08x}", self.identity))
            .field("arg_count", &self.arg_count)
            .field("result_ty", &self.result_ty)
            .finish_non_exhaustive()
    }
}

/// Builder-style route description consumed by [`Router::add_route`].
#[derive(Debug, Clone)]
pub struct RouteDesc {
    pub method: Method,
    /// Path template, e.g. `/item/{id:int}`.
    pub path: String,
    /// Opaque schema version tag folded into the identity.
    pub version: u32,
    pub queries: Vec<QueryParam>,
    pub properties: Vec<RouteProperty>,
    pub description: String,
}

impl RouteDesc {
    fn new(method: Method, path: &str) -> Self {
        RouteDesc {
            method,
            path: path.to_string(),
            version: 0,
            queries: Vec::new(),
            properties: Vec::new(),
            description: String::new(),
        }
    }

    #[must_use]
    pub fn get(path: &str) -> Self {
        RouteDesc::new(Method::Get, path)
    }

    #[must_use]
    pub fn post(path: &str) -> Self {
        RouteDesc::new(Method::Post, path)
    }

    #[must_use]
    pub fn put(path: &str) -> Self {
        RouteDesc::new(Method::Put, path)
    }

    #[must_use]
    pub fn delete(path: &str) -> Self {
        RouteDesc::new(Method::Delete, path)
    }

    /// Set the opaque version tag (default 0).
    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Declare a query parameter.
    #[must_use]
    pub fn query(mut self, query: QueryParam) -> Self {
        self.queries.push(query);
        self
    }

    /// Attach an opaque property consulted by plugins.
    #[must_use]
    pub fn property(mut self, name: &str, value: serde_json::Value) -> Self {
        self.properties.push(RouteProperty::new(name, value));
        self
    }

    /// Set the human-readable description used in documentation entries.
    #[must_use]
    pub fn describe(mut self, text: &str) -> Self {
        self.description = text.to_string();
        self
    }
}

/// Route registration surface.
///
/// Collects plugins and compiled routes; consumed by
/// [`WireDispatcher`](crate::dispatcher::WireDispatcher) construction,
/// after which the route table never changes.
pub struct Router {
    plugins: Vec<Arc<dyn Plugin>>,
    routes: Vec<Arc<Route>>,
    /// Identity → display name, for collision detection.
    identities: HashMap<u32, String>,
    category: Option<String>,
    doc_sink: Arc<dyn DocSink>,
    limits: DispatchLimits,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create an empty router with default limits and a discarding doc
    /// sink.
    #[must_use]
    pub fn new() -> Self {
        Router {
            plugins: Vec::new(),
            routes: Vec::new(),
            identities: HashMap::new(),
            category: None,
            doc_sink: Arc::new(NullDocSink),
            limits: DispatchLimits::default(),
        }
    }

    /// Create an empty router with explicit limits.
    #[must_use]
    pub fn with_limits(limits: DispatchLimits) -> Self {
        Router {
            limits,
            ..Router::new()
        }
    }

    /// Replace the documentation sink.
    pub fn set_doc_sink(&mut self, sink: Arc<dyn DocSink>) {
        self.doc_sink = sink;
    }

    /// Register a plugin consulted for every subsequent route.
    pub fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        info!(plugin = plugin.name(), "Plugin registered");
        self.plugins.push(plugin);
    }

    /// Scope the routes registered inside `body` under a documentation
    /// category. Purely cosmetic — categories never affect dispatch.
    pub fn category(&mut self, name: &str, body: impl FnOnce(&mut Self)) {
        let previous = self.category.replace(name.to_string());
        body(self);
        self.category = previous;
    }

    /// The compiled routes, in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Consume the router, yielding the compiled routes.
    #[must_use]
    pub fn into_routes(self) -> Vec<Arc<Route>> {
        self.routes
    }

    /// Register a route: apply plugins, bind argument slots, compile, and
    /// store.
    ///
    /// `arg_types` declares the handler's argument array; `result_ty` the
    /// type of the value resolved through the completion handle. Fails on
    /// any binding shortfall, type mismatch, or identity collision — all
    /// startup-fatal, never per-request.
    pub fn add_route(
        &mut self,
        desc: RouteDesc,
        handler: HandlerBody,
        arg_types: &[ParamType],
        result_ty: ParamType,
    ) -> Result<Arc<Route>, RegistrationError> {
        let result = self.compile_route(desc, handler, arg_types, result_ty);
        match &result {
            Ok(route) => {
                info!(
                    route = %route.name,
                    version = route.version,
                    identity = format_args!("0x{:08x}", route.identity),
                    args = route.arg_count,
                    queries = route.queries.len(),
                    plugins = route.plugins.len(),
                    "Route registered"
                );
            }
            Err(err) => {
                error!(error = %err, "Route registration failed");
            }
        }
        result
    }

    fn compile_route(
        &mut self,
        desc: RouteDesc,
        handler: HandlerBody,
        arg_types: &[ParamType],
        result_ty: ParamType,
    ) -> Result<Arc<Route>, RegistrationError> {
        if arg_types.len() > self.limits.max_args {
            return Err(RegistrationError::TooManyArguments {
                route: desc.path.clone(),
                arity: arg_types.len(),
                max: self.limits.max_args,
            });
        }

        let mut segments = parse_path(&desc.path)?;
        let mut queries = desc.queries.clone();
        let mut claimed = vec![false; arg_types.len()];

        // Phase one: every registered plugin gets a chance to opt in,
        // claim argument slots, and extend the route shape.
        let mut bound_plugins: Vec<BoundPlugin> = Vec::new();
        for plugin in &self.plugins {
            if let Some(mut context) = plugin.is_used(&desc, result_ty, &desc.properties) {
                let mut modifier = RouteModifier {
                    arg_types,
                    claimed: &mut claimed,
                    segments: &mut segments,
                    queries: &mut queries,
                    route_name: &desc.path,
                };
                plugin.modify_route(&mut context, &mut modifier)?;
                bound_plugins.push(BoundPlugin {
                    plugin: Arc::clone(plugin),
                    context,
                });
            }
        }

        // Phase two: automatic binding — placeholders left to right, then
        // declared queries, each taking the next unclaimed slot.
        let mut typed_segments = Vec::new();
        for segment in &segments {
            if let PathSegment::Param { name, ty } = segment {
                let index = claim_next(&mut claimed).ok_or_else(|| {
                    RegistrationError::UnboundParameter {
                        route: desc.path.clone(),
                        name: name.clone(),
                    }
                })?;
                if arg_types[index] != *ty {
                    return Err(RegistrationError::TypeMismatch {
                        route: desc.path.clone(),
                        name: name.clone(),
                        declared: *ty,
                        bound: arg_types[index],
                    });
                }
                typed_segments.push(TypedSegment {
                    name: name.clone(),
                    ty: *ty,
                    arg_index: index,
                });
            }
        }

        let mut bound_queries = Vec::new();
        for query in &queries {
            let index =
                claim_next(&mut claimed).ok_or_else(|| RegistrationError::UnboundParameter {
                    route: desc.path.clone(),
                    name: query.name.clone(),
                })?;
            if arg_types[index] != query.ty {
                return Err(RegistrationError::TypeMismatch {
                    route: desc.path.clone(),
                    name: query.name.clone(),
                    declared: query.ty,
                    bound: arg_types[index],
                });
            }
            bound_queries.push(BoundQuery {
                param: query.clone(),
                arg_index: index,
            });
        }

        if let Some(index) = claimed.iter().position(|c| !c) {
            return Err(RegistrationError::UnusedArgument {
                route: desc.path.clone(),
                index,
            });
        }

        let path_display = render_path(&segments);
        let name = format!("{} {}", desc.method, path_display);
        let identity = route_identity(&name, desc.version);
        if let Some(existing) = self.identities.get(&identity) {
            return Err(RegistrationError::IdentityCollision {
                identity,
                existing: existing.clone(),
                name,
            });
        }

        // Compiled handler: plugin-provided slots are injected before the
        // application body runs; the dispatcher never sees plugin slots.
        let plugins: Arc<[BoundPlugin]> = bound_plugins.into();
        let wrapped: HandlerBody = {
            let plugins = Arc::clone(&plugins);
            Arc::new(move |call, done| {
                for bound in plugins.iter() {
                    bound.plugin.modify_call(&bound.context, call);
                }
                handler(call, done);
            })
        };

        let route = Arc::new(Route {
            name: name.clone(),
            method: desc.method,
            version: desc.version,
            identity,
            segments,
            typed_segments,
            queries: bound_queries,
            properties: desc.properties,
            result_ty,
            arg_count: arg_types.len(),
            description: desc.description,
            category: self.category.clone(),
            plugins,
            handler: wrapped,
        });

        self.emit_doc(&route);
        self.identities.insert(identity, name);
        self.routes.push(Arc::clone(&route));
        Ok(route)
    }

    /// Emit the documentation entry for a compiled route. Observational
    /// only — nothing here may influence binding.
    fn emit_doc(&self, route: &Route) {
        let mut params: Vec<DocParam> = route
            .typed_segments
            .iter()
            .map(|s| DocParam::path(&s.name, s.ty))
            .collect();
        params.extend(route.queries.iter().map(|q| {
            DocParam::query(
                &q.param.name,
                q.param.ty,
                !q.param.is_optional(),
                &q.param.description,
            )
        }));
        let mut doc = RouteDoc {
            name: route.name.clone(),
            method: route.method.to_string(),
            path: render_path(&route.segments),
            version: route.version,
            category: route.category.clone(),
            description: route.description.clone(),
            params,
        };
        for bound in route.plugins.iter() {
            bound.plugin.modify_docs(&bound.context, &mut doc);
        }
        self.doc_sink.route_registered(&doc);
    }
}

/// Claim the first unclaimed slot, skipping already-claimed ones.
fn claim_next(claimed: &mut [bool]) -> Option<usize> {
    let index = claimed.iter().position(|c| !c)?;
    claimed[index] = true;
    Some(index)
}

/// Parse a path template into ordered segments.
///
/// `{name:type}` is a typed placeholder; `{name}` defaults to `str`.
pub(crate) fn parse_path(path: &str) -> Result<Vec<PathSegment>, RegistrationError> {
    let mut segments = Vec::new();
    for raw in path.split('/').filter(|s| !s.is_empty()) {
        if let Some(body) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            let (name, ty) = match body.split_once(':') {
                Some((name, ty_name)) => {
                    let ty = ParamType::from_name(ty_name).ok_or_else(|| {
                        RegistrationError::UnknownParamType {
                            route: path.to_string(),
                            ty: ty_name.to_string(),
                        }
                    })?;
                    (name, ty)
                }
                None => (body, ParamType::Str),
            };
            if name.is_empty() {
                return Err(RegistrationError::InvalidPlaceholder {
                    route: path.to_string(),
                    segment: raw.to_string(),
                });
            }
            segments.push(PathSegment::Param {
                name: name.to_string(),
                ty,
            });
        } else {
            segments.push(PathSegment::Literal(raw.to_string()));
        }
    }
    Ok(segments)
}

/// Render a segment list back into display form (`/item/{id:int}`).
pub(crate) fn render_path(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        out.push_str(&segment.to_string());
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}
