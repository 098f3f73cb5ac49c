//! # Plugin Module
//!
//! Capability protocol for extending routes without changing handler
//! signatures written by application authors.
//!
//! ## Two-phase protocol
//!
//! **Registration time** — for every route being registered, each plugin is
//! asked [`Plugin::is_used`]. Returning `Some(context)` marks the plugin as
//! used for that route; the router then calls [`Plugin::modify_route`],
//! through which the plugin may claim handler argument slots and extend the
//! route's path/query shape, all before automatic slot binding runs.
//! [`Plugin::modify_docs`] lets the plugin annotate the route's
//! documentation entry.
//!
//! **Request time** — [`Plugin::modify_call`] runs inside the compiled
//! handler wrapper before the application body, writing plugin-provided
//! values into the argument slots it claimed. The dispatcher itself is
//! unaware of plugin slots.
//!
//! The context value returned by `is_used` is opaque to the router: it is
//! stored in the compiled route as a [`BoundPlugin`] and handed back to the
//! plugin on every later call. A typical plugin stores the slot index it
//! claimed in its context during `modify_route`.

use std::any::Any;
use std::sync::Arc;

use crate::descriptor::{ParamType, PathSegment, QueryParam, RouteProperty};
use crate::dispatcher::CallContext;
use crate::docs::RouteDoc;
use crate::router::{RegistrationError, RouteDesc};

/// Opaque per-route state returned by [`Plugin::is_used`].
pub type PluginContext = Box<dyn Any + Send + Sync>;

/// Capability that may claim handler arguments and inject values at
/// dispatch time.
pub trait Plugin: Send + Sync {
    /// Short name used in registration logs and errors.
    fn name(&self) -> &str;

    /// Decide whether this plugin applies to the route being registered.
    ///
    /// Returning `Some` opts the plugin in and provides the opaque context
    /// carried into the compiled route.
    fn is_used(
        &self,
        desc: &RouteDesc,
        result_ty: ParamType,
        properties: &[RouteProperty],
    ) -> Option<PluginContext>;

    /// Claim argument slots and extend the route shape before automatic
    /// binding runs.
    fn modify_route(
        &self,
        _context: &mut PluginContext,
        _modifier: &mut RouteModifier<'_>,
    ) -> Result<(), RegistrationError> {
        Ok(())
    }

    /// Annotate the route's documentation entry.
    fn modify_docs(&self, _context: &PluginContext, _doc: &mut RouteDoc) {}

    /// Inject values into the claimed argument slots for one call.
    ///
    /// Runs before the application handler body, inside the compiled
    /// handler wrapper.
    fn modify_call(&self, _context: &PluginContext, _call: &mut CallContext) {}
}

/// A plugin paired with the context it returned at registration time.
///
/// Carried from registration into the compiled route's dispatch path.
pub struct BoundPlugin {
    pub plugin: Arc<dyn Plugin>,
    pub context: PluginContext,
}

/// Registration-time mutator handed to [`Plugin::modify_route`].
///
/// Lets a used plugin claim handler argument indices and append path
/// segments or query descriptors ahead of automatic binding.
pub struct RouteModifier<'a> {
    pub(crate) arg_types: &'a [ParamType],
    pub(crate) claimed: &'a mut Vec<bool>,
    pub(crate) segments: &'a mut Vec<PathSegment>,
    pub(crate) queries: &'a mut Vec<QueryParam>,
    pub(crate) route_name: &'a str,
}

impl<'a> RouteModifier<'a> {
    /// The declared handler argument types, in order.
    #[must_use]
    pub fn arg_types(&self) -> &[ParamType] {
        self.arg_types
    }

    /// Whether the given argument index has already been claimed.
    #[must_use]
    pub fn is_claimed(&self, index: usize) -> bool {
        self.claimed.get(index).copied().unwrap_or(false)
    }

    /// Claim the handler argument at `index`.
    ///
    /// The slot is removed from automatic path/query binding; the plugin
    /// becomes responsible for filling it in `modify_call`.
    pub fn provide_parameter(&mut self, index: usize) -> Result<(), RegistrationError> {
        match self.claimed.get_mut(index) {
            Some(slot) if !*slot => {
                *slot = true;
                Ok(())
            }
            Some(_) => Err(RegistrationError::SlotAlreadyClaimed {
                route: self.route_name.to_string(),
                index,
            }),
            None => Err(RegistrationError::SlotOutOfRange {
                route: self.route_name.to_string(),
                index,
                arity: self.arg_types.len(),
            }),
        }
    }

    /// Append a path segment to the route's shape.
    pub fn push_segment(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// Append a query descriptor to the route's shape.
    pub fn push_query(&mut self, query: QueryParam) {
        self.queries.push(query);
    }
}
