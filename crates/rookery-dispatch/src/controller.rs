//! The dispatch controller: handler registration, middleware scoping, and
//! the immutable table they are compiled into.
//!
//! # Registration
//!
//! - **Handlers** are keyed by exact event code. Registering several for
//!   the same code fans out: all of them run, in registration order.
//! - **Middleware** is keyed by `(code, level)`. The level is how many
//!   leading bits of the code the registration cares about:
//!
//! ```text
//!   level 0   → prefix 0x0000, matches every code
//!   level 1   → 0x8000 matches all notifications, 0x0000 all requests
//!   level 8   → 0x81xx matches every room notification
//!   level 16  → exactly one code
//! ```
//!
//! # Build
//!
//! [`Controller::build`] walks each handled code from level 16 down to
//! level 0 and wraps the accumulated handler in whatever middleware is
//! registered at that code's prefix. The most specific middleware ends up
//! innermost and the root middleware outermost, so a level-0 middleware
//! sees (and may veto) every frame before anything narrower runs:
//!
//! ```text
//!   mw@0( mw@1( ... mw@16( handler_a ; handler_b ) ... ) )
//! ```
//!
//! The result is a plain `code → handler` map. Dispatch is an exact lookup;
//! no prefix matching happens per frame.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use rookery_protocol::Frame;

use crate::DispatchError;
use crate::routes::run_all;

/// What every handler returns.
pub type HandlerResult = Result<(), DispatchError>;

/// A frame handler. Reference-counted so middleware can hold on to the
/// handler it wraps.
pub type Handler = Rc<dyn Fn(&Frame) -> HandlerResult>;

/// Turns a handler into a wrapped handler.
///
/// The returned handler decides whether, when, and how often to call the
/// one it was given:
///
/// ```rust
/// use std::rc::Rc;
/// use rookery_dispatch::{Handler, Middleware};
/// use rookery_protocol::Frame;
///
/// // Drop every frame with an empty body.
/// let skip_empty: Middleware = Rc::new(|next: Handler| -> Handler {
///     Rc::new(move |frame: &Frame| {
///         if frame.body().is_empty() {
///             return Ok(());
///         }
///         next(frame)
///     })
/// });
/// # let _ = skip_empty;
/// ```
pub type Middleware = Rc<dyn Fn(Handler) -> Handler>;

/// Most specific middleware level: one exact event code.
pub const MAX_LEVEL: u8 = 16;

/// Keeps the top `level` bits of `code` and zeroes the rest.
///
/// `level` above 16 is treated as 16.
pub fn prefix(code: u16, level: u8) -> u16 {
    match level.min(MAX_LEVEL) {
        0 => 0,
        level => code & (u16::MAX << (16 - level)),
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Collects registrations until [`build`](Controller::build) seals them.
#[derive(Default)]
pub struct Controller {
    handlers: BTreeMap<u16, Vec<Handler>>,
    builtin: BTreeMap<u16, Vec<Handler>>,
    middleware: HashMap<(u16, u8), Vec<Middleware>>,
    sealed: bool,
}

impl Controller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler for `code`. Earlier registrations run first.
    pub fn register_handler<F>(&mut self, code: u16, handler: F) -> Result<(), DispatchError>
    where
        F: Fn(&Frame) -> HandlerResult + 'static,
    {
        self.check_open()?;
        self.handlers.entry(code).or_default().push(Rc::new(handler));
        tracing::debug!(code, "handler registered");
        Ok(())
    }

    /// Adds middleware scoped to the top `level` bits of `code`.
    ///
    /// Middleware registered at the same prefix and level nests in
    /// registration order: the first one registered is outermost.
    pub fn register_middleware<M>(
        &mut self,
        code: u16,
        level: u8,
        middleware: M,
    ) -> Result<(), DispatchError>
    where
        M: Fn(Handler) -> Handler + 'static,
    {
        self.check_open()?;
        if level > MAX_LEVEL {
            return Err(DispatchError::InvalidLevel(level));
        }
        let key = (prefix(code, level), level);
        self.middleware.entry(key).or_default().push(Rc::new(middleware));
        tracing::debug!(prefix = key.0, level, "middleware registered");
        Ok(())
    }

    /// Adds an engine-internal handler. Built-in handlers live in their own
    /// table and are never wrapped by middleware.
    pub fn register_builtin<F>(&mut self, code: u16, handler: F) -> Result<(), DispatchError>
    where
        F: Fn(&Frame) -> HandlerResult + 'static,
    {
        self.check_open()?;
        self.builtin.entry(code).or_default().push(Rc::new(handler));
        Ok(())
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn check_open(&self) -> Result<(), DispatchError> {
        if self.sealed {
            return Err(DispatchError::Sealed);
        }
        Ok(())
    }

    /// Compiles every registration into an immutable [`DispatchTable`] and
    /// rejects any further registration.
    ///
    /// Building again returns an equivalent table.
    pub fn build(&mut self) -> DispatchTable {
        self.sealed = true;

        let handlers: HashMap<u16, Handler> = self
            .handlers
            .iter()
            .map(|(&code, list)| (code, self.wrap(code, fan_out(code, list))))
            .collect();
        let builtin: HashMap<u16, Handler> = self
            .builtin
            .iter()
            .map(|(&code, list)| (code, fan_out(code, list)))
            .collect();

        tracing::debug!(
            handlers = handlers.len(),
            builtin = builtin.len(),
            middleware = self.middleware.values().map(Vec::len).sum::<usize>(),
            "dispatch table built"
        );
        DispatchTable { handlers, builtin }
    }

    /// Wraps `handler` from the most specific level outward.
    fn wrap(&self, code: u16, mut handler: Handler) -> Handler {
        for level in (0..=MAX_LEVEL).rev() {
            if let Some(layers) = self.middleware.get(&(prefix(code, level), level)) {
                // Reverse so the first registered ends up outermost.
                for middleware in layers.iter().rev() {
                    handler = middleware(handler);
                }
            }
        }
        handler
    }
}

/// Collapses a code's handlers into one that runs them all in order.
///
/// Every handler runs even if an earlier one fails; the first failure is
/// returned and the rest are logged.
fn fan_out(code: u16, list: &[Handler]) -> Handler {
    if let [only] = list {
        return Rc::clone(only);
    }
    let list: Vec<Handler> = list.to_vec();
    Rc::new(move |frame: &Frame| run_all(code, &list, frame))
}

// ---------------------------------------------------------------------------
// DispatchTable
// ---------------------------------------------------------------------------

/// The compiled, immutable `code → handler` lookup.
pub struct DispatchTable {
    handlers: HashMap<u16, Handler>,
    builtin: HashMap<u16, Handler>,
}

impl DispatchTable {
    /// Runs the composed handler for the frame's code.
    ///
    /// Returns `None` when nothing is registered for that code.
    pub fn dispatch(&self, frame: &Frame) -> Option<HandlerResult> {
        self.handlers.get(&frame.event_code()).map(|h| h(frame))
    }

    /// Runs the built-in handler for the frame's code, if any.
    pub fn dispatch_builtin(&self, frame: &Frame) -> Option<HandlerResult> {
        self.builtin.get(&frame.event_code()).map(|h| h(frame))
    }

    pub fn handles(&self, code: u16) -> bool {
        self.handlers.contains_key(&code)
    }

    pub fn handles_builtin(&self, code: u16) -> bool {
        self.builtin.contains_key(&code)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
