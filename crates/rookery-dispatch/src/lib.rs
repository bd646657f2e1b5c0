//! Event dispatch for Rookery.
//!
//! - [`Controller`] collects handlers and prefix-scoped middleware, then
//!   compiles them once into a [`DispatchTable`].
//! - [`Routes`] is the plain fan-out table used for error codes and user
//!   message commands.
//!
//! Everything here is single-threaded (`Rc`, not `Arc`): the whole engine
//! runs on the thread that calls `tick`.

mod controller;
mod error;
mod routes;

pub use controller::{
    Controller, DispatchTable, Handler, HandlerResult, MAX_LEVEL, Middleware, prefix,
};
pub use error::DispatchError;
pub use routes::{Route, Routes};
