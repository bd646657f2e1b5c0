//! Small fan-out tables keyed by a 16-bit code.
//!
//! The session routes decoded application errors (by error code) and user
//! messages (by command) through these. They have no middleware; each
//! code just maps to an ordered list of callbacks.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::HandlerResult;

/// A callback taking a borrowed `A`.
pub type Route<A> = Rc<dyn Fn(&A) -> HandlerResult>;

/// `code → [callback, ...]`, invoked in registration order.
pub struct Routes<A: ?Sized> {
    table: HashMap<u16, Vec<Route<A>>>,
}

impl<A: ?Sized> Default for Routes<A> {
    fn default() -> Self {
        Self {
            table: HashMap::new(),
        }
    }
}

impl<A: ?Sized> fmt::Debug for Routes<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<_> = self.table.keys().copied().collect();
        codes.sort_unstable();
        f.debug_struct("Routes").field("codes", &codes).finish()
    }
}

impl<A: ?Sized> Routes<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, code: u16, route: F)
    where
        F: Fn(&A) -> HandlerResult + 'static,
    {
        self.table.entry(code).or_default().push(Rc::new(route));
    }

    /// Runs every callback for `code`. `None` if there are none.
    ///
    /// All callbacks run; the first error is returned.
    pub fn invoke(&self, code: u16, arg: &A) -> Option<HandlerResult> {
        let routes = self.table.get(&code)?;
        Some(run_all(code, routes, arg))
    }

    pub fn contains(&self, code: u16) -> bool {
        self.table.contains_key(&code)
    }

    /// Number of distinct codes with at least one callback.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Calls each callback in order, even after one fails.
///
/// Returns the first failure; later ones are logged.
pub(crate) fn run_all<A: ?Sized>(code: u16, callbacks: &[Route<A>], arg: &A) -> HandlerResult {
    let mut first_err = None;
    for callback in callbacks {
        if let Err(e) = callback(arg) {
            if first_err.is_none() {
                first_err = Some(e);
            } else {
                tracing::warn!(code, error = %e, "additional handler failure");
            }
        }
    }
    first_err.map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::DispatchError;

    #[test]
    fn test_invoke_unknown_code_returns_none() {
        let routes: Routes<u32> = Routes::new();
        assert!(routes.invoke(1, &5).is_none());
    }

    #[test]
    fn test_invoke_runs_all_routes_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut routes: Routes<u32> = Routes::new();
        for offset in [1, 2] {
            let seen = Rc::clone(&seen);
            routes.add(9, move |value: &u32| {
                seen.borrow_mut().push(value + offset);
                Ok(())
            });
        }
        routes.invoke(9, &10).unwrap().unwrap();
        assert_eq!(*seen.borrow(), vec![11, 12]);
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn test_invoke_returns_first_error() {
        let mut routes: Routes<str> = Routes::new();
        routes.add(1, |_: &str| Err(DispatchError::Handler("first".into())));
        routes.add(1, |_: &str| Err(DispatchError::Handler("second".into())));

        let err = routes.invoke(1, "x").unwrap().unwrap_err();
        assert_eq!(err.to_string(), "handler failed: first");
    }

    #[test]
    fn test_run_all_runs_callbacks_after_a_failure() {
        let calls = Rc::new(RefCell::new(0));
        let counted = |calls: &Rc<RefCell<u32>>, fail: bool| -> Route<u8> {
            let calls = Rc::clone(calls);
            Rc::new(move |_: &u8| {
                *calls.borrow_mut() += 1;
                if fail {
                    return Err(DispatchError::Handler(format!("call {}", calls.borrow())));
                }
                Ok(())
            })
        };
        let callbacks = [
            counted(&calls, false),
            counted(&calls, true),
            counted(&calls, true),
            counted(&calls, false),
        ];

        let err = run_all(3, &callbacks, &0).unwrap_err();
        assert_eq!(err.to_string(), "handler failed: call 2");
        assert_eq!(*calls.borrow(), 4);
        assert!(run_all(3, &callbacks[..1], &0).is_ok());
    }
}
