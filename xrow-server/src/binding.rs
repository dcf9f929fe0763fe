//! Binding call arguments to typed parameters
//!
//! [`ArgBinder`] is what `#[method]` expands to, and can be used by hand in
//! closures registered with [`crate::from_fn`]. Parameters are taken in
//! declaration order:
//!
//! - a positional parameter takes the next positional argument, or a keyword
//!   argument of the same name once positionals run out
//! - a keyword-only parameter takes the keyword argument of its name
//! - `Args` and `Kwargs` parameters collect whatever is left
//!
//! [`ArgBinder::finish`] rejects leftovers, so surplus arguments fail the call
//! instead of being dropped silently.
//!
//! ```rust
//! use xrow_server::{ArgBinder, Struct, Value};
//!
//! let mut kwargs = Struct::new();
//! kwargs.insert("scale", 10);
//!
//! let mut binder = ArgBinder::new(vec![Value::from(4)], kwargs);
//! let base: i64 = binder.positional("base").unwrap();
//! let scale: i64 = binder.positional("scale").unwrap();
//! let label: Option<String> = binder.keyword("label").unwrap();
//! binder.finish().unwrap();
//!
//! assert_eq!((base, scale, label), (4, 10, None));
//! ```

use xrow_core::{FromValue, RpcError, Value};

use crate::handler::{Args, Kwargs};

pub struct ArgBinder {
    positional: std::vec::IntoIter<Value>,
    keywords: Kwargs,
}

fn for_argument(name: &str, err: RpcError) -> RpcError {
    RpcError::invalid_arguments(format!("argument '{}': {}", name, err.message()))
}

impl ArgBinder {
    pub fn new(args: Args, kwargs: Kwargs) -> Self {
        Self {
            positional: args.into_iter(),
            keywords: kwargs,
        }
    }

    /// Bind a parameter that may be passed by position or by name
    pub fn positional<T: FromValue>(&mut self, name: &str) -> Result<T, RpcError> {
        let value = match self.positional.next() {
            Some(value) => {
                if self.keywords.contains_key(name) {
                    return Err(RpcError::invalid_arguments(format!(
                        "got multiple values for argument '{}'",
                        name
                    )));
                }
                Some(value)
            }
            None => self.keywords.remove(name),
        };
        match value {
            Some(value) => T::from_value(value).map_err(|e| for_argument(name, e)),
            None => T::from_missing(name),
        }
    }

    /// Bind a parameter that can only be passed by name
    pub fn keyword<T: FromValue>(&mut self, name: &str) -> Result<T, RpcError> {
        match self.keywords.remove(name) {
            Some(value) => T::from_value(value).map_err(|e| for_argument(name, e)),
            None => T::from_missing(name),
        }
    }

    /// Every remaining positional argument
    pub fn rest_positional(&mut self) -> Args {
        self.positional.by_ref().collect()
    }

    /// Every remaining keyword argument
    pub fn rest_keyword(&mut self) -> Kwargs {
        std::mem::take(&mut self.keywords)
    }

    /// Fail if any argument was not consumed
    pub fn finish(self) -> Result<(), RpcError> {
        let surplus = self.positional.len();
        if surplus > 0 {
            return Err(RpcError::invalid_arguments(format!(
                "{} unexpected positional argument(s)",
                surplus
            )));
        }
        match self.keywords.keys().next() {
            Some(name) => Err(RpcError::invalid_arguments(format!(
                "unexpected keyword argument '{}'",
                name
            ))),
            None => Ok(()),
        }
    }
}
