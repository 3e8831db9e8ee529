//! Defines [`ExecutionScopes`], the stack of hint-local variable bindings a
//! [`HintProcessor`](crate::hint::HintProcessor) reads and writes while the virtual machine runs.
//!
//! Scopes hold type-erased values because hints can stash arbitrary host-side state (counters,
//! partially built dictionaries, intermediate bignums) between one hint invocation and the next;
//! the core itself never inspects their contents.

use std::any::Any;
use std::collections::HashMap;

use crate::error::HintError;

/// A single nested scope: a name-to-value dictionary local to one level of call nesting.
type Scope = HashMap<String, Box<dyn Any>>;

/// A stack of [`Scope`]s, entered and exited alongside Cairo function calls.
///
/// There is always at least one scope (the outermost, "main" scope); [`ExecutionScopes::exit`]
/// on the last remaining scope is a logic error in the caller, not a recoverable condition.
#[derive(Default)]
pub struct ExecutionScopes {
    scopes: Vec<Scope>,
}

impl std::fmt::Debug for ExecutionScopes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionScopes")
            .field("depth", &self.scopes.len())
            .finish()
    }
}

impl ExecutionScopes {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
        }
    }

    /// Pushes a new, empty scope.
    pub fn enter(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Pops the innermost scope.
    ///
    /// # Panics
    ///
    /// Panics if this would leave no scopes at all; callers must balance every [`Self::enter`]
    /// with exactly one [`Self::exit`].
    pub fn exit(&mut self) {
        assert!(self.scopes.len() > 1, "cannot exit the outermost scope");
        self.scopes.pop();
    }

    fn current_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("at least one scope always exists")
    }

    fn current(&self) -> &Scope {
        self.scopes.last().expect("at least one scope always exists")
    }

    /// Binds `name` to `value` in the innermost scope.
    pub fn insert<T: Any>(&mut self, name: &str, value: T) {
        self.current_mut().insert(name.to_owned(), Box::new(value));
    }

    /// Looks up `name` in the innermost scope, downcasting to `T`.
    pub fn get<T: Any>(&self, name: &str) -> Result<&T, HintError> {
        self.current()
            .get(name)
            .and_then(|v| v.downcast_ref::<T>())
            .ok_or_else(|| HintError::MissingConstant(name.to_owned()))
    }

    /// Looks up `name` in the innermost scope, mutably.
    pub fn get_mut<T: Any>(&mut self, name: &str) -> Result<&mut T, HintError> {
        self.current_mut()
            .get_mut(name)
            .and_then(|v| v.downcast_mut::<T>())
            .ok_or_else(|| HintError::MissingConstant(name.to_owned()))
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_visible_after_insert() {
        let mut scopes = ExecutionScopes::new();
        scopes.insert("n", 42i32);
        assert_eq!(*scopes.get::<i32>("n").unwrap(), 42);
    }

    #[test]
    fn entering_a_scope_hides_outer_bindings() {
        let mut scopes = ExecutionScopes::new();
        scopes.insert("n", 1i32);
        scopes.enter();
        assert!(scopes.get::<i32>("n").is_err());
        scopes.insert("n", 2i32);
        assert_eq!(*scopes.get::<i32>("n").unwrap(), 2);
        scopes.exit();
        assert_eq!(*scopes.get::<i32>("n").unwrap(), 1);
    }

    #[test]
    #[should_panic]
    fn exiting_the_outermost_scope_panics() {
        let mut scopes = ExecutionScopes::new();
        scopes.exit();
    }
}
