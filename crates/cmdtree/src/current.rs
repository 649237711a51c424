//! The "current command" stack.
//!
//! Completers and free functions sometimes need the command that is being
//! constructed or executed without being handed it. [`current_command`]
//! answers that from a stack that is pushed whenever a command parses or
//! executes and popped by a guard on every exit path, including panics and
//! early `?` returns.
//!
//! The stack is re-entrant: a command that invokes another command pushes a
//! second frame, and the first becomes current again when the inner call's
//! guard drops.
//!
//! Dispatch is single-threaded, so the stack lives in thread-local storage.

use std::cell::RefCell;

use crate::command::TyperCommand;

thread_local! {
    static STACK: RefCell<Vec<TyperCommand>> = const { RefCell::new(Vec::new()) };
}

/// Scope guard for a pushed command. Pops its frame when dropped.
#[must_use = "the command is popped as soon as the guard is dropped"]
pub struct CurrentCommand {
    depth: usize,
}

impl CurrentCommand {
    /// Pushes `command` as the current command.
    pub fn enter(command: &TyperCommand) -> Self {
        let depth = STACK.with(|s| {
            let mut s = s.borrow_mut();
            s.push(command.clone());
            s.len()
        });
        tracing::trace!(command = command.name(), depth, "current command pushed");
        Self { depth }
    }
}

impl Drop for CurrentCommand {
    fn drop(&mut self) {
        STACK.with(|s| {
            let mut s = s.borrow_mut();
            // Frames above ours belong to guards that leaked; drop them too.
            s.truncate(self.depth.saturating_sub(1));
        });
        tracing::trace!(depth = self.depth, "current command popped");
    }
}

/// The innermost command currently parsing or executing.
pub fn current_command() -> Option<TyperCommand> {
    STACK.with(|s| s.borrow().last().cloned())
}

/// Number of commands on the stack.
pub fn depth() -> usize {
    STACK.with(|s| s.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::CommandClass;
    use crate::handler::Callback;

    fn command(name: &str) -> TyperCommand {
        let class = CommandClass::define(name)
            .command(Callback::function("noop", |_a| Ok::<_, anyhow::Error>(())))
            .build()
            .unwrap();
        TyperCommand::new(class)
    }

    #[test]
    fn test_nesting_restores_outer() {
        let y = command("y");
        let x = command("x");
        assert!(current_command().is_none());
        {
            let _outer = CurrentCommand::enter(&y);
            assert_eq!(current_command().unwrap().name(), "y");
            {
                let _inner = CurrentCommand::enter(&x);
                assert_eq!(current_command().unwrap().name(), "x");
                assert_eq!(depth(), 2);
            }
            assert_eq!(current_command().unwrap().name(), "y");
        }
        assert!(current_command().is_none());
    }

    #[test]
    fn test_pop_on_error_path() {
        let y = command("y");
        let x = command("x");

        fn failing(x: &TyperCommand) -> Result<(), String> {
            let _g = CurrentCommand::enter(x);
            Err("boom".into())
        }

        let _outer = CurrentCommand::enter(&y);
        assert!(failing(&x).is_err());
        assert_eq!(current_command().unwrap().name(), "y");
        assert_eq!(depth(), 1);
    }

    #[test]
    fn test_pop_on_panic() {
        let x = command("x");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _g = CurrentCommand::enter(&x);
            panic!("inner failure");
        }));
        assert!(result.is_err());
        assert_eq!(depth(), 0);
    }
}
