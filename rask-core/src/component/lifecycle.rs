//! Lifecycle hook registration.
//!
//! A component factory may register callbacks for "after the first
//! successful render" and "when the component goes away". Registration goes
//! to whichever component is initializing on this thread; nested
//! initializations (a factory mounting a child component) each collect their
//! own hooks.

use std::cell::RefCell;

use crate::error::ComponentError;

pub(crate) type Hook = Box<dyn FnOnce()>;

/// Hooks collected while one factory ran.
#[derive(Default)]
pub(crate) struct Hooks {
    pub(crate) mount: Vec<Hook>,
    pub(crate) cleanup: Vec<Hook>,
}

thread_local! {
    static INITIALIZING: RefCell<Vec<Hooks>> = const { RefCell::new(Vec::new()) };
}

/// Pops the initialization frame even if the factory panics.
struct InitScope {
    finished: bool,
}

impl InitScope {
    fn enter() -> Self {
        INITIALIZING.with(|stack| stack.borrow_mut().push(Hooks::default()));
        Self { finished: false }
    }

    fn finish(mut self) -> Hooks {
        self.finished = true;
        INITIALIZING
            .with(|stack| stack.borrow_mut().pop())
            .unwrap_or_default()
    }
}

impl Drop for InitScope {
    fn drop(&mut self) {
        if !self.finished {
            INITIALIZING.with(|stack| stack.borrow_mut().pop());
        }
    }
}

/// Run `init` as a component initialization and return what it registered.
pub(crate) fn collect_hooks<T>(init: impl FnOnce() -> T) -> (T, Hooks) {
    let scope = InitScope::enter();
    let value = init();
    (value, scope.finish())
}

fn register(hook: &'static str, push: impl FnOnce(&mut Hooks)) -> Result<(), ComponentError> {
    INITIALIZING.with(|stack| match stack.borrow_mut().last_mut() {
        Some(hooks) => {
            push(hooks);
            Ok(())
        }
        None => Err(ComponentError::NoCurrentComponent { hook }),
    })
}

/// Run `f` once, right after the initializing component first renders
/// successfully.
pub fn on_mount<F>(f: F) -> Result<(), ComponentError>
where
    F: FnOnce() + 'static,
{
    register("on_mount", |hooks| hooks.mount.push(Box::new(f)))
}

/// Run `f` when the initializing component is disposed.
pub fn on_cleanup<F>(f: F) -> Result<(), ComponentError>
where
    F: FnOnce() + 'static,
{
    register("on_cleanup", |hooks| hooks.cleanup.push(Box::new(f)))
}

/// Whether a component factory is running on this thread.
pub fn is_initializing() -> bool {
    INITIALIZING.with(|stack| !stack.borrow().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hooks_outside_initialization_fail() {
        assert_eq!(
            on_mount(|| {}),
            Err(ComponentError::NoCurrentComponent { hook: "on_mount" })
        );
        assert!(on_cleanup(|| {}).is_err());
        assert!(!is_initializing());
    }

    #[test]
    fn nested_initializations_collect_separately() {
        let ((inner, ()), outer) = collect_hooks(|| {
            on_mount(|| {}).unwrap();
            let inner = collect_hooks(|| {
                on_cleanup(|| {}).unwrap();
                on_cleanup(|| {}).unwrap();
            });
            on_cleanup(|| {}).unwrap();
            (inner.1, ())
        });

        assert_eq!(inner.mount.len(), 0);
        assert_eq!(inner.cleanup.len(), 2);
        assert_eq!(outer.mount.len(), 1);
        assert_eq!(outer.cleanup.len(), 1);
    }

    #[test]
    fn panicking_init_leaves_no_frame_behind() {
        let result = std::panic::catch_unwind(|| {
            collect_hooks(|| panic!("factory exploded"));
        });
        assert!(result.is_err());
        assert!(!is_initializing());
    }
}
