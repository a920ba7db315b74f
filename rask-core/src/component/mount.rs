//! Mounting components.
//!
//! A mounted component is an observer whose tracking frame spans exactly one
//! render. Whenever something the render read changes, the scheduler re-runs
//! the render and the result goes through the component's [`Patcher`].
//!
//! # Failure Handling
//!
//! The factory runs once. If it fails, the component renders
//! [`VNode::Empty`] for good: it has no render function and no dependencies,
//! so nothing ever triggers it again. If a render fails, the component
//! renders empty for that pass but keeps the dependencies the render read
//! before failing, so the next change to one of them tries exactly once
//! more. Failures go to the component's error boundary when it has one, and
//! to [`Runtime::report`] otherwise.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use super::lifecycle::{collect_hooks, Hook, Hooks};
use super::{ComponentId, Patcher};
use crate::batch;
use crate::dom::VNode;
use crate::error::{ComponentError, ReactiveError};
use crate::reactive::{untracked, Observer, Runtime};

type RenderFn = Box<dyn Fn() -> Result<VNode, ComponentError>>;
type Boundary = Rc<dyn Fn(&ComponentError) -> VNode>;

/// Run `f` under the runtime's panic guard; a caught panic becomes a failure.
fn guarded<T>(f: impl FnOnce() -> Result<T, ComponentError>) -> Result<T, ComponentError> {
    let mut output = None;
    match Runtime::guard(|| output = Some(f())) {
        Ok(()) => output.unwrap_or_else(|| Err(ComponentError::msg("no output produced"))),
        Err(message) => Err(ComponentError::Failed(message)),
    }
}

struct ComponentInner {
    id: ComponentId,
    /// `None` when the factory failed.
    render: Option<RenderFn>,
    patcher: RefCell<Box<dyn Patcher>>,
    boundary: Option<Boundary>,
    tree: RefCell<VNode>,
    observer: Observer,
    mount_hooks: RefCell<Vec<Hook>>,
    cleanup_hooks: RefCell<Vec<Hook>>,
    mounted: Cell<bool>,
    renders: Cell<usize>,
}

impl ComponentInner {
    fn render(&self) {
        let Some(render) = &self.render else {
            return;
        };
        if self.observer.is_disposed() {
            return;
        }
        self.renders.set(self.renders.get() + 1);
        trace!(component = %self.id, render = self.renders.get(), "rendering");

        let result = {
            let _frame = self.observer.observe();
            guarded(render)
        };

        match result {
            Ok(tree) => {
                self.apply(tree);
                if !self.mounted.replace(true) {
                    let hooks = std::mem::take(&mut *self.mount_hooks.borrow_mut());
                    self.run_hooks("on_mount", hooks);
                }
            }
            Err(err) => {
                let fallback = self.fallback(&err, |component, message| ReactiveError::ComponentRender {
                    component,
                    message,
                });
                self.apply(fallback);
            }
        }
    }

    /// What to show instead of a failed factory or render.
    fn fallback(
        &self,
        err: &ComponentError,
        failure: impl FnOnce(ComponentId, String) -> ReactiveError,
    ) -> VNode {
        match &self.boundary {
            Some(boundary) => boundary(err),
            None => {
                Runtime::report(failure(self.id, err.to_string()));
                VNode::Empty
            }
        }
    }

    fn apply(&self, tree: VNode) {
        let old = self.tree.replace(VNode::Empty);
        let next = self.patcher.borrow_mut().patch(&old, tree);
        *self.tree.borrow_mut() = next;
    }

    fn run_hooks(&self, hook: &'static str, hooks: Vec<Hook>) {
        for f in hooks {
            if let Err(message) = Runtime::guard(f) {
                Runtime::report(ReactiveError::LifecycleHook {
                    component: self.id,
                    hook,
                    message,
                });
            }
        }
    }

    fn teardown(&self) {
        if self.observer.is_disposed() {
            return;
        }
        self.observer.dispose();
        self.mount_hooks.borrow_mut().clear();
        let hooks = std::mem::take(&mut *self.cleanup_hooks.borrow_mut());
        self.run_hooks("on_cleanup", hooks);
        debug!(component = %self.id, "component disposed");
    }
}

impl Drop for ComponentInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// A component definition waiting to be mounted.
///
/// The factory runs once, at mount time. It may register lifecycle hooks
/// with [`on_mount`](super::on_mount) and [`on_cleanup`](super::on_cleanup)
/// and returns the render function.
///
/// # Example
///
/// ```rust,ignore
/// let counter = Component::new(move || {
///     let count = store.field("count");
///     on_cleanup(|| println!("bye"))?;
///     Ok(move || {
///         let n: i64 = count.get_as()?;
///         Ok(VNode::element("span").with_child(VNode::text(n.to_string())))
///     })
/// })
/// .error_boundary(|err| VNode::text(format!("oops: {err}")))
/// .mount(ElementPatcher::new(container));
/// ```
pub struct Component<F> {
    factory: F,
    boundary: Option<Boundary>,
}

impl<F, R> Component<F>
where
    F: FnOnce() -> Result<R, ComponentError>,
    R: Fn() -> Result<VNode, ComponentError> + 'static,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            boundary: None,
        }
    }

    /// Render `fallback` instead of an empty tree when the factory or a
    /// render fails. Failures handled here are not reported.
    pub fn error_boundary<B>(mut self, fallback: B) -> Self
    where
        B: Fn(&ComponentError) -> VNode + 'static,
    {
        self.boundary = Some(Rc::new(fallback));
        self
    }

    /// Run the factory, render once and hand the tree to `patcher`.
    pub fn mount<P>(self, patcher: P) -> MountedComponent
    where
        P: Patcher + 'static,
    {
        let id = ComponentId::new();
        let factory = self.factory;
        let (created, hooks) = collect_hooks(|| untracked(|| guarded(factory)));

        let (render, hooks, init_error) = match created {
            Ok(render) => (Some(Box::new(render) as RenderFn), hooks, None),
            // Hooks registered by a factory that then failed never run.
            Err(err) => (None, Hooks::default(), Some(err)),
        };

        let inner = Rc::new_cyclic(|weak: &Weak<ComponentInner>| {
            let weak = weak.clone();
            ComponentInner {
                id,
                render,
                patcher: RefCell::new(Box::new(patcher)),
                boundary: self.boundary,
                tree: RefCell::new(VNode::Empty),
                observer: Observer::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.render();
                    }
                }),
                mount_hooks: RefCell::new(hooks.mount),
                cleanup_hooks: RefCell::new(hooks.cleanup),
                mounted: Cell::new(false),
                renders: Cell::new(0),
            }
        });

        match init_error {
            Some(err) => {
                let fallback = inner.fallback(&err, |component, message| ReactiveError::ComponentInit {
                    component,
                    message,
                });
                inner.apply(fallback);
            }
            None => inner.render(),
        }
        debug!(component = %id, "component mounted");

        MountedComponent { inner }
    }
}

/// Mount a component without an error boundary.
pub fn mount<F, R, P>(factory: F, patcher: P) -> MountedComponent
where
    F: FnOnce() -> Result<R, ComponentError>,
    R: Fn() -> Result<VNode, ComponentError> + 'static,
    P: Patcher + 'static,
{
    Component::new(factory).mount(patcher)
}

/// A live component. Dropping it disposes the component.
pub struct MountedComponent {
    inner: Rc<ComponentInner>,
}

impl MountedComponent {
    pub fn id(&self) -> ComponentId {
        self.inner.id
    }

    /// The tree returned by the last patch.
    pub fn tree(&self) -> VNode {
        self.inner.tree.borrow().clone()
    }

    /// Number of render attempts, failed ones included.
    pub fn render_count(&self) -> usize {
        self.inner.renders.get()
    }

    /// Whether a render has succeeded yet.
    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    /// Number of signals read by the last render.
    pub fn dependency_count(&self) -> usize {
        self.inner.observer.subscription_count()
    }

    /// Schedule a re-render as if a dependency had changed.
    pub fn invalidate(&self) {
        batch::queue(&self.inner.observer);
    }

    /// Stop rendering and run the cleanup hooks. Idempotent.
    pub fn dispose(&self) {
        self.inner.teardown();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.observer.is_disposed()
    }
}

impl Debug for MountedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedComponent")
            .field("id", &self.inner.id)
            .field("render_count", &self.render_count())
            .field("mounted", &self.is_mounted())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{batch, run_microtasks};
    use crate::component::{on_cleanup, on_mount};
    use crate::reactive::State;

    /// Records every patch and returns the new tree unchanged.
    fn recording() -> (Rc<RefCell<Vec<VNode>>>, impl Patcher) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let patcher = {
            let log = log.clone();
            move |_old: &VNode, new: VNode| {
                log.borrow_mut().push(new.clone());
                new
            }
        };
        (log, patcher)
    }

    fn capture_failures() -> Rc<RefCell<Vec<ReactiveError>>> {
        let failures = Rc::new(RefCell::new(Vec::new()));
        let sink = failures.clone();
        Runtime::set_error_handler(move |failure| sink.borrow_mut().push(failure.clone()));
        failures
    }

    #[test]
    fn renders_on_mount_and_rerenders_once_per_batch() {
        let count = State::new(0);
        let (log, patcher) = recording();
        let component = {
            let count = count.clone();
            mount(
                move || Ok(move || Ok(VNode::text(count.get().to_string()))),
                patcher,
            )
        };
        assert_eq!(component.tree(), VNode::text("0"));
        assert_eq!(component.dependency_count(), 1);

        batch(|| {
            count.set(1);
            count.set(2);
            count.set(3);
        });

        assert_eq!(component.render_count(), 2);
        assert_eq!(*log.borrow(), vec![VNode::text("0"), VNode::text("3")]);
    }

    #[test]
    fn factory_runs_once() {
        let count = State::new(0);
        let factory_runs = Rc::new(Cell::new(0));
        let component = {
            let count = count.clone();
            let factory_runs = factory_runs.clone();
            mount(
                move || {
                    factory_runs.set(factory_runs.get() + 1);
                    Ok(move || Ok(VNode::text(count.get().to_string())))
                },
                |_: &VNode, new: VNode| new,
            )
        };

        count.set(1);
        run_microtasks();
        count.set(2);
        run_microtasks();

        assert_eq!(factory_runs.get(), 1);
        assert_eq!(component.render_count(), 3);
    }

    #[test]
    fn failing_factory_renders_empty_and_never_retries() {
        let failures = capture_failures();
        let component = mount(
            || Err::<fn() -> Result<VNode, ComponentError>, _>(ComponentError::msg("no data")),
            |_: &VNode, new: VNode| new,
        );
        Runtime::clear_error_handler();

        assert!(component.tree().is_empty());
        assert_eq!(component.render_count(), 0);
        assert!(!component.is_mounted());
        assert!(matches!(
            failures.borrow().as_slice(),
            [ReactiveError::ComponentInit { message, .. }] if message == "no data"
        ));

        component.invalidate();
        run_microtasks();
        assert_eq!(component.render_count(), 0);
    }

    #[test]
    fn failing_render_renders_empty_until_next_trigger() {
        let failures = capture_failures();
        let fail = State::new(true);
        let component = {
            let fail = fail.clone();
            mount(
                move || {
                    Ok(move || {
                        if fail.get() {
                            Err(ComponentError::msg("render failed"))
                        } else {
                            Ok(VNode::text("ok"))
                        }
                    })
                },
                |_: &VNode, new: VNode| new,
            )
        };

        assert!(component.tree().is_empty());
        assert_eq!(component.render_count(), 1);
        run_microtasks();
        assert_eq!(component.render_count(), 1);

        fail.set(false);
        run_microtasks();
        Runtime::clear_error_handler();

        assert_eq!(component.tree(), VNode::text("ok"));
        assert_eq!(component.render_count(), 2);
        assert_eq!(failures.borrow().len(), 1);
    }

    #[test]
    fn panicking_render_is_contained() {
        let failures = capture_failures();
        let component = mount(
            || Ok(|| -> Result<VNode, ComponentError> { panic!("render exploded") }),
            |_: &VNode, new: VNode| new,
        );
        Runtime::clear_error_handler();

        assert!(component.tree().is_empty());
        assert!(matches!(
            failures.borrow().as_slice(),
            [ReactiveError::ComponentRender { message, .. }] if message == "render exploded"
        ));
    }

    #[test]
    fn error_boundary_replaces_failed_output() {
        let failures = capture_failures();
        let component = Component::new(|| Ok(|| Err(ComponentError::msg("bad"))))
            .error_boundary(|err| VNode::text(format!("error: {err}")))
            .mount(|_: &VNode, new: VNode| new);
        Runtime::clear_error_handler();

        assert_eq!(component.tree(), VNode::text("error: bad"));
        assert!(failures.borrow().is_empty());
    }

    #[test]
    fn lifecycle_hooks_run_at_the_right_time() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let component = {
            let log = log.clone();
            mount(
                move || {
                    let mounted = log.clone();
                    on_mount(move || mounted.borrow_mut().push("mount"))?;
                    let cleaned = log.clone();
                    on_cleanup(move || cleaned.borrow_mut().push("cleanup"))?;
                    Ok(|| Ok(VNode::text("hi")))
                },
                |_: &VNode, new: VNode| new,
            )
        };
        assert_eq!(*log.borrow(), vec!["mount"]);

        component.invalidate();
        run_microtasks();
        assert_eq!(*log.borrow(), vec!["mount"]);

        component.dispose();
        component.dispose();
        assert_eq!(*log.borrow(), vec!["mount", "cleanup"]);
        assert!(component.is_disposed());
    }

    #[test]
    fn mount_hooks_wait_for_first_successful_render() {
        let fail = State::new(true);
        let mounts = Rc::new(Cell::new(0));
        Runtime::set_error_handler(|_| {});
        let component = {
            let fail = fail.clone();
            let mounts = mounts.clone();
            mount(
                move || {
                    on_mount(move || mounts.set(mounts.get() + 1))?;
                    Ok(move || {
                        if fail.get() {
                            Err(ComponentError::msg("not yet"))
                        } else {
                            Ok(VNode::Empty)
                        }
                    })
                },
                |_: &VNode, new: VNode| new,
            )
        };
        assert_eq!(mounts.get(), 0);

        fail.set(false);
        run_microtasks();
        Runtime::clear_error_handler();

        assert!(component.is_mounted());
        assert_eq!(mounts.get(), 1);
    }

    #[test]
    fn disposed_component_stops_rendering() {
        let count = State::new(0);
        let component = {
            let count = count.clone();
            mount(
                move || Ok(move || Ok(VNode::text(count.get().to_string()))),
                |_: &VNode, new: VNode| new,
            )
        };

        component.dispose();
        count.set(1);
        run_microtasks();

        assert_eq!(component.render_count(), 1);
        assert_eq!(count.signal().subscriber_count(), 0);
    }

    #[test]
    fn factory_reads_are_not_tracked_by_an_outer_observer() {
        let state = State::new(0);
        let outer = Observer::new(|| {});
        let _component = {
            let _frame = outer.observe();
            let state = state.clone();
            mount(
                move || {
                    state.get();
                    Ok(|| Ok(VNode::Empty))
                },
                |_: &VNode, new: VNode| new,
            )
        };
        assert_eq!(outer.subscription_count(), 0);
    }
}
