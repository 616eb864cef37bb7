//! Fault boundary around one mounted component subtree.
//!
//! The boundary intercepts faults raised during render or event dispatch
//! and keeps them out of the host UI. `Mounted → Faulted` is the only
//! failure transition; while faulted, the subtree produces zero renders
//! until an explicit reset re-mounts it.

use tracing::warn;
use uuid::Uuid;

use crate::ui::RenderedTree;

use super::fault::{FaultRecord, RuntimeFault};

/// Anything the boundary can wrap: a render operation plus an event
/// channel, both reporting faults as typed values instead of panicking.
pub trait Mountable {
    fn render(&self) -> Result<RenderedTree, RuntimeFault>;

    fn dispatch(
        &self,
        tree: &RenderedTree,
        handler: usize,
        payload: Option<&str>,
    ) -> Result<(), RuntimeFault>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryState {
    Mounted,
    Faulted,
}

pub enum RenderOutcome {
    Rendered(RenderedTree),
    /// The boundary is faulted; the subtree was not rendered.
    Skipped,
}

type FaultCallback = Box<dyn FnMut(&FaultRecord)>;

pub struct FaultBoundary<M: Mountable> {
    inner: M,
    identity: Uuid,
    source_snapshot: String,
    state: BoundaryState,
    fault: Option<FaultRecord>,
    on_fault: Option<FaultCallback>,
}

impl<M: Mountable> FaultBoundary<M> {
    /// Wraps a mounted unit. `source` is snapshotted for fault packaging.
    pub fn new(inner: M, identity: Uuid, source: &str) -> Self {
        Self {
            inner,
            identity,
            source_snapshot: source.to_string(),
            state: BoundaryState::Mounted,
            fault: None,
            on_fault: None,
        }
    }

    /// Callback invoked exactly once per `Mounted → Faulted` transition.
    pub fn set_on_fault(&mut self, callback: FaultCallback) {
        self.on_fault = Some(callback);
    }

    pub fn state(&self) -> BoundaryState {
        self.state
    }

    pub fn is_faulted(&self) -> bool {
        self.state == BoundaryState::Faulted
    }

    pub fn fault(&self) -> Option<&FaultRecord> {
        self.fault.as_ref()
    }

    /// Removes the fault record, typically after a fix request was issued.
    pub fn take_fault(&mut self) -> Option<FaultRecord> {
        self.fault.take()
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    /// Renders the wrapped subtree, or skips it entirely while faulted.
    pub fn render(&mut self) -> RenderOutcome {
        if self.is_faulted() {
            return RenderOutcome::Skipped;
        }
        match self.inner.render() {
            Ok(tree) => RenderOutcome::Rendered(tree),
            Err(fault) => {
                self.trip(fault);
                RenderOutcome::Skipped
            }
        }
    }

    /// Routes an event to the wrapped subtree. Returns `false` when the
    /// event was not delivered (already faulted, or faulted just now).
    pub fn dispatch(&mut self, tree: &RenderedTree, handler: usize, payload: Option<&str>) -> bool {
        if self.is_faulted() {
            return false;
        }
        match self.inner.dispatch(tree, handler, payload) {
            Ok(()) => true,
            Err(fault) => {
                self.trip(fault);
                false
            }
        }
    }

    /// Returns to `Mounted`, optionally swapping in a newly loaded unit
    /// (with its source snapshot for future fault packaging).
    pub fn reset(&mut self, replacement: Option<(M, Uuid, String)>) {
        if let Some((inner, identity, source)) = replacement {
            self.inner = inner;
            self.identity = identity;
            self.source_snapshot = source;
        }
        self.state = BoundaryState::Mounted;
        self.fault = None;
    }

    fn trip(&mut self, fault: RuntimeFault) {
        // Mounted → Faulted is the only failure transition; a fault while
        // already faulted is unreachable because render/dispatch skip first.
        warn!("unit {} faulted: {}", self.identity, fault);
        let record = FaultRecord::capture(&fault, self.identity, &self.source_snapshot);
        if let Some(callback) = self.on_fault.as_mut() {
            callback(&record);
        }
        self.fault = Some(record);
        self.state = BoundaryState::Faulted;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::sandbox::fault::FaultPhase;
    use crate::ui::UiNode;

    /// Test double: counts renders, faults on demand.
    struct TestMount {
        renders: Rc<Cell<u32>>,
        fail_render: Cell<bool>,
        fail_dispatch: bool,
    }

    impl TestMount {
        fn new() -> (Self, Rc<Cell<u32>>) {
            let renders = Rc::new(Cell::new(0));
            (
                Self {
                    renders: renders.clone(),
                    fail_render: Cell::new(false),
                    fail_dispatch: false,
                },
                renders,
            )
        }
    }

    impl Mountable for TestMount {
        fn render(&self) -> Result<RenderedTree, RuntimeFault> {
            self.renders.set(self.renders.get() + 1);
            if self.fail_render.get() {
                return Err(RuntimeFault {
                    phase: FaultPhase::Render,
                    message: "boom".to_string(),
                });
            }
            Ok(RenderedTree {
                root: UiNode::Text {
                    content: "ok".to_string(),
                    emphasis: false,
                },
                handlers: Vec::new(),
            })
        }

        fn dispatch(
            &self,
            _tree: &RenderedTree,
            _handler: usize,
            _payload: Option<&str>,
        ) -> Result<(), RuntimeFault> {
            if self.fail_dispatch {
                return Err(RuntimeFault {
                    phase: FaultPhase::Update,
                    message: "handler boom".to_string(),
                });
            }
            Ok(())
        }
    }

    fn boundary(mount: TestMount) -> FaultBoundary<TestMount> {
        FaultBoundary::new(mount, Uuid::new_v4(), "return App")
    }

    #[test]
    fn test_faulted_subtree_renders_zero_times_until_reset() {
        let (mount, renders) = TestMount::new();
        mount.fail_render.set(true);
        let mut b = boundary(mount);

        assert!(matches!(b.render(), RenderOutcome::Skipped));
        assert!(b.is_faulted());
        assert_eq!(renders.get(), 1);

        // Further renders never reach the subtree.
        assert!(matches!(b.render(), RenderOutcome::Skipped));
        assert!(matches!(b.render(), RenderOutcome::Skipped));
        assert_eq!(renders.get(), 1);

        b.inner().fail_render.set(false);
        b.reset(None);
        assert!(!b.is_faulted());
        assert!(matches!(b.render(), RenderOutcome::Rendered(_)));
        assert_eq!(renders.get(), 2);
    }

    #[test]
    fn test_on_fault_invoked_exactly_once_per_transition() {
        let (mount, _) = TestMount::new();
        mount.fail_render.set(true);
        let mut b = boundary(mount);

        let calls = Rc::new(Cell::new(0));
        let calls_cb = calls.clone();
        b.set_on_fault(Box::new(move |_| calls_cb.set(calls_cb.get() + 1)));

        b.render();
        b.render();
        b.render();
        assert_eq!(calls.get(), 1);

        b.inner().fail_render.set(true);
        b.reset(None);
        b.render();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_dispatch_fault_transitions_to_faulted() {
        let (mut mount, _) = TestMount::new();
        mount.fail_dispatch = true;
        let mut b = boundary(mount);

        let tree = match b.render() {
            RenderOutcome::Rendered(tree) => tree,
            RenderOutcome::Skipped => panic!("expected render"),
        };
        assert!(!b.dispatch(&tree, 0, None));
        assert!(b.is_faulted());
        assert_eq!(b.fault().unwrap().phase, FaultPhase::Update);
        // Events are dropped while faulted.
        assert!(!b.dispatch(&tree, 0, None));
    }

    #[test]
    fn test_fault_record_carries_source_snapshot() {
        let (mount, _) = TestMount::new();
        mount.fail_render.set(true);
        let mut b = boundary(mount);
        b.render();
        let record = b.fault().unwrap();
        assert_eq!(record.source_snapshot, "return App");
        assert_eq!(record.message, "boom");
    }

    #[test]
    fn test_reset_with_replacement_swaps_unit() {
        let (mount, _) = TestMount::new();
        mount.fail_render.set(true);
        let mut b = boundary(mount);
        b.render();
        assert!(b.is_faulted());

        let (fixed, renders) = TestMount::new();
        let new_id = Uuid::new_v4();
        b.reset(Some((fixed, new_id, "return Fixed".to_string())));
        assert!(!b.is_faulted());
        assert!(b.fault().is_none());
        assert!(matches!(b.render(), RenderOutcome::Rendered(_)));
        assert_eq!(renders.get(), 1);
    }
}
