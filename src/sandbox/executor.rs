//! Sandbox executor — compiles normalized source into callable components
//! inside a capability-restricted Luau state, and binds them to mounts.
//!
//! Each chunk is evaluated with a fresh environment table populated from the
//! capability registry, so the only reachable external names are the
//! registry's. The Luau state carries a heap limit and sandbox mode; a
//! misbehaving chunk faults, it does not take the host down.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mlua::{Function, Lua, Value};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ui::{RenderedTree, UiNode};

use super::cache::ComponentCache;
use super::fault::{FaultPhase, RuntimeFault};
use super::isolator::Mountable;
use super::normalize::{normalize, NormalizeError};
use super::registry::{CapabilityRegistry, HookDispatcher, HookFrame, HookFrameRef};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("syntax error in generated source: {0}")]
    Syntax(String),
    #[error("generated source failed to evaluate: {0}")]
    Eval(String),
    #[error("generated source produced {0}, not a component function")]
    NotAComponent(&'static str),
}

#[derive(Debug, Error)]
pub enum LoadErrorKind {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// A load failure, carrying the offending identity and source so the host
/// can offer retry/edit affordances and the fix loop can quote the code.
#[derive(Debug, Error)]
#[error("failed to load unit {identity}: {kind}")]
pub struct LoadError {
    pub identity: Uuid,
    pub source_text: String,
    #[source]
    pub kind: LoadErrorKind,
}

/// An opaque compiled component. Value-owned by the cache; exactly one per
/// identity at a time.
#[derive(Debug, Clone)]
pub struct CompiledComponent {
    func: Function,
}

impl CompiledComponent {
    pub fn from_function(func: Function) -> Self {
        Self { func }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxStats {
    pub loads: u64,
    pub compiles: u64,
    pub cached: usize,
}

/// Owns the Luau state, the capability registry, the component cache and
/// the hook dispatcher. Constructed once at startup and passed by reference;
/// single-writer, single-threaded by design.
pub struct Sandbox {
    lua: Lua,
    registry: CapabilityRegistry,
    cache: RefCell<ComponentCache>,
    dispatcher: HookDispatcher,
    notices: Rc<RefCell<Vec<String>>>,
    loads: Cell<u64>,
    compiles: Cell<u64>,
}

impl Sandbox {
    pub fn new(memory_limit_kb: usize) -> anyhow::Result<Self> {
        let lua = Lua::new();
        lua.sandbox(true).map_err(init_error)?;
        lua.set_memory_limit(memory_limit_kb * 1024)
            .map_err(init_error)?;

        let dispatcher: HookDispatcher = Rc::new(RefCell::new(None));
        let notices = Rc::new(RefCell::new(Vec::new()));
        let registry = CapabilityRegistry::install(&lua, dispatcher.clone(), notices.clone())
            .map_err(init_error)?;
        info!(
            "Sandbox ready: {} capabilities, {} KiB heap limit",
            registry.len(),
            memory_limit_kb
        );

        Ok(Self {
            lua,
            registry,
            cache: RefCell::new(ComponentCache::new()),
            dispatcher,
            notices,
            loads: Cell::new(0),
            compiles: Cell::new(0),
        })
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Compiles a normalized body into a component.
    ///
    /// The chunk's environment is a fresh table holding exactly the registry
    /// capabilities; evaluating it must synchronously yield a function.
    pub fn compile(&self, body: &str) -> Result<CompiledComponent, CompileError> {
        self.compiles.set(self.compiles.get() + 1);

        let env = self
            .lua
            .create_table()
            .map_err(|e| CompileError::Eval(e.to_string()))?;
        self.registry
            .populate_env(&env)
            .map_err(|e| CompileError::Eval(e.to_string()))?;

        let chunk_fn = self
            .lua
            .load(body)
            .set_name("generated-unit")
            .set_environment(env)
            .into_function()
            .map_err(compile_error)?;

        let result: Value = chunk_fn.call(()).map_err(compile_error)?;
        match result {
            Value::Function(func) => Ok(CompiledComponent { func }),
            other => Err(CompileError::NotAComponent(other.type_name())),
        }
    }

    /// Full load pipeline: cache lookup, then normalize → compile → validate
    /// → cache. A failure leaves the cache untouched, so the identity stays
    /// retryable with corrected source.
    pub fn load(&self, identity: Uuid, source: &str) -> Result<CompiledComponent, LoadError> {
        self.loads.set(self.loads.get() + 1);

        if let Some(component) = self.cache.borrow().get(identity) {
            debug!("cache hit for unit {identity}");
            return Ok(component);
        }

        let wrap = |kind: LoadErrorKind| LoadError {
            identity,
            source_text: source.to_string(),
            kind,
        };

        let body = normalize(source).map_err(|e| wrap(e.into()))?;
        let component = self.compile(&body).map_err(|e| wrap(e.into()))?;
        self.cache.borrow_mut().put(identity, component.clone());
        debug!("compiled and cached unit {identity}");
        Ok(component)
    }

    /// Binds a compiled component to a fresh hook frame.
    pub fn mount(&self, identity: Uuid, component: CompiledComponent) -> Mount {
        Mount {
            identity,
            func: component.func,
            frame: Rc::new(RefCell::new(HookFrame::default())),
            dispatcher: self.dispatcher.clone(),
        }
    }

    pub fn evict(&self, identity: Uuid) {
        self.cache.borrow_mut().evict(identity);
    }

    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn is_cached(&self, identity: Uuid) -> bool {
        self.cache.borrow().contains(identity)
    }

    pub fn stats(&self) -> SandboxStats {
        SandboxStats {
            loads: self.loads.get(),
            compiles: self.compiles.get(),
            cached: self.cache.borrow().len(),
        }
    }

    /// Messages queued by the `notify` capability since the last drain.
    pub fn drain_notices(&self) -> Vec<String> {
        std::mem::take(&mut self.notices.borrow_mut())
    }
}

// The Lua handles are not Send, so these errors cannot ride anyhow's
// blanket From conversion.
fn init_error(e: mlua::Error) -> anyhow::Error {
    anyhow::anyhow!("sandbox initialization failed: {e}")
}

fn compile_error(e: mlua::Error) -> CompileError {
    match e {
        mlua::Error::SyntaxError { message, .. } => CompileError::Syntax(message),
        mlua::Error::CallbackError { cause, .. } => CompileError::Eval(cause.to_string()),
        other => CompileError::Eval(other.to_string()),
    }
}

/// One mounted instance of a compiled component: the callable plus its hook
/// frame. State slots survive across renders; a re-mount starts fresh.
pub struct Mount {
    identity: Uuid,
    func: Function,
    frame: HookFrameRef,
    dispatcher: HookDispatcher,
}

impl Mount {
    pub fn identity(&self) -> Uuid {
        self.identity
    }

    /// True once a state setter ran since the last call; cleared on read.
    pub fn take_dirty(&self) -> bool {
        let mut frame = self.frame.borrow_mut();
        std::mem::take(&mut frame.dirty)
    }
}

impl Mountable for Mount {
    fn render(&self) -> Result<RenderedTree, RuntimeFault> {
        self.frame.borrow_mut().cursor = 0;
        *self.dispatcher.borrow_mut() = Some(self.frame.clone());
        let result: mlua::Result<Value> = self.func.call(());
        *self.dispatcher.borrow_mut() = None;

        let value = result.map_err(|e| RuntimeFault::from_lua(FaultPhase::Render, &e))?;
        let mut handlers = Vec::new();
        let root = UiNode::from_value(&value, &mut handlers).map_err(|e| RuntimeFault {
            phase: FaultPhase::Render,
            message: e.to_string(),
        })?;
        Ok(RenderedTree { root, handlers })
    }

    fn dispatch(
        &self,
        tree: &RenderedTree,
        handler: usize,
        payload: Option<&str>,
    ) -> Result<(), RuntimeFault> {
        let Some(func) = tree.handlers.get(handler) else {
            // Host-side routing bug, not a component fault.
            debug!("dispatch to unknown handler {handler} on unit {}", self.identity);
            return Ok(());
        };
        let result = match payload {
            Some(text) => func.call::<()>(text),
            None => func.call::<()>(()),
        };
        result.map_err(|e| RuntimeFault::from_lua(FaultPhase::Update, &e))
    }
}
