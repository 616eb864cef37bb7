//! Capability registry — the closed vocabulary generated code may reference.
//!
//! The registry is an ordered list of `(name, value)` pairs installed into
//! every compiled chunk's environment: UI node constructors, hook functions,
//! platform utilities, and the safe Luau stdlib subset. It is built once at
//! startup and never mutated. Any identifier outside this list resolves to
//! `nil` inside a chunk, so referencing it faults at execution time with a
//! Luau runtime error instead of crashing the host — that is the primary
//! containment property of the sandbox.

use std::cell::RefCell;
use std::rc::Rc;

use mlua::{Function, Lua, Table, Value, Variadic};
use rand::Rng;
use tracing::debug;

/// Per-mount hook storage. Slots persist across renders of one mount;
/// the cursor is reset at the start of each render.
#[derive(Default)]
pub struct HookFrame {
    pub slots: Vec<Value>,
    pub cursor: usize,
    pub dirty: bool,
}

pub type HookFrameRef = Rc<RefCell<HookFrame>>;

/// The "currently rendering" mount. Hook capabilities are process-wide
/// functions; this slot routes them to the right mount, the way a React
/// dispatcher does. Empty outside of render.
pub type HookDispatcher = Rc<RefCell<Option<HookFrameRef>>>;

/// Closed, ordered capability set. Immutable after [`CapabilityRegistry::install`].
pub struct CapabilityRegistry {
    caps: Table,
    names: Vec<String>,
}

impl CapabilityRegistry {
    /// Builds the capability table on the given Luau state.
    ///
    /// `dispatcher` is the shared hook-routing slot owned by the executor;
    /// `notices` collects `notify()` messages for the host to display after
    /// a render.
    pub fn install(
        lua: &Lua,
        dispatcher: HookDispatcher,
        notices: Rc<RefCell<Vec<String>>>,
    ) -> mlua::Result<Self> {
        let caps = lua.create_table()?;
        let mut names = Vec::new();

        let mut add = |name: &str, value: Value| -> mlua::Result<()> {
            caps.set(name, value)?;
            names.push(name.to_string());
            Ok(())
        };

        // ── UI node constructors ─────────────────────────────
        add("column", Value::Function(container(lua, "column")?))?;
        add("row", Value::Function(container(lua, "row")?))?;
        add("text", Value::Function(text_ctor(lua)?))?;
        add("button", Value::Function(button_ctor(lua)?))?;
        add("input", Value::Function(input_ctor(lua)?))?;
        add("progress", Value::Function(progress_ctor(lua)?))?;
        add("divider", Value::Function(leaf_ctor(lua, "divider")?))?;
        add("spacer", Value::Function(leaf_ctor(lua, "spacer")?))?;

        // ── Hooks ────────────────────────────────────────────
        add("use_state", Value::Function(use_state(lua, dispatcher.clone())?))?;
        add("use_ref", Value::Function(use_ref(lua, dispatcher)?))?;

        // ── Platform utilities ───────────────────────────────
        add("platform", Value::Table(platform_table(lua)?))?;
        add("clock", Value::Table(clock_table(lua)?))?;
        add("notify", Value::Function(notify_fn(lua, notices)?))?;
        add("rand_int", Value::Function(rand_int_fn(lua)?))?;
        add("log", Value::Function(log_fn(lua)?))?;
        add("print", Value::Function(log_fn(lua)?))?;

        // ── Safe Luau stdlib subset ──────────────────────────
        let globals = lua.globals();
        for name in ["math", "string", "table", "pairs", "ipairs", "select", "type", "tostring", "tonumber"] {
            add(name, globals.get::<Value>(name)?)?;
        }

        Ok(Self { caps, names })
    }

    /// The ordered capability vocabulary, in installation order. Fed into
    /// the generation prompts so the model knows the allowed surface.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Copies every capability into `env`, the environment table of one
    /// compiled chunk. Copying (instead of metatable fallback) keeps chunks
    /// from observing each other's global writes.
    pub fn populate_env(&self, env: &Table) -> mlua::Result<()> {
        for pair in self.caps.pairs::<Value, Value>() {
            let (k, v) = pair?;
            env.set(k, v)?;
        }
        Ok(())
    }
}

// ── UI constructors ──────────────────────────────────────────
//
// Each constructor returns a plain Luau table tagged with `kind`; the
// executor converts the returned tree into `UiNode` after render.

fn container(lua: &Lua, kind: &'static str) -> mlua::Result<Function> {
    lua.create_function(move |lua, children: Table| {
        let node = lua.create_table()?;
        node.set("kind", kind)?;
        node.set("children", children)?;
        Ok(node)
    })
}

fn text_ctor(lua: &Lua) -> mlua::Result<Function> {
    lua.create_function(|lua, (content, emphasis): (String, Option<bool>)| {
        let node = lua.create_table()?;
        node.set("kind", "text")?;
        node.set("content", content)?;
        node.set("emphasis", emphasis.unwrap_or(false))?;
        Ok(node)
    })
}

fn button_ctor(lua: &Lua) -> mlua::Result<Function> {
    lua.create_function(|lua, (label, on_press): (String, Option<Function>)| {
        let node = lua.create_table()?;
        node.set("kind", "button")?;
        node.set("label", label)?;
        if let Some(f) = on_press {
            node.set("on_press", f)?;
        }
        Ok(node)
    })
}

fn input_ctor(lua: &Lua) -> mlua::Result<Function> {
    lua.create_function(
        |lua, (value, placeholder, on_change): (Option<String>, Option<String>, Option<Function>)| {
            let node = lua.create_table()?;
            node.set("kind", "input")?;
            node.set("value", value.unwrap_or_default())?;
            node.set("placeholder", placeholder.unwrap_or_default())?;
            if let Some(f) = on_change {
                node.set("on_change", f)?;
            }
            Ok(node)
        },
    )
}

fn progress_ctor(lua: &Lua) -> mlua::Result<Function> {
    lua.create_function(|lua, (value, label): (f64, Option<String>)| {
        let node = lua.create_table()?;
        node.set("kind", "progress")?;
        node.set("value", value.clamp(0.0, 1.0))?;
        if let Some(l) = label {
            node.set("label", l)?;
        }
        Ok(node)
    })
}

fn leaf_ctor(lua: &Lua, kind: &'static str) -> mlua::Result<Function> {
    lua.create_function(move |lua, ()| {
        let node = lua.create_table()?;
        node.set("kind", kind)?;
        Ok(node)
    })
}

// ── Hooks ────────────────────────────────────────────────────

fn current_frame(dispatcher: &HookDispatcher, hook: &str) -> mlua::Result<HookFrameRef> {
    dispatcher
        .borrow()
        .as_ref()
        .cloned()
        .ok_or_else(|| mlua::Error::runtime(format!("{hook} called outside of render")))
}

/// `use_state(initial) -> value, setter`
///
/// Slot allocation follows call order, so hooks must be called
/// unconditionally at the top of the component, as in React.
fn use_state(lua: &Lua, dispatcher: HookDispatcher) -> mlua::Result<Function> {
    lua.create_function(move |lua, initial: Value| {
        let frame = current_frame(&dispatcher, "use_state")?;
        let idx = {
            let mut f = frame.borrow_mut();
            let idx = f.cursor;
            f.cursor += 1;
            if idx >= f.slots.len() {
                f.slots.push(initial);
            }
            idx
        };
        let value = frame.borrow().slots[idx].clone();

        // The setter captures the frame directly, so it keeps working from
        // event handlers, after the render dispatcher has been cleared.
        let setter_frame = frame.clone();
        let setter = lua.create_function(move |_, new: Value| {
            let mut f = setter_frame.borrow_mut();
            if idx < f.slots.len() {
                f.slots[idx] = new;
            }
            f.dirty = true;
            Ok(())
        })?;

        Ok((value, setter))
    })
}

/// `use_ref(initial) -> table` — a `{ current = ... }` table stable across
/// renders. Mutating `current` does not mark the mount dirty.
fn use_ref(lua: &Lua, dispatcher: HookDispatcher) -> mlua::Result<Function> {
    lua.create_function(move |lua, initial: Value| {
        let frame = current_frame(&dispatcher, "use_ref")?;
        let mut f = frame.borrow_mut();
        let idx = f.cursor;
        f.cursor += 1;
        if idx >= f.slots.len() {
            let holder = lua.create_table()?;
            holder.set("current", initial)?;
            f.slots.push(Value::Table(holder));
        }
        Ok(f.slots[idx].clone())
    })
}

// ── Platform utilities ───────────────────────────────────────

fn platform_table(lua: &Lua) -> mlua::Result<Table> {
    let t = lua.create_table()?;
    t.set("os", std::env::consts::OS)?;
    t.set("host", "terminal")?;
    t.set("version", env!("CARGO_PKG_VERSION"))?;
    t.set("columns", 80)?;
    Ok(t)
}

fn clock_table(lua: &Lua) -> mlua::Result<Table> {
    let t = lua.create_table()?;
    t.set(
        "now_ms",
        lua.create_function(|_, ()| Ok(chrono::Utc::now().timestamp_millis()))?,
    )?;
    t.set(
        "now_iso",
        lua.create_function(|_, ()| Ok(chrono::Utc::now().to_rfc3339()))?,
    )?;
    Ok(t)
}

fn notify_fn(lua: &Lua, notices: Rc<RefCell<Vec<String>>>) -> mlua::Result<Function> {
    lua.create_function(move |_, message: String| {
        notices.borrow_mut().push(message);
        Ok(())
    })
}

fn rand_int_fn(lua: &Lua) -> mlua::Result<Function> {
    lua.create_function(|_, (lo, hi): (i64, i64)| {
        if lo > hi {
            return Err(mlua::Error::runtime(format!(
                "rand_int: empty range {lo}..{hi}"
            )));
        }
        Ok(rand::thread_rng().gen_range(lo..=hi))
    })
}

/// `log(...)` / `print(...)` from generated code goes to tracing, never
/// to the host terminal directly.
fn log_fn(lua: &Lua) -> mlua::Result<Function> {
    lua.create_function(|_, args: Variadic<Value>| {
        let line = args
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(" ");
        debug!(target: "appforge::unit", "{line}");
        Ok(())
    })
}

fn display_value(v: &Value) -> String {
    match v {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.to_string_lossy().to_string(),
        other => format!("<{}>", other.type_name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(lua: &Lua) -> CapabilityRegistry {
        let dispatcher: HookDispatcher = Rc::new(RefCell::new(None));
        let notices = Rc::new(RefCell::new(Vec::new()));
        CapabilityRegistry::install(lua, dispatcher, notices).unwrap()
    }

    #[test]
    fn test_vocabulary_is_ordered_and_closed() {
        let lua = Lua::new();
        let reg = registry(&lua);
        let names = reg.names();
        // Installation order is the documented capability order.
        assert_eq!(names[0], "column");
        assert!(names.contains(&"use_state".to_string()));
        assert!(names.contains(&"tostring".to_string()));
        assert!(!names.contains(&"require".to_string()));
        assert!(!names.contains(&"loadstring".to_string()));
        assert_eq!(names.len(), reg.len());
    }

    #[test]
    fn test_populate_env_exposes_only_registry_names() {
        let lua = Lua::new();
        let reg = registry(&lua);
        let env = lua.create_table().unwrap();
        reg.populate_env(&env).unwrap();

        let text: Value = env.get("text").unwrap();
        assert!(matches!(text, Value::Function(_)));
        let os: Value = env.get("os").unwrap();
        assert!(matches!(os, Value::Nil));
        let io: Value = env.get("io").unwrap();
        assert!(matches!(io, Value::Nil));
    }

    #[test]
    fn test_use_state_outside_render_errors() {
        let lua = Lua::new();
        let reg = registry(&lua);
        let env = lua.create_table().unwrap();
        reg.populate_env(&env).unwrap();
        let result = lua
            .load("local v, set = use_state(1)")
            .set_environment(env)
            .exec();
        let err = match result.unwrap_err() {
            mlua::Error::CallbackError { cause, .. } => cause.to_string(),
            e => e.to_string(),
        };
        assert!(err.contains("outside of render"), "{err}");
    }

    #[test]
    fn test_notify_collects_messages() {
        let lua = Lua::new();
        let dispatcher: HookDispatcher = Rc::new(RefCell::new(None));
        let notices = Rc::new(RefCell::new(Vec::new()));
        let reg = CapabilityRegistry::install(&lua, dispatcher, notices.clone()).unwrap();
        let env = lua.create_table().unwrap();
        reg.populate_env(&env).unwrap();
        lua.load("notify(\"saved\")")
            .set_environment(env)
            .exec()
            .unwrap();
        assert_eq!(notices.borrow().as_slice(), ["saved"]);
    }
}
