//! Interactive terminal host.
//!
//! Routes user text into the generation loop, mounts loaded components
//! behind the fault boundary, renders them as text, and drives the
//! fault → fix-request → reload cycle. All storage access happens here;
//! the sandbox core never touches it.

use std::time::Instant;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::generate::{GenerateError, Orchestrator};
use crate::sandbox::{
    package_fix_request, FaultBoundary, FaultRecord, LoadError, Mount, RenderOutcome, Sandbox,
};
use crate::store::UnitStore;
use crate::ui::{render_to_text, RenderedTree};
use crate::unit::GeneratedUnit;

/// One opened unit: its record, the fault boundary around its mount, and
/// the last rendered tree (for event routing).
struct OpenUnit {
    unit: GeneratedUnit,
    boundary: FaultBoundary<Mount>,
    tree: Option<RenderedTree>,
}

pub struct Host {
    config: Config,
    store: UnitStore,
    sandbox: Sandbox,
    orchestrator: Orchestrator,
    llm_description: String,
    session: Option<OpenUnit>,
    /// Last request text and its fix-mode flag, kept for the retry
    /// affordance after a load failure.
    pending_retry: Option<(String, bool)>,
    start_time: Instant,
}

impl Host {
    pub fn new(
        config: Config,
        store: UnitStore,
        sandbox: Sandbox,
        orchestrator: Orchestrator,
        llm_description: String,
    ) -> Self {
        Self {
            config,
            store,
            sandbox,
            orchestrator,
            llm_description,
            session: None,
            pending_retry: None,
            start_time: Instant::now(),
        }
    }

    /// Main input loop. Returns on EOF or `/quit`.
    pub async fn run(&mut self) -> Result<()> {
        println!("{}", self.gallery());
        println!("Describe an app to generate it, or type /help for commands.\n");

        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if !self.handle(&line).await? {
                info!("Host loop exiting");
                return Ok(());
            }
        }
        // stdin closed
        Ok(())
    }

    /// Handles one input line. Returns false to exit.
    async fn handle(&mut self, line: &str) -> Result<bool> {
        if let Some(rest) = line.strip_prefix('/') {
            return self.handle_command(rest).await;
        }
        if let Some(rest) = line.strip_prefix("tap ") {
            self.handle_tap(rest);
            return Ok(true);
        }
        if let Some(rest) = line.strip_prefix("type ") {
            self.handle_type(rest);
            return Ok(true);
        }
        if line == "r" {
            if let Some((request, fix_mode)) = self.pending_retry.take() {
                println!("Retrying…");
                self.generate(&request, fix_mode).await;
                return Ok(true);
            }
        }
        self.generate(line, false).await;
        Ok(true)
    }

    async fn handle_command(&mut self, command: &str) -> Result<bool> {
        let (name, arg) = match command.split_once(' ') {
            Some((n, a)) => (n, a.trim()),
            None => (command, ""),
        };
        match name {
            "quit" | "exit" => return Ok(false),
            "help" => println!("{}", self.help()),
            "status" => println!("{}", self.status()),
            "apps" => println!("{}", self.gallery()),
            "open" => self.cmd_open(arg),
            "delete" => self.cmd_delete(arg)?,
            "new" | "back" => {
                // Returning to a neutral screen clears the authoring session.
                self.session = None;
                self.pending_retry = None;
                self.orchestrator.reset();
                println!("{}", self.gallery());
            }
            "clear" => {
                self.sandbox.clear_cache();
                println!("Compiled component cache cleared.");
            }
            "clear-apps" => {
                self.store.clear_all()?;
                self.sandbox.clear_cache();
                self.session = None;
                println!("All saved apps deleted.");
            }
            "fix" => self.cmd_fix().await,
            other => println!("Unknown command: /{other}\nType /help for available commands."),
        }
        Ok(true)
    }

    // ── Generation flow ──────────────────────────────────

    async fn generate(&mut self, request: &str, fix_mode: bool) {
        // A fresh creation request while a unit is open starts a new
        // authoring session; the old transcript does not carry over. Skipped
        // while awaiting so the in-flight request still gets its Busy answer.
        if !fix_mode && self.session.is_some() && !self.orchestrator.is_awaiting() {
            self.orchestrator.reset();
        }
        println!("Generating…");
        let result = match self.orchestrator.submit(request, fix_mode).await {
            Ok(Some(result)) => result,
            Ok(None) => return, // stale reply after a reset, already discarded
            Err(GenerateError::Busy) => {
                println!("Still waiting for the previous request — one at a time.");
                return;
            }
            Err(e) => {
                error!("Generation failed: {e}");
                println!("Generation failed: {e}\nCheck your API key and connection, then try again.");
                return;
            }
        };

        if result.truncated {
            warn!("Generated source may be incomplete (reply was truncated)");
            println!("⚠ The reply looks truncated; the app may be incomplete.");
        }
        if !result.has_source() {
            // Conversational reply, nothing to load.
            println!("{}", result.narrative);
            return;
        }

        // Every generation, fix included, becomes a fresh unit.
        let unit = GeneratedUnit::from_result(&result);
        println!("{} — {}", unit.label(), unit.description);
        self.open_unit(unit, Some((request.to_string(), fix_mode)));
    }

    /// Loads and mounts a unit; on success it is persisted and shown. When a
    /// unit is already open (the fix flow), its boundary is reset with the
    /// replacement mount instead of being rebuilt.
    fn open_unit(&mut self, unit: GeneratedUnit, retry_request: Option<(String, bool)>) {
        match self.sandbox.load(unit.identity, &unit.source) {
            Ok(component) => {
                let mount = self.sandbox.mount(unit.identity, component);
                if let Err(e) = self.store.save(&unit) {
                    warn!("Could not persist unit: {e}");
                }
                self.pending_retry = None;
                match self.session.as_mut() {
                    Some(open) => {
                        open.boundary
                            .reset(Some((mount, unit.identity, unit.source.clone())));
                        open.unit = unit;
                        open.tree = None;
                    }
                    None => {
                        let mut boundary = FaultBoundary::new(mount, unit.identity, &unit.source);
                        boundary.set_on_fault(Box::new(on_fault));
                        self.session = Some(OpenUnit {
                            unit,
                            boundary,
                            tree: None,
                        });
                    }
                }
                self.redraw();
            }
            Err(e) => self.show_load_failure(&e, retry_request),
        }
    }

    fn show_load_failure(&mut self, e: &LoadError, retry_request: Option<(String, bool)>) {
        error!("Load failed for unit {}: {}", e.identity, e.kind);
        println!("The generated code could not be loaded:\n  {e}");
        self.pending_retry = retry_request;
        if self.pending_retry.is_some() {
            println!("Type r to retry the same request, or describe a change to try again.");
        } else {
            println!("Describe a change to try again.");
        }
    }

    async fn cmd_fix(&mut self) {
        let Some(open) = self.session.as_mut() else {
            println!("No app is open.");
            return;
        };
        // The record is discarded once the fix request is issued.
        let Some(record) = open.boundary.take_fault() else {
            println!("The open app has no pending fault.");
            return;
        };
        let request = package_fix_request(&record, &open.unit.name);
        info!("Requesting AI fix for unit {}", record.identity);
        self.generate(&request, true).await;
    }

    // ── Rendering and events ─────────────────────────────

    fn redraw(&mut self) {
        let Some(open) = self.session.as_mut() else {
            return;
        };
        println!("\n┌─ {} ─────", open.unit.label());
        match open.boundary.render() {
            RenderOutcome::Rendered(tree) => {
                println!("{}", render_to_text(&tree.root));
                open.tree = Some(tree);
                for notice in self.sandbox.drain_notices() {
                    println!("🔔 {notice}");
                }
                println!("└─ tap N / type N <text> / /fix / /back");
            }
            RenderOutcome::Skipped => {
                let (message, hint) = match open.boundary.fault() {
                    Some(record) => (record.message.clone(), suggestion(&record.message)),
                    None => ("unknown fault".to_string(), ""),
                };
                open.tree = None;
                println!("🐛 Oops! Something went wrong.\n  {message}");
                if !hint.is_empty() {
                    println!("  {hint}");
                }
                println!("└─ 🤖 /fix to ask the AI to repair it, /back for the gallery");
            }
        }
    }

    fn handle_tap(&mut self, arg: &str) {
        self.dispatch_event(arg, None);
    }

    fn handle_type(&mut self, arg: &str) {
        let Some((n, text)) = arg.split_once(' ') else {
            println!("Usage: type N <text>");
            return;
        };
        let text = text.to_string();
        self.dispatch_event(n, Some(text));
    }

    fn dispatch_event(&mut self, index: &str, payload: Option<String>) {
        let Some(open) = self.session.as_mut() else {
            println!("No app is open.");
            return;
        };
        let Ok(n) = index.trim().parse::<usize>() else {
            println!("Not a control number: {index}");
            return;
        };
        let Some(tree) = open.tree.take() else {
            println!("Nothing rendered to interact with.");
            return;
        };
        if n == 0 || n > tree.handlers.len() {
            println!("No control number {n}.");
            open.tree = Some(tree);
            return;
        }

        let delivered = open.boundary.dispatch(&tree, n - 1, payload.as_deref());
        open.tree = Some(tree);
        if !delivered || open.boundary.inner().take_dirty() {
            self.redraw();
        }
    }

    // ── Gallery and info screens ─────────────────────────

    fn cmd_open(&mut self, arg: &str) {
        let units = self.store.list();
        let Ok(n) = arg.parse::<usize>() else {
            println!("Usage: /open N (see /apps)");
            return;
        };
        let Some(stored) = units.get(n.wrapping_sub(1)) else {
            println!("No app number {n}.");
            return;
        };
        if let Err(e) = self.store.touch_last_opened(stored.unit.identity) {
            warn!("Could not update last-opened timestamp: {e}");
        }
        self.orchestrator.reset();
        self.open_unit(stored.unit.clone(), None);
    }

    fn cmd_delete(&mut self, arg: &str) -> Result<()> {
        let units = self.store.list();
        let Ok(n) = arg.parse::<usize>() else {
            println!("Usage: /delete N (see /apps)");
            return Ok(());
        };
        let Some(stored) = units.get(n.wrapping_sub(1)) else {
            println!("No app number {n}.");
            return Ok(());
        };
        let identity = stored.unit.identity;
        self.store.delete(identity)?;
        // Keep the cache in step with the host's unit list.
        self.sandbox.evict(identity);
        if self.session.as_ref().map(|o| o.unit.identity) == Some(identity) {
            self.session = None;
        }
        println!("Deleted {}.", stored.unit.label());
        Ok(())
    }

    fn gallery(&self) -> String {
        let units = self.store.list();
        if units.is_empty() {
            return format!("{} — no saved apps yet.", self.config.agent.name);
        }
        let mut out = format!("{} — saved apps:\n", self.config.agent.name);
        for (i, stored) in units.iter().enumerate() {
            out.push_str(&format!(
                "  {}. {} — {}\n",
                i + 1,
                stored.unit.label(),
                stored.unit.description
            ));
        }
        out.push_str("Open one with /open N.");
        out
    }

    fn status(&self) -> String {
        let uptime = self.start_time.elapsed();
        let hours = uptime.as_secs() / 3600;
        let minutes = (uptime.as_secs() % 3600) / 60;
        let stats = self.sandbox.stats();

        format!(
            "{} — status\n\
             Uptime: {hours}h {minutes}m\n\
             LLM: {}\n\
             Saved apps: {}\n\
             Sandbox: {} loads, {} compiles, {} cached",
            self.config.agent.name,
            self.llm_description,
            self.store.list().len(),
            stats.loads,
            stats.compiles,
            stats.cached,
        )
    }

    fn help(&self) -> String {
        "\
Commands:\n\
  <request>      — Describe an app to generate it\n\
  tap N          — Press button N of the open app\n\
  type N <text>  — Type into input N of the open app\n\
  /apps          — List saved apps\n\
  /open N        — Open a saved app\n\
  /delete N      — Delete a saved app\n\
  /fix           — Ask the AI to fix the open app's fault\n\
  /new, /back    — Close the app and start a fresh session\n\
  /clear         — Drop all compiled components (sources are kept)\n\
  /clear-apps    — Delete every saved app\n\
  /status        — Runtime info and sandbox stats\n\
  /quit          — Exit"
            .to_string()
    }
}

/// Invoked exactly once per fault transition by the boundary.
fn on_fault(record: &FaultRecord) {
    error!(
        "unit {} faulted during {}: {}",
        record.identity, record.phase, record.message
    );
}

/// Human hint shown on the fault screen, keyed off the error text.
fn suggestion(message: &str) -> &'static str {
    if message.contains("nil") {
        "This looks like a reference to a name that doesn't exist. The AI can fix the missing declaration."
    } else if message.contains("syntax") {
        "This looks like a syntax error. The AI can fix the component structure."
    } else if message.contains("outside of render") {
        "Hooks were called conditionally. The AI can restructure the component."
    } else {
        "The AI can analyze and fix this error for you."
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::config::{AgentConfig, LlmConfig, SandboxConfig, StorageConfig};
    use crate::llm::{LlmClient, LlmResponse, Message};

    struct MockLlm {
        reply: String,
    }

    #[async_trait]
    impl LlmClient for MockLlm {
        async fn complete(&self, _system: &str, _messages: &[Message]) -> Result<LlmResponse> {
            Ok(LlmResponse {
                text: self.reply.clone(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }

        fn description(&self) -> String {
            "mock".to_string()
        }
    }

    const REPLY: &str = "🧮 Counter - counts\n```lua\nlocal App = function()\n  return text(\"hi\")\nend\nreturn App\n```";

    fn host(dir: &std::path::Path) -> Host {
        let config = Config {
            llm: LlmConfig {
                provider: "anthropic".to_string(),
                model: "m".to_string(),
                api_key: "k".to_string(),
                max_tokens_per_request: 100,
                request_timeout_secs: 5,
            },
            agent: AgentConfig {
                name: "AppForge".to_string(),
            },
            storage: StorageConfig {
                path: dir.to_path_buf(),
            },
            sandbox: SandboxConfig::default(),
        };
        let sandbox = Sandbox::new(1024).unwrap();
        let store = UnitStore::open(dir).unwrap();
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlm {
            reply: REPLY.to_string(),
        });
        let orchestrator = Orchestrator::new(llm, sandbox.registry().names().to_vec());
        Host::new(config, store, sandbox, orchestrator, "mock".to_string())
    }

    #[tokio::test]
    async fn test_new_request_over_open_unit_starts_fresh_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = host(dir.path());

        h.generate("make a counter", false).await;
        assert!(h.session.is_some());
        assert_eq!(h.orchestrator.turns().len(), 2);

        h.generate("make a timer", false).await;
        // The transcript belongs to the new session only.
        assert_eq!(h.orchestrator.turns().len(), 2);
        assert_eq!(h.store.list().len(), 2);
    }

    #[tokio::test]
    async fn test_clear_apps_empties_store_and_closes_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = host(dir.path());
        h.generate("make a counter", false).await;
        assert_eq!(h.store.list().len(), 1);

        assert!(h.handle("/clear-apps").await.unwrap());
        assert!(h.store.list().is_empty());
        assert!(h.session.is_none());
    }
}
