use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::command::Command;
use crate::error::{Result, VoxpilotError};
use crate::executor::{CommandExecutor, PageDriver, RelayOps};
use crate::interpret::{InterpretationResult, Interpreter};
use crate::page::{sanitize, ContextId, SnapshotOptions};
use crate::relay::{ExtensionEvents, VarStore};
use crate::session::{InterpretOutcome, Session, APOLOGY};

/// The privileged control context.
///
/// Receives requests from the page side of the bridge and routes them:
/// page-lifecycle events refresh the session snapshot, spoken text goes
/// through the interpreter and (when decided) the executor, and
/// privilege-needing commands land on the relay. Every failure degrades to a
/// reply or a log line; nothing here takes the process down.
pub struct Control {
    session: Arc<Session>,
    store: Arc<VarStore>,
    executor: CommandExecutor,
    driver: Arc<dyn PageDriver>,
    relay: Arc<dyn RelayOps>,
    interpreter: Arc<dyn Interpreter>,
    snapshot_opts: SnapshotOptions,
}

impl Control {
    pub fn new(
        session: Arc<Session>,
        store: Arc<VarStore>,
        driver: Arc<dyn PageDriver>,
        relay: Arc<dyn RelayOps>,
        interpreter: Arc<dyn Interpreter>,
        snapshot_opts: SnapshotOptions,
    ) -> Self {
        Self {
            executor: CommandExecutor::new(driver.clone(), relay.clone()),
            session,
            store,
            driver,
            relay,
            interpreter,
            snapshot_opts,
        }
    }

    /// Capture and sanitize the page, superseding the stored snapshot.
    /// Runs on every navigation-complete and tab-switch event.
    async fn refresh_snapshot(&self, ctx: ContextId) -> Result<usize> {
        let dom = self.driver.capture(ctx).await?;
        let snapshot = sanitize(&dom, &self.snapshot_opts);
        let count = snapshot.elements.len();
        self.session.replace_snapshot(ctx, snapshot);
        tracing::info!(ctx, elements = count, "snapshot refreshed");
        Ok(count)
    }

    /// Run one spoken instruction end to end: interpret against the current
    /// snapshot, then either execute the decided command or hand the
    /// clarifying question back to be spoken. Collaborator failures become
    /// an apology rather than an error reply, since the user is waiting.
    async fn handle_utterance(&self, ctx: ContextId, text: &str) -> Value {
        let outcome = match self
            .session
            .interpret(self.interpreter.as_ref(), ctx, text)
            .await
        {
            Ok(outcome) => outcome,
            Err(VoxpilotError::NotReady) => {
                return json!({
                    "type": "notReady",
                    "message": VoxpilotError::NotReady.to_string(),
                });
            }
            Err(e) => {
                tracing::error!(ctx, error = %e, "interpretation round-trip failed");
                return json!({ "type": "apology", "message": APOLOGY });
            }
        };

        match outcome {
            InterpretOutcome::Superseded => json!({ "type": "superseded" }),
            InterpretOutcome::Decided(InterpretationResult::Clarification { question }) => {
                json!({ "type": "clarification", "question": question })
            }
            InterpretOutcome::Decided(InterpretationResult::Action { command }) => {
                match self.executor.execute(ctx, &command).await {
                    Ok(outcome) => json!({
                        "type": "action",
                        "key": command.key(),
                        "message": outcome.describe(),
                    }),
                    Err(e) => {
                        tracing::error!(ctx, error = %e, "command execution failed");
                        json!({ "type": "apology", "message": APOLOGY })
                    }
                }
            }
        }
    }

    fn ctx_of(message: &Value) -> Result<ContextId> {
        message
            .get("tab")
            .and_then(|t| t.as_u64())
            .map(|t| t as u32)
            .ok_or_else(|| VoxpilotError::InvalidCommand("missing tab id".to_string()))
    }

    fn str_field<'a>(message: &'a Value, field: &str) -> Result<&'a str> {
        message
            .get(field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| VoxpilotError::InvalidCommand(format!("missing field: {}", field)))
    }
}

#[async_trait]
impl ExtensionEvents for Control {
    async fn on_request(&self, action: &str, message: Value) -> Result<Value> {
        match action {
            // Navigation completed or tab switched; the old snapshot for
            // this context is dead either way.
            "pageReady" => {
                let ctx = Self::ctx_of(&message)?;
                let elements = self.refresh_snapshot(ctx).await?;
                Ok(json!({ "elements": elements }))
            }

            "utterance" => {
                let ctx = Self::ctx_of(&message)?;
                let text = Self::str_field(&message, "text")?;
                Ok(self.handle_utterance(ctx, text).await)
            }

            // A pre-formed command, e.g. replayed from the stored
            // lastCommand. An unknown key fails parsing here and is
            // reported, never acted on.
            "execute" => {
                let ctx = Self::ctx_of(&message)?;
                let raw = message
                    .get("command")
                    .cloned()
                    .ok_or_else(|| VoxpilotError::InvalidCommand("missing command".to_string()))?;
                let command: Command = serde_json::from_value(raw)
                    .map_err(|e| VoxpilotError::InvalidCommand(e.to_string()))?;
                let outcome = self.executor.execute(ctx, &command).await?;
                Ok(json!({ "message": outcome.describe() }))
            }

            "search" => {
                let query = Self::str_field(&message, "query")?;
                let origin = message.get("tab").and_then(|t| t.as_u64()).map(|t| t as u32);
                self.relay.search(query, origin).await?;
                Ok(json!({ "ok": true }))
            }

            "addBookmark" => {
                let ctx = Self::ctx_of(&message)?;
                self.relay.bookmark(ctx).await?;
                Ok(json!({ "ok": true }))
            }

            "setVar" => {
                let key = Self::str_field(&message, "key")?;
                let value = message.get("value").cloned().unwrap_or(Value::Null);
                self.store.set(key, value);
                Ok(json!({ "ok": true }))
            }

            "getVar" => {
                let key = Self::str_field(&message, "key")?;
                Ok(json!({ "value": self.store.get(key) }))
            }

            "clearVar" => {
                let key = Self::str_field(&message, "key")?;
                Ok(json!({ "cleared": self.store.clear(key) }))
            }

            other => Err(VoxpilotError::InvalidCommand(format!(
                "unknown action: \"{}\"",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::command::Target;
    use crate::page::{PageDom, PageNode, PageSnapshot};

    struct FakeDriver {
        dom: PageDom,
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        async fn capture(&self, _ctx: ContextId) -> Result<PageDom> {
            Ok(self.dom.clone())
        }
        async fn click(&self, _ctx: ContextId, _node: u32) -> Result<()> {
            Ok(())
        }
        async fn hover(&self, _ctx: ContextId, _node: u32) -> Result<()> {
            Ok(())
        }
        async fn set_value(&self, _ctx: ContextId, _node: u32, _value: &str) -> Result<()> {
            Ok(())
        }
        async fn history_go(&self, _ctx: ContextId, _delta: i32) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRelay {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RelayOps for FakeRelay {
        async fn search(&self, query: &str, origin: Option<ContextId>) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("search:{}:{:?}", query, origin));
            Ok(())
        }
        async fn bookmark(&self, ctx: ContextId) -> Result<()> {
            self.calls.lock().unwrap().push(format!("bookmark:{}", ctx));
            Ok(())
        }
    }

    enum Scripted {
        Action(Command),
        Clarify(String),
        Fail,
    }

    struct FakeInterpreter {
        script: Scripted,
    }

    #[async_trait]
    impl Interpreter for FakeInterpreter {
        async fn interpret(
            &self,
            _user_text: &str,
            _snapshot: &PageSnapshot,
        ) -> Result<InterpretationResult> {
            match &self.script {
                Scripted::Action(cmd) => Ok(InterpretationResult::Action {
                    command: cmd.clone(),
                }),
                Scripted::Clarify(q) => Ok(InterpretationResult::Clarification {
                    question: q.clone(),
                }),
                Scripted::Fail => Err(VoxpilotError::InterpreterError("503".to_string())),
            }
        }
    }

    fn login_dom() -> PageDom {
        PageDom {
            url: "https://example.com".to_string(),
            nodes: vec![PageNode {
                id: 1,
                tag: "button".to_string(),
                text: "Login".to_string(),
                attrs: HashMap::new(),
                visible: true,
                control: None,
            }],
        }
    }

    fn control(script: Scripted) -> (Control, Arc<FakeRelay>) {
        let store = Arc::new(VarStore::new());
        let relay = Arc::new(FakeRelay::default());
        let control = Control::new(
            Arc::new(Session::new(store.clone())),
            store,
            Arc::new(FakeDriver { dom: login_dom() }),
            relay.clone(),
            Arc::new(FakeInterpreter { script }),
            SnapshotOptions::default(),
        );
        (control, relay)
    }

    #[tokio::test]
    async fn page_ready_installs_a_snapshot_and_utterances_execute() {
        let (control, _) = control(Scripted::Action(Command::Click(Target::new("Login"))));

        let reply = control
            .on_request("pageReady", json!({ "tab": 1 }))
            .await
            .unwrap();
        assert_eq!(reply["elements"], 1);

        let reply = control
            .on_request("utterance", json!({ "tab": 1, "text": "click login" }))
            .await
            .unwrap();
        assert_eq!(reply["type"], "action");
        assert_eq!(reply["key"], "click");
    }

    #[tokio::test]
    async fn utterance_before_any_snapshot_reports_not_ready() {
        let (control, _) = control(Scripted::Action(Command::Bookmark));

        let reply = control
            .on_request("utterance", json!({ "tab": 1, "text": "bookmark this" }))
            .await
            .unwrap();
        assert_eq!(reply["type"], "notReady");
    }

    #[tokio::test]
    async fn clarification_is_passed_through_verbatim() {
        let (control, _) = control(Scripted::Clarify(
            "Did you mean Login, Sign Up, or Learn More?".to_string(),
        ));
        control
            .on_request("pageReady", json!({ "tab": 1 }))
            .await
            .unwrap();

        let reply = control
            .on_request("utterance", json!({ "tab": 1, "text": "click the button" }))
            .await
            .unwrap();
        assert_eq!(reply["type"], "clarification");
        assert!(reply["question"].as_str().unwrap().contains("Sign Up"));
    }

    #[tokio::test]
    async fn interpreter_failure_becomes_an_apology() {
        let (control, _) = control(Scripted::Fail);
        control
            .on_request("pageReady", json!({ "tab": 1 }))
            .await
            .unwrap();

        let reply = control
            .on_request("utterance", json!({ "tab": 1, "text": "click login" }))
            .await
            .unwrap();
        assert_eq!(reply["type"], "apology");
        assert_eq!(reply["message"], APOLOGY);
    }

    #[tokio::test]
    async fn search_request_routes_to_the_relay_with_its_origin() {
        let (control, relay) = control(Scripted::Action(Command::Bookmark));

        control
            .on_request("search", json!({ "query": "cats", "tab": 7 }))
            .await
            .unwrap();

        assert_eq!(relay.calls.lock().unwrap().clone(), vec!["search:cats:Some(7)"]);
    }

    #[tokio::test]
    async fn var_store_passthrough_round_trips() {
        let (control, _) = control(Scripted::Action(Command::Bookmark));

        control
            .on_request("setVar", json!({ "key": "lastCommand", "value": "go back" }))
            .await
            .unwrap();
        let got = control
            .on_request("getVar", json!({ "key": "lastCommand" }))
            .await
            .unwrap();
        assert_eq!(got["value"], "go back");

        let cleared = control
            .on_request("clearVar", json!({ "key": "lastCommand" }))
            .await
            .unwrap();
        assert_eq!(cleared["cleared"], true);
    }

    #[tokio::test]
    async fn execute_rejects_an_unknown_command_key() {
        let (control, _) = control(Scripted::Action(Command::Bookmark));

        let err = control
            .on_request(
                "execute",
                json!({ "tab": 1, "command": { "key": "teleport" } }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VoxpilotError::InvalidCommand(_)));
    }

    #[tokio::test]
    async fn unknown_action_is_an_error_not_a_crash() {
        let (control, _) = control(Scripted::Action(Command::Bookmark));

        let err = control
            .on_request("explode", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, VoxpilotError::InvalidCommand(_)));
    }
}
