use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::error::{Result, VoxpilotError};
use crate::interpret::{InterpretationResult, Interpreter};
use crate::page::{ContextId, PageSnapshot};
use crate::relay::VarStore;

/// Spoken when the interpreter round-trip fails while the user is waiting.
pub const APOLOGY: &str =
    "Sorry, I couldn't reach the assistant service. Please try again in a moment.";

/// Result of an interpretation attempt against the session state.
#[derive(Debug)]
pub enum InterpretOutcome {
    Decided(InterpretationResult),
    /// The page moved on while the request was in flight; the late result
    /// was discarded and must not be acted on.
    Superseded,
}

struct ContextState {
    snapshot: PageSnapshot,
    generation: u64,
}

/// Latest-known page state per context.
///
/// Only the sanitizer path writes (`replace_snapshot`), only the
/// interpretation path reads; both run on the control context, so a plain
/// mutex with short critical sections is enough. No snapshot history is
/// kept — a navigation or tab switch overwrites the previous snapshot and
/// bumps the generation, which is how in-flight results for the old page
/// are recognized and dropped.
pub struct Session {
    contexts: Mutex<HashMap<ContextId, ContextState>>,
    store: Arc<VarStore>,
}

impl Session {
    pub fn new(store: Arc<VarStore>) -> Self {
        Self {
            contexts: Mutex::new(HashMap::new()),
            store,
        }
    }

    /// Install a fresh snapshot for a context, superseding the previous one.
    pub fn replace_snapshot(&self, ctx: ContextId, snapshot: PageSnapshot) {
        let mut contexts = self.contexts.lock().unwrap();
        match contexts.get_mut(&ctx) {
            Some(state) => {
                state.snapshot = snapshot;
                state.generation += 1;
            }
            None => {
                contexts.insert(
                    ctx,
                    ContextState {
                        snapshot,
                        generation: 1,
                    },
                );
            }
        }
    }

    pub fn snapshot(&self, ctx: ContextId) -> Option<PageSnapshot> {
        self.contexts
            .lock()
            .unwrap()
            .get(&ctx)
            .map(|s| s.snapshot.clone())
    }

    fn generation(&self, ctx: ContextId) -> Option<u64> {
        self.contexts.lock().unwrap().get(&ctx).map(|s| s.generation)
    }

    /// Interpret user text against the snapshot current at call time.
    ///
    /// The snapshot and its generation are captured before the collaborator
    /// round-trip; if the context's generation has moved by the time the
    /// result arrives, the result is stale and comes back as `Superseded`.
    /// With no snapshot at all the command is rejected up front rather than
    /// run against empty context.
    pub async fn interpret(
        &self,
        interpreter: &dyn Interpreter,
        ctx: ContextId,
        user_text: &str,
    ) -> Result<InterpretOutcome> {
        let (snapshot, generation) = {
            let contexts = self.contexts.lock().unwrap();
            match contexts.get(&ctx) {
                Some(state) => (state.snapshot.clone(), state.generation),
                None => return Err(VoxpilotError::NotReady),
            }
        };

        // Remembered across navigations so "repeat that" style flows work.
        self.store.set("lastCommand", json!(user_text));

        let result = interpreter.interpret(user_text, &snapshot).await?;

        if self.generation(ctx) != Some(generation) {
            tracing::debug!(ctx, "discarding interpretation for a superseded page");
            return Ok(InterpretOutcome::Superseded);
        }
        Ok(InterpretOutcome::Decided(result))
    }

    pub fn last_command(&self) -> Option<String> {
        self.store
            .get("lastCommand")
            .and_then(|v| v.as_str().map(str::to_string))
    }
}
