use std::sync::Arc;

use async_trait::async_trait;

use crate::command::Command;
use crate::error::Result;
use crate::page::{find_by_text, find_for_input, ContextId, PageDom};

/// Page-local primitives, performed by the page context over the bridge.
///
/// Elements are addressed by capture id and every handler starts from a
/// fresh capture: ids never survive a suspension point, since the page may
/// mutate between an await and resumption.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn capture(&self, ctx: ContextId) -> Result<PageDom>;
    async fn click(&self, ctx: ContextId, node: u32) -> Result<()>;
    async fn hover(&self, ctx: ContextId, node: u32) -> Result<()>;
    /// Set the field's value and synthesize input+change events so page
    /// scripts observe the update.
    async fn set_value(&self, ctx: ContextId, node: u32, value: &str) -> Result<()>;
    /// Step the joint session history; negative is back, positive forward.
    async fn history_go(&self, ctx: ContextId, delta: i32) -> Result<()>;
}

/// Operations the page context cannot perform itself; delegated to the
/// privileged side of the relay.
#[async_trait]
pub trait RelayOps: Send + Sync {
    async fn search(&self, query: &str, origin: Option<ContextId>) -> Result<()>;
    async fn bookmark(&self, ctx: ContextId) -> Result<()>;
}

/// What a dispatched command ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Clicked,
    Hovered,
    Filled,
    WentBack(u32),
    WentForward(u32),
    SearchRequested,
    BookmarkRequested,
    /// Resolution miss. Logged and swallowed here; preventing it is the
    /// interpreter's job, which should have disambiguated beforehand.
    TargetNotFound(String),
}

impl Outcome {
    /// Short user-facing description, suitable for spoken feedback.
    pub fn describe(&self) -> String {
        match self {
            Outcome::Clicked => "Clicked it.".to_string(),
            Outcome::Hovered => "Hovering over it.".to_string(),
            Outcome::Filled => "Filled it in.".to_string(),
            Outcome::WentBack(1) => "Went back one page.".to_string(),
            Outcome::WentBack(n) => format!("Went back {} pages.", n),
            Outcome::WentForward(1) => "Went forward one page.".to_string(),
            Outcome::WentForward(n) => format!("Went forward {} pages.", n),
            Outcome::SearchRequested => "Searching now.".to_string(),
            Outcome::BookmarkRequested => "Bookmarked this page.".to_string(),
            Outcome::TargetNotFound(text) => {
                format!("I couldn't find \"{}\" on this page.", text)
            }
        }
    }
}

pub struct CommandExecutor {
    driver: Arc<dyn PageDriver>,
    relay: Arc<dyn RelayOps>,
}

impl CommandExecutor {
    pub fn new(driver: Arc<dyn PageDriver>, relay: Arc<dyn RelayOps>) -> Self {
        Self { driver, relay }
    }

    /// Dispatch one command against the given context, synchronously to
    /// completion. Resolution failures are a no-op outcome, not an error;
    /// only transport failures surface as `Err`.
    pub async fn execute(&self, ctx: ContextId, command: &Command) -> Result<Outcome> {
        match command {
            Command::Click(target) => {
                let dom = self.driver.capture(ctx).await?;
                match find_by_text(&dom, &target.text) {
                    Some(node) => {
                        self.driver.click(ctx, node.id).await?;
                        Ok(Outcome::Clicked)
                    }
                    None => {
                        tracing::warn!(target = %target.text, "no element to click");
                        Ok(Outcome::TargetNotFound(target.text.clone()))
                    }
                }
            }
            Command::Hover(target) => {
                let dom = self.driver.capture(ctx).await?;
                match find_by_text(&dom, &target.text) {
                    Some(node) => {
                        self.driver.hover(ctx, node.id).await?;
                        Ok(Outcome::Hovered)
                    }
                    None => {
                        tracing::warn!(target = %target.text, "no element to hover");
                        Ok(Outcome::TargetNotFound(target.text.clone()))
                    }
                }
            }
            Command::Input { value, target } => {
                let dom = self.driver.capture(ctx).await?;
                match find_for_input(&dom, &target.text) {
                    Some(node) => {
                        self.driver.set_value(ctx, node.id, value).await?;
                        Ok(Outcome::Filled)
                    }
                    None => {
                        tracing::warn!(label = %target.text, "no input field for label");
                        Ok(Outcome::TargetNotFound(target.text.clone()))
                    }
                }
            }
            Command::Back(steps) => {
                let delta = history_delta(*steps)?;
                self.driver.history_go(ctx, -delta).await?;
                Ok(Outcome::WentBack(*steps))
            }
            Command::Forward(steps) => {
                let delta = history_delta(*steps)?;
                self.driver.history_go(ctx, delta).await?;
                Ok(Outcome::WentForward(*steps))
            }
            Command::Search(query) => {
                self.relay.search(query, Some(ctx)).await?;
                Ok(Outcome::SearchRequested)
            }
            Command::Bookmark => {
                self.relay.bookmark(ctx).await?;
                Ok(Outcome::BookmarkRequested)
            }
        }
    }
}

/// History deltas are signed on the wire; wire parsing already bounds page
/// counts, so an out-of-range count here means a caller-constructed command.
fn history_delta(steps: u32) -> Result<i32> {
    i32::try_from(steps)
        .map_err(|_| crate::error::VoxpilotError::InvalidCommand(format!(
            "page count out of range: {}",
            steps
        )))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::command::Target;
    use crate::page::PageNode;

    /// Records every primitive the executor invokes.
    struct FakeDriver {
        dom: PageDom,
        calls: Mutex<Vec<String>>,
    }

    impl FakeDriver {
        fn with_dom(dom: PageDom) -> Self {
            Self {
                dom,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        async fn capture(&self, _ctx: ContextId) -> Result<PageDom> {
            Ok(self.dom.clone())
        }

        async fn click(&self, _ctx: ContextId, node: u32) -> Result<()> {
            self.calls.lock().unwrap().push(format!("click:{}", node));
            Ok(())
        }

        async fn hover(&self, _ctx: ContextId, node: u32) -> Result<()> {
            self.calls.lock().unwrap().push(format!("hover:{}", node));
            Ok(())
        }

        async fn set_value(&self, _ctx: ContextId, node: u32, value: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("set:{}={}", node, value));
            Ok(())
        }

        async fn history_go(&self, _ctx: ContextId, delta: i32) -> Result<()> {
            self.calls.lock().unwrap().push(format!("go:{}", delta));
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

    fn node(id: u32, tag: &str, text: &str) -> PageNode {
        PageNode {
            id,
            tag: tag.to_string(),
            text: text.to_string(),
            attrs: HashMap::new(),
            visible: true,
            control: None,
        }
    }

    fn login_page() -> PageDom {
        let mut user_label = node(1, "label", "Username");
        user_label.attrs.insert("for".into(), "user".into());
        let mut user_input = node(2, "input", "");
        user_input.attrs.insert("id".into(), "user".into());

        PageDom {
            url: "https://example.com/login".to_string(),
            nodes: vec![user_label, user_input, node(3, "button", "Login")],
        }
    }

    fn executor(driver: FakeDriver, relay: FakeRelay) -> (CommandExecutor, Arc<FakeDriver>, Arc<FakeRelay>) {
        let driver = Arc::new(driver);
        let relay = Arc::new(relay);
        (
            CommandExecutor::new(driver.clone(), relay.clone()),
            driver,
            relay,
        )
    }

    #[tokio::test]
    async fn click_resolves_and_activates() {
        let (exec, driver, _) = executor(FakeDriver::with_dom(login_page()), FakeRelay::default());

        let outcome = exec
            .execute(1, &Command::Click(Target::new("Login")))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Clicked);
        assert_eq!(driver.calls(), vec!["click:3"]);
    }

    #[tokio::test]
    async fn click_miss_is_a_no_op_outcome() {
        let (exec, driver, _) = executor(FakeDriver::with_dom(login_page()), FakeRelay::default());

        let outcome = exec
            .execute(1, &Command::Click(Target::new("Register")))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::TargetNotFound("Register".to_string()));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn input_fills_the_labelled_field() {
        let (exec, driver, _) = executor(FakeDriver::with_dom(login_page()), FakeRelay::default());

        let outcome = exec
            .execute(
                1,
                &Command::Input {
                    value: "alice".to_string(),
                    target: Target::new("Username"),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Filled);
        assert_eq!(driver.calls(), vec!["set:2=alice"]);
    }

    #[tokio::test]
    async fn back_and_forward_step_history() {
        let (exec, driver, _) = executor(FakeDriver::with_dom(login_page()), FakeRelay::default());

        assert_eq!(
            exec.execute(1, &Command::Back(2)).await.unwrap(),
            Outcome::WentBack(2)
        );
        assert_eq!(
            exec.execute(1, &Command::Forward(1)).await.unwrap(),
            Outcome::WentForward(1)
        );
        assert_eq!(driver.calls(), vec!["go:-2", "go:1"]);
    }

    #[tokio::test]
    async fn history_steps_beyond_a_signed_delta_are_an_error() {
        let (exec, driver, _) = executor(FakeDriver::with_dom(login_page()), FakeRelay::default());

        let err = exec
            .execute(1, &Command::Back(i32::MAX as u32 + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::VoxpilotError::InvalidCommand(_)));
        assert!(driver.calls().is_empty());

        // The largest representable count still steps.
        exec.execute(1, &Command::Forward(i32::MAX as u32))
            .await
            .unwrap();
        assert_eq!(driver.calls(), vec![format!("go:{}", i32::MAX)]);
    }

    #[tokio::test]
    async fn search_and_bookmark_delegate_to_the_relay() {
        let (exec, driver, relay) =
            executor(FakeDriver::with_dom(login_page()), FakeRelay::default());

        exec.execute(4, &Command::Search("cats".to_string()))
            .await
            .unwrap();
        exec.execute(4, &Command::Bookmark).await.unwrap();

        assert!(driver.calls().is_empty());
        assert_eq!(
            relay.calls.lock().unwrap().clone(),
            vec!["search:cats:Some(4)", "bookmark:4"]
        );
    }

    #[tokio::test]
    async fn hover_uses_the_same_resolution_as_click() {
        let (exec, driver, _) = executor(FakeDriver::with_dom(login_page()), FakeRelay::default());

        let outcome = exec
            .execute(1, &Command::Hover(Target::new("log")))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Hovered);
        assert_eq!(driver.calls(), vec!["hover:3"]);
    }
}
