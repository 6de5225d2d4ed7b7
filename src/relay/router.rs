use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::{Result, VoxpilotError};
use crate::executor::RelayOps;
use crate::page::ContextId;

/// Title and URL of a page context, as reported by the privileged side.
#[derive(Debug, Clone)]
pub struct ContextInfo {
    pub title: String,
    pub url: String,
}

/// Privileged browser operations only the control context can perform:
/// creating tabs and bookmarks, navigating across origins, and reading which
/// tab currently has focus.
#[async_trait]
pub trait BrowserOps: Send + Sync {
    async fn navigate(&self, ctx: ContextId, url: &str) -> Result<()>;
    async fn focused_context(&self) -> Result<Option<ContextId>>;
    async fn open_context(&self, url: &str) -> Result<ContextId>;
    async fn context_info(&self, ctx: ContextId) -> Result<ContextInfo>;
    async fn create_bookmark(&self, title: &str, url: &str) -> Result<()>;
}

/// Routes page-context requests that need privilege to the browser side.
pub struct Relay {
    ops: Arc<dyn BrowserOps>,
    search_url: String,
}

impl Relay {
    pub fn new(ops: Arc<dyn BrowserOps>, search_url: String) -> Self {
        Self { ops, search_url }
    }

    fn search_url_for(&self, query: &str) -> Result<String> {
        let url = Url::parse_with_params(&self.search_url, &[("q", query)])
            .map_err(|e| VoxpilotError::ConfigError(format!("Bad search URL: {}", e)))?;
        Ok(url.into())
    }
}

#[async_trait]
impl RelayOps for Relay {
    /// Perform a web search. Three tiers, attempted in order, each failure
    /// falling through to the next instead of surfacing: navigate the
    /// originating context in place when its identity is known, otherwise
    /// the currently focused context, otherwise open a new one.
    async fn search(&self, query: &str, origin: Option<ContextId>) -> Result<()> {
        let url = self.search_url_for(query)?;

        if let Some(ctx) = origin {
            match self.ops.navigate(ctx, &url).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(ctx, error = %e, "search: originating context unavailable");
                }
            }
        }

        match self.ops.focused_context().await {
            Ok(Some(ctx)) => match self.ops.navigate(ctx, &url).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(ctx, error = %e, "search: focused context unavailable");
                }
            },
            Ok(None) => tracing::debug!("search: no focused context"),
            Err(e) => tracing::warn!(error = %e, "search: focused context lookup failed"),
        }

        let ctx = self.ops.open_context(&url).await?;
        tracing::info!(ctx, query, "search opened a new context");
        Ok(())
    }

    /// Bookmark the context's current page, defaulting a missing title.
    async fn bookmark(&self, ctx: ContextId) -> Result<()> {
        let info = self.ops.context_info(ctx).await?;
        let title = if info.title.trim().is_empty() {
            "New Bookmark"
        } else {
            info.title.as_str()
        };
        self.ops.create_bookmark(title, &info.url).await
    }
}
