use async_trait::async_trait;
use serde_json::json;

use super::bridge::BridgeHandle;
use super::router::{BrowserOps, ContextInfo};
use crate::error::{Result, VoxpilotError};
use crate::executor::PageDriver;
use crate::page::{ContextId, PageDom};

/// Page primitives carried over the bridge as correlated requests. Each
/// method is a single round-trip to the extension, which performs the
/// operation in the addressed tab.
pub struct BridgePageDriver {
    handle: BridgeHandle,
}

impl BridgePageDriver {
    pub fn new(handle: BridgeHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl PageDriver for BridgePageDriver {
    async fn capture(&self, ctx: ContextId) -> Result<PageDom> {
        let result = self
            .handle
            .request("page.capture", json!({ "tab": ctx }))
            .await?;
        serde_json::from_value(result)
            .map_err(|e| VoxpilotError::BridgeError(format!("Malformed page capture: {}", e)))
    }

    async fn click(&self, ctx: ContextId, node: u32) -> Result<()> {
        self.handle
            .request("page.click", json!({ "tab": ctx, "node": node }))
            .await?;
        Ok(())
    }

    async fn hover(&self, ctx: ContextId, node: u32) -> Result<()> {
        self.handle
            .request("page.hover", json!({ "tab": ctx, "node": node }))
            .await?;
        Ok(())
    }

    async fn set_value(&self, ctx: ContextId, node: u32, value: &str) -> Result<()> {
        self.handle
            .request(
                "page.setValue",
                json!({ "tab": ctx, "node": node, "value": value }),
            )
            .await?;
        Ok(())
    }

    async fn history_go(&self, ctx: ContextId, delta: i32) -> Result<()> {
        self.handle
            .request("page.historyGo", json!({ "tab": ctx, "delta": delta }))
            .await?;
        Ok(())
    }
}

/// Privileged tab/bookmark operations carried over the bridge.
pub struct BridgeBrowserOps {
    handle: BridgeHandle,
}

impl BridgeBrowserOps {
    pub fn new(handle: BridgeHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl BrowserOps for BridgeBrowserOps {
    async fn navigate(&self, ctx: ContextId, url: &str) -> Result<()> {
        self.handle
            .request("tab.navigate", json!({ "tab": ctx, "url": url }))
            .await?;
        Ok(())
    }

    async fn focused_context(&self) -> Result<Option<ContextId>> {
        let result = self.handle.request("tab.focused", json!({})).await?;
        Ok(result.get("tab").and_then(|t| t.as_u64()).map(|t| t as u32))
    }

    async fn open_context(&self, url: &str) -> Result<ContextId> {
        let result = self
            .handle
            .request("tab.open", json!({ "url": url }))
            .await?;
        result
            .get("tab")
            .and_then(|t| t.as_u64())
            .map(|t| t as u32)
            .ok_or_else(|| VoxpilotError::BridgeError("tab.open returned no tab id".to_string()))
    }

    async fn context_info(&self, ctx: ContextId) -> Result<ContextInfo> {
        let result = self
            .handle
            .request("tab.info", json!({ "tab": ctx }))
            .await?;
        Ok(ContextInfo {
            title: result
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string(),
            url: result
                .get("url")
                .and_then(|u| u.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }

    async fn create_bookmark(&self, title: &str, url: &str) -> Result<()> {
        self.handle
            .request("bookmark.create", json!({ "title": title, "url": url }))
            .await?;
        Ok(())
    }
}
