// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Browser abstraction for testability.
//!
//! The orchestrator owns one engine-launched session per run and lends pages
//! to the authenticator and processors by reference; only the orchestrator's
//! cleanup closes anything.

pub mod chromium;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrowserError;

pub use chromium::ChromiumEngine;

/// Options for launching a browser session
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub window: (u32, u32),
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: false,
            window: (1920, 1080),
        }
    }
}

/// A page within a launched session
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate to a URL and wait for the load to settle
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Current HTML content of the page
    async fn content(&self) -> Result<String, BrowserError>;

    /// Focus an element and type text into it
    async fn fill(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    /// Click an element
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Poll until an element exists, or time out
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), BrowserError>;
}

/// One launched browser with one browsing context
#[async_trait]
pub trait BrowserSession: Send {
    /// Open a new page in the session's context
    async fn new_page(&mut self) -> Result<Box<dyn BrowserPage>, BrowserError>;

    /// Close the browsing context
    async fn close(&mut self) -> Result<(), BrowserError>;

    /// Stop the underlying engine process
    async fn shutdown(&mut self) -> Result<(), BrowserError>;
}

/// Launches browser sessions
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self, options: &LaunchOptions)
    -> Result<Box<dyn BrowserSession>, BrowserError>;
}
