//! Probe trait and the common report type
//!
//! Every prepared check implements `Probe`, so a host can hold checks of
//! different kinds side by side and run them the same way.

use async_trait::async_trait;
use checkmate_core::{Diagnostics, RetryResult};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::command::{CommandCheck, CommandReport};
use crate::error::Result;
use crate::http::{HttpCheck, HttpReport};
use crate::tcp::{TcpEchoCheck, TcpEchoReport};

/// Report of any kind of check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckReport {
    Http(HttpReport),
    TcpEcho(TcpEchoReport),
    LocalCommand(CommandReport),
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        match self {
            CheckReport::Http(r) => r.passed,
            CheckReport::TcpEcho(r) => r.passed,
            CheckReport::LocalCommand(r) => r.passed,
        }
    }

    pub fn result(&self) -> RetryResult {
        match self {
            CheckReport::Http(r) => r.result,
            CheckReport::TcpEcho(r) => r.result,
            CheckReport::LocalCommand(r) => r.result,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            CheckReport::Http(r) => r.attempts,
            CheckReport::TcpEcho(r) => r.attempts,
            CheckReport::LocalCommand(r) => r.attempts,
        }
    }
}

/// A prepared check that can be run
#[async_trait]
pub trait Probe: Send + Sync {
    /// Kind of check, as written in configuration files
    fn kind(&self) -> &'static str;

    /// Name used in logs and output
    fn label(&self) -> &str;

    /// Probe until the retry policy reaches a terminal result
    ///
    /// Only fatal problems found while running (such as a file that could
    /// not be created) are returned as errors.
    async fn probe(
        &self,
        cancellation: &CancellationToken,
        diagnostics: &mut Diagnostics,
    ) -> Result<CheckReport>;
}

#[async_trait]
impl Probe for HttpCheck {
    fn kind(&self) -> &'static str {
        "http"
    }

    fn label(&self) -> &str {
        HttpCheck::label(self)
    }

    async fn probe(
        &self,
        cancellation: &CancellationToken,
        diagnostics: &mut Diagnostics,
    ) -> Result<CheckReport> {
        Ok(CheckReport::Http(self.run(cancellation, diagnostics).await))
    }
}

#[async_trait]
impl Probe for TcpEchoCheck {
    fn kind(&self) -> &'static str {
        "tcp_echo"
    }

    fn label(&self) -> &str {
        TcpEchoCheck::label(self)
    }

    async fn probe(
        &self,
        cancellation: &CancellationToken,
        diagnostics: &mut Diagnostics,
    ) -> Result<CheckReport> {
        Ok(CheckReport::TcpEcho(self.run(cancellation, diagnostics).await))
    }
}

#[async_trait]
impl Probe for CommandCheck {
    fn kind(&self) -> &'static str {
        "local_command"
    }

    fn label(&self) -> &str {
        CommandCheck::label(self)
    }

    async fn probe(
        &self,
        cancellation: &CancellationToken,
        diagnostics: &mut Diagnostics,
    ) -> Result<CheckReport> {
        self.run(cancellation, diagnostics)
            .await
            .map(CheckReport::LocalCommand)
    }
}
