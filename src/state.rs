//! Application state management
//!
//! Shared state handed to the intake services by the embedding layer.

use std::sync::Arc;

use crate::audit::AuditSink;
use crate::catalogue::Catalogue;
use crate::config::Config;
use crate::db::Repository;
use crate::judge::JudgeQueue;
use crate::sandbox::SandboxRunner;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Inner state (wrapped in Arc for cheap cloning)
struct AppStateInner {
    repo: Arc<dyn Repository>,
    catalogue: Arc<Catalogue>,
    engine: Arc<dyn SandboxRunner>,
    queue: JudgeQueue,
    audit: Arc<dyn AuditSink>,
    config: Config,
}

impl AppState {
    pub fn new(
        config: Config,
        repo: Arc<dyn Repository>,
        catalogue: Arc<Catalogue>,
        engine: Arc<dyn SandboxRunner>,
        queue: JudgeQueue,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                repo,
                catalogue,
                engine,
                queue,
                audit,
                config,
            }),
        }
    }

    pub fn repo(&self) -> &dyn Repository {
        self.inner.repo.as_ref()
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.inner.catalogue
    }

    pub fn engine(&self) -> &dyn SandboxRunner {
        self.inner.engine.as_ref()
    }

    pub fn queue(&self) -> &JudgeQueue {
        &self.inner.queue
    }

    pub fn audit(&self) -> &dyn AuditSink {
        self.inner.audit.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }
}
