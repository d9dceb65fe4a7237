//! File watcher for hot reload of routes and templates.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_routes;
use crate::routing::RouteDefinition;

/// A reload request for the running server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// New route definitions read from disk.
    Routes(Vec<RouteDefinition>),
    /// Rescan the template root.
    Templates,
}

/// Read the routes file into a reload event, logging and dropping failures
/// so the current table stays active.
pub fn routes_event(path: &Path) -> Option<ReloadEvent> {
    match load_routes(path) {
        Ok(routes) => Some(ReloadEvent::Routes(routes)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to reload routes. Keeping current table.");
            None
        }
    }
}

/// Watches the routes file and/or the template root.
pub struct ReloadWatcher {
    routes_file: Option<PathBuf>,
    template_root: Option<PathBuf>,
    update_tx: mpsc::UnboundedSender<ReloadEvent>,
}

impl ReloadWatcher {
    pub fn new(update_tx: mpsc::UnboundedSender<ReloadEvent>) -> Self {
        Self {
            routes_file: None,
            template_root: None,
            update_tx,
        }
    }

    pub fn routes_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.routes_file = Some(path.into());
        self
    }

    pub fn template_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_root = Some(path.into());
        self
    }

    /// Start watching in a background thread. Dropping the returned watcher
    /// stops it.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let routes_file = self.routes_file.clone();
        let template_root = self.template_root.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
                        return;
                    }
                    if let Some(file) = &routes_file {
                        if event.paths.iter().any(|p| same_file_name(p, file)) {
                            tracing::info!(path = ?file, "Routes file change detected, reloading...");
                            if let Some(update) = routes_event(file) {
                                let _ = tx.send(update);
                            }
                        }
                    }
                    if let Some(root) = &template_root {
                        if event.paths.iter().any(|p| p.starts_with(root)) {
                            tracing::debug!(path = ?event.paths, "Template change detected");
                            let _ = tx.send(ReloadEvent::Templates);
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        // Saves replace the routes file by rename, so watch its directory.
        if let Some(file) = &self.routes_file {
            let dir = file
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            tracing::info!(path = ?file, "Routes watcher started");
        }
        if let Some(root) = &self.template_root {
            watcher.watch(root, RecursiveMode::Recursive)?;
            tracing::info!(path = ?root, "Template watcher started");
        }

        Ok(watcher)
    }
}

fn same_file_name(event_path: &Path, file: &Path) -> bool {
    event_path.file_name().is_some() && event_path.file_name() == file.file_name()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_event_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        std::fs::write(&path, r#"[{"method":"GET","path":"/a","response_template":"a.json"}]"#).unwrap();

        let event = routes_event(&path).unwrap();
        assert_eq!(
            event,
            ReloadEvent::Routes(vec![RouteDefinition::new("GET", "/a", "a.json")])
        );
    }

    #[test]
    fn test_routes_event_drops_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(routes_event(&path).is_none());
    }
}
