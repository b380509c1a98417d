//! Installation check.
//!
//! The bridge needs Node.js plus `playwright` and `@midscene/web` installed
//! under its working directory.

use std::path::{Path, PathBuf};

use serde::Serialize;
use webrun_config::BrowserConfig;

use crate::bridge::find_node;

/// What was found on this host.
#[derive(Debug, Clone, Serialize)]
pub struct InstallationReport {
    pub node_path: Option<PathBuf>,
    pub workdir: PathBuf,
    pub playwright: bool,
    pub midscene: bool,
}

impl InstallationReport {
    pub fn is_ready(&self) -> bool {
        self.node_path.is_some() && self.playwright && self.midscene
    }

    /// Human-readable problems, empty when ready.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.node_path.is_none() {
            problems.push("Node.js not found".to_string());
        }
        if !self.playwright {
            problems.push(format!(
                "playwright not installed in {}",
                self.workdir.display()
            ));
        }
        if !self.midscene {
            problems.push(format!(
                "@midscene/web not installed in {}",
                self.workdir.display()
            ));
        }
        problems
    }
}

/// Inspect the host for the bridge's runtime dependencies.
pub fn check_installation(config: &BrowserConfig) -> InstallationReport {
    let workdir = config
        .bridge_workdir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let node_modules = workdir.join("node_modules");

    InstallationReport {
        node_path: find_node(config.node_path.as_ref())
            .ok()
            .filter(|path| config.node_path.is_none() || path.exists()),
        playwright: is_package(&node_modules, "playwright"),
        midscene: is_package(&node_modules, "@midscene/web"),
        workdir,
    }
}

fn is_package(node_modules: &Path, name: &str) -> bool {
    node_modules.join(name).join("package.json").is_file()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn install_package(root: &Path, name: &str) {
        let dir = root.join("node_modules").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("package.json"), "{}").unwrap();
    }

    #[test]
    fn test_empty_workdir_reports_missing_packages() {
        let temp = TempDir::new().unwrap();
        let config = BrowserConfig {
            bridge_workdir: Some(temp.path().to_path_buf()),
            node_path: Some(PathBuf::from("/nonexistent/node")),
            ..Default::default()
        };

        let report = check_installation(&config);

        assert!(!report.is_ready());
        assert!(report.node_path.is_none());
        assert!(!report.playwright);
        assert!(!report.midscene);
        assert_eq!(report.problems().len(), 3);
    }

    #[test]
    fn test_installed_packages_are_found() {
        let temp = TempDir::new().unwrap();
        install_package(temp.path(), "playwright");
        install_package(temp.path(), "@midscene/web");
        let node = temp.path().join("node");
        std::fs::write(&node, "").unwrap();
        let config = BrowserConfig {
            bridge_workdir: Some(temp.path().to_path_buf()),
            node_path: Some(node.clone()),
            ..Default::default()
        };

        let report = check_installation(&config);

        assert_eq!(report.node_path, Some(node));
        assert!(report.playwright);
        assert!(report.midscene);
        assert!(report.is_ready());
        assert!(report.problems().is_empty());
    }
}
