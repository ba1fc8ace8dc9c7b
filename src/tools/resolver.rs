//! Capability-name resolution into a frozen tool set.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StratloopError};

use super::registry::{ToolRef, ToolRegistry};

/// Ordered, duplicate-free set of tools for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSet {
    tools: Vec<ToolRef>,
}

impl ToolSet {
    /// A set offering nothing, for runs that get no helper modules
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolRef> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name.clone()).collect()
    }

    /// Distinct top-level packages across the set, in order
    pub fn import_roots(&self) -> Vec<&str> {
        let mut roots: Vec<&str> = Vec::new();
        for tool in &self.tools {
            let root = tool.import_root();
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Resolves capability names against the registry.
#[derive(Debug, Clone)]
pub struct ToolResolver {
    registry: Arc<ToolRegistry>,
}

impl ToolResolver {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Map names to tool references.
    ///
    /// Order follows the request; repeated names keep their first position.
    /// Any name missing from the registry fails the whole resolution.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<ToolSet> {
        let mut tools: Vec<ToolRef> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if tools.iter().any(|t| t.name == name) {
                continue;
            }
            let tool = self.registry.get(name).ok_or_else(|| {
                StratloopError::UnknownTool(format!(
                    "'{}' (known: {})",
                    name,
                    self.registry.list().join(", ")
                ))
            })?;
            tools.push(tool.clone());
        }
        debug!("Resolved {} tools", tools.len());
        Ok(ToolSet { tools })
    }
}
