//! Tool registry loading from TOML configuration
//!
//! Loads the vetted helper-module table and provides lookup methods.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StratloopError};

const BUILTIN_REGISTRY: &str = include_str!("registry.toml");

/// TOML representation of a tool entry
#[derive(Debug, Deserialize)]
struct TomlTool {
    name: String,
    module: String,
    symbol: String,
    file: String,
    #[serde(default)]
    description: String,
}

/// TOML file structure
#[derive(Debug, Deserialize)]
struct TomlRegistry {
    #[serde(rename = "tool")]
    tools: Vec<TomlTool>,
}

/// Reference to one vetted helper the generated module may import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRef {
    pub name: String,
    pub module: String,
    pub symbol: String,
    pub path: PathBuf,
    pub description: String,
}

impl ToolRef {
    /// Top-level package of the module, used for import allow-listing
    pub fn import_root(&self) -> &str {
        self.module.split('.').next().unwrap_or(&self.module)
    }
}

/// Registry of helper modules keyed by capability name
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolRef>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Load the built-in registry with paths rooted at `toolkit_root`
    pub fn builtin(toolkit_root: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml(BUILTIN_REGISTRY, toolkit_root)
    }

    /// Load a registry from a TOML file
    pub fn from_file(path: impl AsRef<Path>, toolkit_root: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| StratloopError::Storage(format!("Failed to read registry file: {}", e)))?;
        Self::from_toml(&content, toolkit_root)
    }

    /// Load a registry from TOML string
    pub fn from_toml(content: &str, toolkit_root: impl AsRef<Path>) -> Result<Self> {
        let registry: TomlRegistry = toml::from_str(content)
            .map_err(|e| StratloopError::Storage(format!("Failed to parse TOML: {}", e)))?;

        let root = toolkit_root.as_ref();
        let mut tools = HashMap::new();
        for entry in registry.tools {
            let tool = ToolRef {
                path: root.join(&entry.file),
                name: entry.name,
                module: entry.module,
                symbol: entry.symbol,
                description: entry.description,
            };
            tools.insert(tool.name.clone(), tool);
        }

        Ok(Self { tools })
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&ToolRef> {
        self.tools.get(name)
    }

    /// List all tool names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Add a tool to the registry
    pub fn add(&mut self, tool: ToolRef) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Check if a tool exists
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
