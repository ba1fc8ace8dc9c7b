//! Tool registry and resolution of capability names to helper modules

mod registry;
mod resolver;

pub use registry::{ToolRef, ToolRegistry};
pub use resolver::{ToolResolver, ToolSet};
