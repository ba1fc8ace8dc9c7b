//! Task suite, request parsing and spec validation

pub mod catalog;
pub mod guard;
pub mod spec;

pub use catalog::{DataBounds, TaskCatalog};
pub use guard::{SpecGuard, TaskRequest};
pub use spec::{Frequency, TaskSpec};
