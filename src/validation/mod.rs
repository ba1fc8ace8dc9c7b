// Verification of candidates: static checks before execution and sanity
// checks over the metrics afterwards

pub mod command;
pub mod composite;
pub mod imports;
pub mod result;
pub mod traits;

pub use command::CommandVerifier;
pub use composite::CompositeVerifier;
pub use imports::ImportVerifier;
pub use result::{ResultVerifier, SanityCheck, Verdict};
pub use traits::{CheckResult, StaticVerifier};
