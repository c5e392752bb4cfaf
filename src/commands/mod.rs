pub mod cycle;
pub mod ledger;
pub mod run;
pub mod validate;

// Re-export command functions for convenience
pub use cycle::{fetch, publish};
pub use ledger::ledger;
pub use run::run;
pub use validate::validate;
