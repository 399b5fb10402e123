//! The periscope: token↔cell registry, region-lifetime contracts, and
//! validator dispatch.
//!
//! Every constraint check in a field routes through the periscope when it
//! is installed as the field's dispatcher. SYNTAX constraints are gated on
//! the active contracts; REGION and REGIME constraints are checked against
//! the regime-compatibility matrix; everything else defers to the
//! constraint's own validator.

pub mod builder;
pub mod contract;
pub mod periscope;
pub mod sync;

pub use builder::PeriscopeBuilder;
pub use contract::{ContractState, RegionLifetimeContract};
pub use periscope::{Periscope, TokenMapping};
pub use sync::{CellRef, MappingAuditSystem, TokenRef, ValidatorRef};
