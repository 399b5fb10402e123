//! ECS components carried by periscope entities, and the audit system.

use tracing::{trace, warn};

use braggi_ecs::{ComponentMask, System, World};
use braggi_types::{CellId, TokenId};

/// Marks an entity as carrying a borrowed token.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TokenRef {
    pub token: TokenId,
}

/// Marks an entity as mapped to an entropy cell.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub cell: CellId,
}

/// Marks an entity as a validator participant in a contract.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorRef {
    pub kind: u32,
}

/// Periodic sanity pass over the token↔cell entities: every entity that
/// carries a token must also carry a cell mapping.
#[derive(Debug, Default)]
pub struct MappingAuditSystem {
    orphans_seen: u64,
}

impl MappingAuditSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn orphans_seen(&self) -> u64 {
        self.orphans_seen
    }
}

impl System for MappingAuditSystem {
    fn name(&self) -> &str {
        "periscope-mapping-audit"
    }

    fn update(&mut self, world: &mut World, _dt: f64) {
        let (Some(token_ty), Some(cell_ty)) = (
            world.component_type::<TokenRef>(),
            world.component_type::<CellRef>(),
        ) else {
            return;
        };
        let tokens_only = ComponentMask::empty().with(token_ty);
        let mapped = ComponentMask::empty().with(token_ty).with(cell_ty);
        let token_count = world.query(tokens_only).count();
        let mapped_count = world.query(mapped).count();
        let orphans = token_count - mapped_count;
        if orphans > 0 {
            self.orphans_seen += orphans as u64;
            warn!(orphans, "token entities without a cell mapping");
        }
        trace!(token_count, mapped_count, "mapping audit");
    }
}
