//! Construction of a periscope with its invariants pre-satisfied.
//!
//! A periscope is only reachable through this builder, which guarantees
//! that at least one valid contract and a validator are installed before
//! `validate` can ever run. The runtime self-heal paths in dispatch then
//! exist only for the all-contracts-revoked case.

use std::sync::Arc;

use braggi_ecs::World;
use braggi_entropy::ConstraintValidator;
use braggi_entropy::validators::AdjacencyValidator;
use braggi_error::Result;
use braggi_region::Region;
use braggi_types::{ContractGuarantees, PeriscopeDirection, Regime};

use crate::contract::RegionLifetimeContract;
use crate::periscope::Periscope;
use crate::sync::{CellRef, MappingAuditSystem, TokenRef, ValidatorRef};

/// Component types a periscope world needs, with headroom for callers
/// that attach their own.
const PERISCOPE_COMPONENT_TYPES: usize = 8;

pub struct PeriscopeBuilder {
    entity_capacity: usize,
    region: Option<Region>,
    validator: Option<Arc<dyn ConstraintValidator>>,
    contracts: Vec<RegionLifetimeContract>,
}

impl Default for PeriscopeBuilder {
    fn default() -> Self {
        Self {
            entity_capacity: 64,
            region: None,
            validator: None,
            contracts: Vec::new(),
        }
    }
}

impl PeriscopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_capacity(mut self, capacity: usize) -> Self {
        self.entity_capacity = capacity;
        self
    }

    /// Back the periscope's world with a parse-scoped region.
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Install the validator consulted for SYNTAX and PERISCOPE
    /// constraints. Defaults to a permissive adjacency validator.
    pub fn with_validator(mut self, validator: Arc<dyn ConstraintValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Pre-register a contract. It is activated during `build`.
    pub fn with_contract(mut self, contract: RegionLifetimeContract) -> Self {
        self.contracts.push(contract);
        self
    }

    pub fn build(self) -> Result<Periscope> {
        let mut world = match self.region {
            Some(region) => {
                World::with_region(region, self.entity_capacity, PERISCOPE_COMPONENT_TYPES)?
            }
            None => World::new(self.entity_capacity, PERISCOPE_COMPONENT_TYPES)?,
        };
        let token_type = world.register_component::<TokenRef>("token_ref")?;
        let cell_type = world.register_component::<CellRef>("cell_ref")?;
        let validator_type = world.register_component::<ValidatorRef>("validator_ref")?;
        world.register_system(Box::new(MappingAuditSystem::new()));

        let mut contracts = self.contracts;
        for contract in &mut contracts {
            contract.activate();
        }
        if contracts.is_empty() {
            let region_entity = world.create_entity();
            let validator_entity = world.create_entity();
            world.add_component::<ValidatorRef>(validator_entity)?;
            let mut default = RegionLifetimeContract::new(
                region_entity,
                validator_entity,
                ContractGuarantees::default_contract(),
                Regime::Rand,
                Regime::Rand,
                PeriscopeDirection::Out,
            );
            default.activate();
            contracts.push(default);
        }

        let validator = self
            .validator
            .unwrap_or_else(|| Arc::new(AdjacencyValidator::permissive()));

        Ok(Periscope::new(
            world,
            token_type,
            cell_type,
            validator_type,
            contracts,
            validator,
        ))
    }
}
