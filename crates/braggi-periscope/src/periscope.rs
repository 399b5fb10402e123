//! The periscope proper: registry plus validator dispatch.

use std::sync::{Arc, Mutex};

use hashbrown::HashMap;
use tracing::{debug, trace, warn};

use braggi_ecs::World;
use braggi_entropy::{CellGrid, ConstraintCtx, ConstraintValidator};
use braggi_error::{BraggiError, ErrorCategory, Result, Severity};
use braggi_types::{
    CellId, ComponentTypeId, ConstraintKind, ContractGuarantees, Diagnostic, EntityId,
    PeriscopeDirection, Regime, Token, TokenId, TokenSource,
};

use crate::contract::RegionLifetimeContract;
use crate::sync::{CellRef, TokenRef};

/// One token↔cell association, carried by an ECS entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenMapping {
    pub token: TokenId,
    pub cell: CellId,
    pub entity: EntityId,
}

/// Token↔cell registry, contract vector, and the dispatch hook installed
/// into an entropy field.
///
/// Registration happens while the periscope is still exclusively owned;
/// once wrapped in an `Arc` and handed to a field, only `validate` and the
/// contract operations (which go through a mutex) are reachable.
pub struct Periscope {
    world: World,
    token_type: ComponentTypeId,
    cell_type: ComponentTypeId,
    validator_type: ComponentTypeId,
    mappings: Vec<TokenMapping>,
    by_token: HashMap<TokenId, usize>,
    contracts: Mutex<Vec<RegionLifetimeContract>>,
    validator: Arc<dyn ConstraintValidator>,
}

impl Periscope {
    pub(crate) fn new(
        world: World,
        token_type: ComponentTypeId,
        cell_type: ComponentTypeId,
        validator_type: ComponentTypeId,
        contracts: Vec<RegionLifetimeContract>,
        validator: Arc<dyn ConstraintValidator>,
    ) -> Self {
        Self {
            world,
            token_type,
            cell_type,
            validator_type,
            mappings: Vec::new(),
            by_token: HashMap::new(),
            contracts: Mutex::new(contracts),
            validator,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn token_type(&self) -> ComponentTypeId {
        self.token_type
    }

    pub fn cell_type(&self) -> ComponentTypeId {
        self.cell_type
    }

    pub fn validator_type(&self) -> ComponentTypeId {
        self.validator_type
    }

    pub fn installed_validator(&self) -> &Arc<dyn ConstraintValidator> {
        &self.validator
    }

    // ------------------------------------------------------------------
    // Token↔cell registry
    // ------------------------------------------------------------------

    /// Insert or update a token→cell mapping. Each token gets one entity
    /// carrying [`TokenRef`] and [`CellRef`] components.
    pub fn register_token(&mut self, token: TokenId, cell: CellId) -> Result<EntityId> {
        if let Some(&idx) = self.by_token.get(&token) {
            let entity = self.mappings[idx].entity;
            self.mappings[idx].cell = cell;
            self.world.insert_component(entity, CellRef { cell })?;
            trace!(token = %token, cell = %cell, "token mapping updated");
            return Ok(entity);
        }
        let entity = self.world.create_entity();
        self.world.insert_component(entity, TokenRef { token })?;
        self.world.insert_component(entity, CellRef { cell })?;
        let idx = self.mappings.len();
        self.mappings.push(TokenMapping {
            token,
            cell,
            entity,
        });
        self.by_token.insert(token, idx);
        trace!(token = %token, cell = %cell, entity = %entity, "token registered");
        Ok(entity)
    }

    /// Register many mappings. Outcome is order-independent as long as no
    /// token repeats within the batch.
    pub fn register_tokens_batch(&mut self, pairs: &[(TokenId, CellId)]) -> Result<()> {
        for &(token, cell) in pairs {
            self.register_token(token, cell)?;
        }
        Ok(())
    }

    /// Pull every token from the source and map token `i` to cell `i`.
    pub fn sync_tokens(&mut self, source: &dyn TokenSource) -> Result<usize> {
        let mut synced = 0;
        for raw in 0..source.max_token_id() {
            if let Some(token) = source.get_token(TokenId::new(raw)) {
                self.register_token(token.id, CellId::new(raw))?;
                synced += 1;
            }
        }
        debug!(synced, "token sync pass complete");
        Ok(synced)
    }

    pub fn mappings(&self) -> &[TokenMapping] {
        &self.mappings
    }

    /// The cell mapped to a token. Unmapped tokens fall back to the
    /// token's line number bounded by the field size, then to cell 0.
    pub fn get_cell_id_for_token(&self, token: &Token, grid: &CellGrid) -> CellId {
        if let Some(&idx) = self.by_token.get(&token.id) {
            return self.mappings[idx].cell;
        }
        let line = token.pos.line as usize;
        if line < grid.len() {
            CellId::new(token.pos.line)
        } else {
            CellId::new(0)
        }
    }

    // ------------------------------------------------------------------
    // Contracts
    // ------------------------------------------------------------------

    /// Build, activate, and append a contract. Returns its stable index.
    pub fn create_contract(
        &self,
        region_entity: EntityId,
        validator_entity: EntityId,
        guarantees: ContractGuarantees,
        source_regime: Regime,
        target_regime: Regime,
        direction: PeriscopeDirection,
    ) -> Result<usize> {
        let contract = RegionLifetimeContract::new(
            region_entity,
            validator_entity,
            guarantees,
            source_regime,
            target_regime,
            direction,
        );
        self.register_contract(contract)
    }

    /// Append an externally built contract, activating it if fresh.
    pub fn register_contract(&self, mut contract: RegionLifetimeContract) -> Result<usize> {
        contract.activate();
        let mut contracts = self
            .contracts
            .lock()
            .map_err(|_| BraggiError::internal("contract vector poisoned"))?;
        contracts.push(contract);
        Ok(contracts.len() - 1)
    }

    /// Revoke by index. The slot is retained; indices stay stable.
    pub fn revoke_contract(&self, index: usize) -> Result<()> {
        let mut contracts = self
            .contracts
            .lock()
            .map_err(|_| BraggiError::internal("contract vector poisoned"))?;
        let contract = contracts.get_mut(index).ok_or_else(|| BraggiError::OutOfRange {
            what: "contract index".to_owned(),
            value: index.to_string(),
        })?;
        contract.revoke();
        debug!(index, "contract revoked");
        Ok(())
    }

    pub fn contract_count(&self) -> usize {
        self.contracts.lock().map_or(0, |c| c.len())
    }

    pub fn valid_contract_count(&self) -> usize {
        self.contracts
            .lock()
            .map_or(0, |c| c.iter().filter(|c| c.is_valid()).count())
    }

    /// Inspect the contract vector without exposing the lock.
    pub fn with_contracts<R>(&self, f: impl FnOnce(&[RegionLifetimeContract]) -> R) -> Result<R> {
        let contracts = self
            .contracts
            .lock()
            .map_err(|_| BraggiError::internal("contract vector poisoned"))?;
        Ok(f(&contracts))
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn validate_syntax(&self, ctx: &ConstraintCtx<'_>, grid: &mut CellGrid) -> bool {
        let admitted = match self.contracts.lock() {
            Ok(mut contracts) => {
                if !contracts.iter().any(RegionLifetimeContract::is_valid) {
                    // Self-heal: validation must never run without a live
                    // contract to consult.
                    warn!(constraint = %ctx.id, "no valid contracts; synthesising default");
                    let mut fallback = RegionLifetimeContract::new(
                        EntityId::new(0),
                        EntityId::new(0),
                        ContractGuarantees::default_contract(),
                        Regime::Rand,
                        Regime::Rand,
                        PeriscopeDirection::Out,
                    );
                    fallback.activate();
                    contracts.push(fallback);
                }
                contracts.iter().any(RegionLifetimeContract::admits_syntax)
            }
            Err(_) => {
                warn!("contract vector poisoned; treating constraint as unadmitted");
                false
            }
        };
        if !admitted {
            debug!(constraint = %ctx.id, "no contract admits constraint; direct validation fallback");
        }
        ctx.validator.validate(ctx, grid) && self.validator.validate(ctx, grid)
    }

    fn validate_region(&self, ctx: &ConstraintCtx<'_>, grid: &mut CellGrid) -> bool {
        let offending = match self.contracts.lock() {
            Ok(contracts) => contracts
                .iter()
                .filter(|c| c.is_valid())
                .find(|c| !c.regimes_compatible())
                .map(|c| (c.source_regime, c.target_regime, c.direction)),
            Err(_) => None,
        };
        if let Some((source, target, direction)) = offending {
            let cell = ctx.cells.first().copied();
            let pos = cell
                .and_then(|c| grid.cell(c))
                .map(|c| c.pos())
                .unwrap_or_default();
            let mut diag = Diagnostic::new(
                ErrorCategory::Contract,
                Severity::Error,
                pos,
                format!(
                    "region contract {source}->{target} is incompatible with direction {direction}"
                ),
            )
            .with_hint("revoke the offending contract or change the region's regime");
            if let Some(cell) = cell {
                diag = diag.with_cell(cell);
            }
            grid.emit(diag);
            return false;
        }
        ctx.validator.validate(ctx, grid)
    }
}

impl ConstraintValidator for Periscope {
    fn name(&self) -> &str {
        "periscope"
    }

    fn validate(&self, ctx: &ConstraintCtx<'_>, grid: &mut CellGrid) -> bool {
        match ctx.kind {
            ConstraintKind::Syntax => self.validate_syntax(ctx, grid),
            ConstraintKind::Region | ConstraintKind::Regime => self.validate_region(ctx, grid),
            ConstraintKind::Periscope => self.validator.validate(ctx, grid),
            ConstraintKind::Semantic | ConstraintKind::Type | ConstraintKind::Custom => {
                ctx.validator.validate(ctx, grid)
            }
        }
    }
}

impl std::fmt::Debug for Periscope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Periscope")
            .field("mappings", &self.mappings.len())
            .field("contracts", &self.contract_count())
            .field("validator", &self.validator.name())
            .finish_non_exhaustive()
    }
}
