//! Region-lifetime contracts.

use braggi_types::{
    ContractGuarantees, EntityId, PeriscopeDirection, Regime, regime_compatible,
};

/// Lifecycle of a contract. Revoked contracts stay in the vector so that
/// indices into it remain stable; validation simply skips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractState {
    Fresh,
    Valid,
    Revoked,
}

/// A statement that a region/validator pair is authorised, under which
/// guarantee flags, and for which regime pair and direction.
#[derive(Debug, Clone)]
pub struct RegionLifetimeContract {
    pub region_entity: EntityId,
    pub validator_entity: EntityId,
    pub guarantees: ContractGuarantees,
    pub source_regime: Regime,
    pub target_regime: Regime,
    pub direction: PeriscopeDirection,
    state: ContractState,
}

impl RegionLifetimeContract {
    /// A fresh contract. It must be activated (which registration does)
    /// before validation will consult it.
    pub fn new(
        region_entity: EntityId,
        validator_entity: EntityId,
        guarantees: ContractGuarantees,
        source_regime: Regime,
        target_regime: Regime,
        direction: PeriscopeDirection,
    ) -> Self {
        Self {
            region_entity,
            validator_entity,
            guarantees,
            source_regime,
            target_regime,
            direction,
            state: ContractState::Fresh,
        }
    }

    pub fn state(&self) -> ContractState {
        self.state
    }

    /// Fresh → valid. Revoked contracts stay revoked.
    pub fn activate(&mut self) {
        if self.state == ContractState::Fresh {
            self.state = ContractState::Valid;
        }
    }

    pub fn revoke(&mut self) {
        self.state = ContractState::Revoked;
    }

    pub fn is_valid(&self) -> bool {
        self.state == ContractState::Valid
    }

    /// The contract's regime pair checked against the compatibility matrix.
    pub fn regimes_compatible(&self) -> bool {
        regime_compatible(self.source_regime, self.target_regime, self.direction)
    }

    /// Whether this contract admits a cross-region SYNTAX constraint.
    pub fn admits_syntax(&self) -> bool {
        if !self.is_valid() {
            return false;
        }
        if !self
            .guarantees
            .contains(ContractGuarantees::CROSS_REGION_ADJACENCY)
        {
            return false;
        }
        if self.guarantees.contains(ContractGuarantees::REGIME_CHECKED) {
            return self.regimes_compatible();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(
        source: Regime,
        target: Regime,
        direction: PeriscopeDirection,
        guarantees: ContractGuarantees,
    ) -> RegionLifetimeContract {
        RegionLifetimeContract::new(
            EntityId::new(0),
            EntityId::new(1),
            guarantees,
            source,
            target,
            direction,
        )
    }

    #[test]
    fn lifecycle_is_fresh_valid_revoked() {
        let mut c = contract(
            Regime::Rand,
            Regime::Rand,
            PeriscopeDirection::Out,
            ContractGuarantees::default_contract(),
        );
        assert_eq!(c.state(), ContractState::Fresh);
        assert!(!c.is_valid());
        c.activate();
        assert!(c.is_valid());
        c.revoke();
        assert_eq!(c.state(), ContractState::Revoked);
        // A revoked contract cannot be re-activated.
        c.activate();
        assert_eq!(c.state(), ContractState::Revoked);
    }

    #[test]
    fn syntax_admission_requires_cross_region_guarantee() {
        let mut c = contract(
            Regime::Rand,
            Regime::Rand,
            PeriscopeDirection::Out,
            ContractGuarantees::REGION_OUTLIVES_FIELD,
        );
        c.activate();
        assert!(!c.admits_syntax());
    }

    #[test]
    fn regime_checked_contracts_consult_the_matrix() {
        let mut incompatible = contract(
            Regime::Fifo,
            Regime::Filo,
            PeriscopeDirection::In,
            ContractGuarantees::default_contract() | ContractGuarantees::REGIME_CHECKED,
        );
        incompatible.activate();
        assert!(!incompatible.regimes_compatible());
        assert!(!incompatible.admits_syntax());

        let mut compatible = contract(
            Regime::Fifo,
            Regime::Filo,
            PeriscopeDirection::Out,
            ContractGuarantees::default_contract() | ContractGuarantees::REGIME_CHECKED,
        );
        compatible.activate();
        assert!(compatible.admits_syntax());
    }
}
