//! Guarantee flags carried by region-lifetime contracts.

use bitflags::bitflags;

bitflags! {
    /// What a region-lifetime contract certifies about its region/validator
    /// pair. A SYNTAX constraint that spans regions is only admitted when a
    /// valid contract carries [`ContractGuarantees::CROSS_REGION_ADJACENCY`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    pub struct ContractGuarantees: u32 {
        /// The region outlives the entropy field it backs.
        const REGION_OUTLIVES_FIELD = 1 << 0;
        /// Constraints may relate cells whose tokens live in different regions.
        const CROSS_REGION_ADJACENCY = 1 << 1;
        /// The regime pair named by the contract has been checked against
        /// the compatibility matrix.
        const REGIME_CHECKED = 1 << 2;
        /// Token borrows held by cells stay valid for the whole parse.
        const TOKENS_PINNED = 1 << 3;
    }
}

impl ContractGuarantees {
    /// The guarantees a synthesised default contract carries.
    pub fn default_contract() -> Self {
        Self::REGION_OUTLIVES_FIELD | Self::CROSS_REGION_ADJACENCY | Self::TOKENS_PINNED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_contract_admits_cross_region() {
        assert!(
            ContractGuarantees::default_contract()
                .contains(ContractGuarantees::CROSS_REGION_ADJACENCY)
        );
    }

    #[test]
    fn flags_serialize_stably() {
        let flags = ContractGuarantees::REGION_OUTLIVES_FIELD;
        let json = serde_json::to_string(&flags);
        // serde support comes from the bitflags feature; round-trip sanity.
        assert!(json.is_ok());
    }
}
