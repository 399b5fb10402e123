//! Core type definitions shared by every Braggi crate: dense id newtypes,
//! source positions, the token contract exposed by the external lexer,
//! memory regimes, and contract guarantee flags.

pub mod diag;
pub mod flags;
pub mod pos;
pub mod regime;
pub mod token;

pub use diag::Diagnostic;
pub use flags::ContractGuarantees;
pub use pos::SourcePos;
pub use regime::{PeriscopeDirection, Regime, regime_compatible};
pub use token::{Token, TokenKind, TokenSource, VecTokenSource};

macro_rules! dense_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            pub fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub fn get(self) -> u32 {
                self.0
            }

            /// The id as a vector index.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

dense_id!(
    /// Identifies a memory region within a parse.
    RegionId
);
dense_id!(
    /// Identifies a cell within an entropy field. Dense and 0-based.
    CellId
);
dense_id!(
    /// Identifies a constraint within an entropy field.
    ConstraintId
);
dense_id!(
    /// Identifies an entropy field within a parse session.
    FieldId
);
dense_id!(
    /// Identifies an entity in an ECS world.
    EntityId
);
dense_id!(
    /// Identifies a pattern in a constraint-pattern library.
    PatternId
);
dense_id!(
    /// Identifies a token owned by the external token manager.
    TokenId
);
dense_id!(
    /// Identifies a registered component type in an ECS world.
    ComponentTypeId
);

/// The kind of an entropy constraint, deciding how the periscope
/// dispatches its validation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Syntax,
    Semantic,
    Type,
    Region,
    Regime,
    Periscope,
    Custom,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Syntax => "syntax",
            Self::Semantic => "semantic",
            Self::Type => "type",
            Self::Region => "region",
            Self::Regime => "regime",
            Self::Periscope => "periscope",
            Self::Custom => "custom",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        let cell = CellId::new(7);
        assert_eq!(cell.get(), 7);
        assert_eq!(cell.index(), 7);
        assert_eq!(cell.to_string(), "7");
        assert_eq!(CellId::from(7), cell);
    }

    #[test]
    fn ids_order_densely() {
        assert!(CellId::new(0) < CellId::new(1));
        assert!(PatternId::new(3) > PatternId::new(2));
    }
}
