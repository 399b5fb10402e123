//! Per-entity component bit masks.

use braggi_types::ComponentTypeId;

/// A set of component types, one bit per registered type id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentMask(u64);

impl ComponentMask {
    pub fn empty() -> Self {
        Self(0)
    }

    /// Builder-style union with one type bit.
    pub fn with(mut self, ty: ComponentTypeId) -> Self {
        self.set(ty);
        self
    }

    pub fn set(&mut self, ty: ComponentTypeId) {
        self.0 |= 1u64 << ty.get();
    }

    pub fn clear(&mut self, ty: ComponentTypeId) {
        self.0 &= !(1u64 << ty.get());
    }

    pub fn contains(self, ty: ComponentTypeId) -> bool {
        self.0 & (1u64 << ty.get()) != 0
    }

    /// True iff every bit of `other` is set in `self`.
    pub fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u64 {
        self.0
    }
}
