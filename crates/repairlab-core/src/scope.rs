//! Per-scope containers: one slot per (motif family, mask) combination.

use crate::motif::MotifFamily;
use serde::{Deserialize, Serialize};

/// Which mask a statistic was collected over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskKind {
    Hazard,
    Outside,
}

/// A (family, mask) accumulation scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub family: MotifFamily,
    pub mask: MaskKind,
}

impl Scope {
    pub const BASE_HAZARD: Self = Self::new(MotifFamily::Base, MaskKind::Hazard);
    pub const BASE_OUTSIDE: Self = Self::new(MotifFamily::Base, MaskKind::Outside);
    pub const OPERATOR_HAZARD: Self = Self::new(MotifFamily::Operator, MaskKind::Hazard);
    pub const OPERATOR_OUTSIDE: Self = Self::new(MotifFamily::Operator, MaskKind::Outside);

    pub const ALL: [Self; 4] = [
        Self::BASE_HAZARD,
        Self::BASE_OUTSIDE,
        Self::OPERATOR_HAZARD,
        Self::OPERATOR_OUTSIDE,
    ];

    #[must_use]
    pub const fn new(family: MotifFamily, mask: MaskKind) -> Self {
        Self { family, mask }
    }
}

/// One value per [`Scope`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeMap<T> {
    pub base_hazard: T,
    pub base_outside: T,
    pub operator_hazard: T,
    pub operator_outside: T,
}

impl<T> ScopeMap<T> {
    pub fn from_fn(mut f: impl FnMut(Scope) -> T) -> Self {
        Self {
            base_hazard: f(Scope::BASE_HAZARD),
            base_outside: f(Scope::BASE_OUTSIDE),
            operator_hazard: f(Scope::OPERATOR_HAZARD),
            operator_outside: f(Scope::OPERATOR_OUTSIDE),
        }
    }

    #[must_use]
    pub fn get(&self, scope: Scope) -> &T {
        match (scope.family, scope.mask) {
            (MotifFamily::Base, MaskKind::Hazard) => &self.base_hazard,
            (MotifFamily::Base, MaskKind::Outside) => &self.base_outside,
            (MotifFamily::Operator, MaskKind::Hazard) => &self.operator_hazard,
            (MotifFamily::Operator, MaskKind::Outside) => &self.operator_outside,
        }
    }

    pub fn get_mut(&mut self, scope: Scope) -> &mut T {
        match (scope.family, scope.mask) {
            (MotifFamily::Base, MaskKind::Hazard) => &mut self.base_hazard,
            (MotifFamily::Base, MaskKind::Outside) => &mut self.base_outside,
            (MotifFamily::Operator, MaskKind::Hazard) => &mut self.operator_hazard,
            (MotifFamily::Operator, MaskKind::Outside) => &mut self.operator_outside,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(Scope, &T) -> U) -> ScopeMap<U> {
        ScopeMap::from_fn(|scope| f(scope, self.get(scope)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Scope, &T)> {
        Scope::ALL.into_iter().map(move |scope| (scope, self.get(scope)))
    }
}

/// One value per motif family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FamilyMap<T> {
    pub base: T,
    pub operator: T,
}

impl<T> FamilyMap<T> {
    pub fn from_fn(mut f: impl FnMut(MotifFamily) -> T) -> Self {
        Self {
            base: f(MotifFamily::Base),
            operator: f(MotifFamily::Operator),
        }
    }

    #[must_use]
    pub fn get(&self, family: MotifFamily) -> &T {
        match family {
            MotifFamily::Base => &self.base,
            MotifFamily::Operator => &self.operator,
        }
    }

    pub fn get_mut(&mut self, family: MotifFamily) -> &mut T {
        match family {
            MotifFamily::Base => &mut self.base,
            MotifFamily::Operator => &mut self.operator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_address_distinct_slots() {
        let mut map: ScopeMap<u32> = ScopeMap::default();
        for (i, scope) in Scope::ALL.into_iter().enumerate() {
            *map.get_mut(scope) = i as u32 + 1;
        }
        assert_eq!(
            map,
            ScopeMap {
                base_hazard: 1,
                base_outside: 2,
                operator_hazard: 3,
                operator_outside: 4
            }
        );
        let doubled = map.map(|_, v| v * 2);
        assert_eq!(doubled.get(Scope::OPERATOR_OUTSIDE), &8);
        assert_eq!(map.iter().count(), 4);
    }
}
