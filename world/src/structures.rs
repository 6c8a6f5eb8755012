//! Authoritative structure state management utilities.

use std::collections::BTreeMap;

use nighthold_core::{CellRect, CellRectSize, StructureId, StructureKind};

/// Snapshot of a structure stored inside the world.
#[derive(Clone, Debug)]
pub(crate) struct StructureState {
    /// Identifier allocated by the world for the structure.
    pub(crate) id: StructureId,
    /// Kind of structure that was constructed.
    pub(crate) kind: StructureKind,
    /// Region of cells occupied by the structure.
    pub(crate) region: CellRect,
}

/// Registry that stores structures and manages identifier allocation.
#[derive(Debug)]
pub(crate) struct StructureRegistry {
    entries: BTreeMap<StructureId, StructureState>,
    next_structure_id: StructureId,
}

impl StructureRegistry {
    /// Creates an empty structure registry with a reset identifier counter.
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_structure_id: StructureId::new(0),
        }
    }

    /// Stores a structure under a freshly allocated identifier.
    pub(crate) fn insert(&mut self, kind: StructureKind, region: CellRect) -> StructureId {
        let id = self.next_structure_id;
        self.next_structure_id = StructureId::new(id.get().saturating_add(1));
        let _ = self.entries.insert(id, StructureState { id, kind, region });
        id
    }

    /// Removes a structure, yielding its stored state if it existed.
    ///
    /// Identifiers are never reused; the counter keeps climbing.
    pub(crate) fn remove(&mut self, id: StructureId) -> Option<StructureState> {
        self.entries.remove(&id)
    }

    /// Iterates the stored structures in ascending identifier order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &StructureState> {
        self.entries.values()
    }
}

/// Reports the footprint size associated with a structure kind.
pub(crate) fn footprint_for(kind: StructureKind) -> CellRectSize {
    match kind {
        StructureKind::Wall => CellRectSize::new(1, 1),
        StructureKind::Tower => CellRectSize::new(2, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nighthold_core::CellCoord;

    #[test]
    fn wall_footprint_is_a_single_cell() {
        let footprint = footprint_for(StructureKind::Wall);
        assert_eq!(footprint.width(), 1);
        assert_eq!(footprint.height(), 1);
    }

    #[test]
    fn tower_footprint_is_two_by_two() {
        let footprint = footprint_for(StructureKind::Tower);
        assert_eq!(footprint.width(), 2);
        assert_eq!(footprint.height(), 2);
    }

    #[test]
    fn identifiers_allocate_in_ascending_order() {
        let mut registry = StructureRegistry::new();
        let region = CellRect::from_origin_and_size(CellCoord::new(0, 0), CellRectSize::new(1, 1));

        let first = registry.insert(StructureKind::Wall, region);
        let second = registry.insert(StructureKind::Tower, region);

        assert_eq!(first, StructureId::new(0));
        assert_eq!(second, StructureId::new(1));
    }

    #[test]
    fn removal_yields_the_stored_state_exactly_once() {
        let mut registry = StructureRegistry::new();
        let region = CellRect::from_origin_and_size(CellCoord::new(3, 4), CellRectSize::new(2, 2));
        let id = registry.insert(StructureKind::Tower, region);

        let removed = registry.remove(id);
        assert!(removed.is_some_and(|state| state.kind == StructureKind::Tower
            && state.region == region
            && state.id == id));
        assert!(registry.remove(id).is_none());
    }

    #[test]
    fn removal_never_recycles_identifiers() {
        let mut registry = StructureRegistry::new();
        let region = CellRect::from_origin_and_size(CellCoord::new(0, 0), CellRectSize::new(1, 1));

        let first = registry.insert(StructureKind::Wall, region);
        let _ = registry.remove(first);
        let second = registry.insert(StructureKind::Wall, region);

        assert_eq!(second, StructureId::new(1));
    }
}
