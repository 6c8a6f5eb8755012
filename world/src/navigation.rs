//! Distance-to-objective field kept in step with the obstacle grid.
//!
//! Every grid change floods the field anew from the free objective cells:
//! each passable cell ends up carrying its step count toward the nearest
//! sink, and cells the flood never touches keep the sentinel the navigation
//! view reports as unreachable.

use std::collections::VecDeque;

use nighthold_core::{CellCoord, NavigationView, Obstacle};

/// Row-major step counts from every passable cell to the closest sink.
#[derive(Clone, Debug, Default)]
pub(crate) struct NavigationField {
    columns: u32,
    rows: u32,
    distances: Vec<u16>,
    frontier: VecDeque<usize>,
}

impl NavigationField {
    /// Floods the field from `sinks` across the given obstacle slice.
    ///
    /// Occupied sinks seed nothing, so a fully sealed objective row yields a
    /// field without a single reachable cell.
    pub(crate) fn rebuild(
        &mut self,
        columns: u32,
        rows: u32,
        sinks: &[CellCoord],
        obstacles: &[Option<Obstacle>],
    ) {
        self.columns = columns;
        self.rows = rows;
        let cell_count = usize::try_from(columns)
            .ok()
            .zip(usize::try_from(rows).ok())
            .and_then(|(columns, rows)| columns.checked_mul(rows))
            .unwrap_or(0);
        self.distances.clear();
        self.distances
            .resize(cell_count, NavigationView::UNREACHABLE);
        self.frontier.clear();

        for sink in sinks {
            let Some(slot) = self.cell_slot(*sink) else {
                continue;
            };
            let occupied = obstacles.get(slot).copied().flatten().is_some();
            if occupied || self.distances[slot] == 0 {
                continue;
            }
            self.distances[slot] = 0;
            self.frontier.push_back(slot);
        }

        let column_count = usize::try_from(columns).unwrap_or(0);
        while let Some(slot) = self.frontier.pop_front() {
            let next = self.distances[slot].saturating_add(1);
            if next == NavigationView::UNREACHABLE {
                continue;
            }
            let column = slot % column_count;
            if slot >= column_count {
                self.relax(slot - column_count, next, obstacles);
            }
            if column + 1 < column_count {
                self.relax(slot + 1, next, obstacles);
            }
            if slot + column_count < cell_count {
                self.relax(slot + column_count, next, obstacles);
            }
            if column > 0 {
                self.relax(slot - 1, next, obstacles);
            }
        }
    }

    /// Column count of the field.
    #[must_use]
    pub(crate) fn columns(&self) -> u32 {
        self.columns
    }

    /// Row count of the field.
    #[must_use]
    pub(crate) fn rows(&self) -> u32 {
        self.rows
    }

    /// Dense row-major distances backing the navigation view.
    #[must_use]
    pub(crate) fn cells(&self) -> &[u16] {
        &self.distances
    }

    /// Step count recorded for `cell`, if the cell lies inside the field.
    #[must_use]
    pub(crate) fn distance(&self, cell: CellCoord) -> Option<u16> {
        let slot = self.cell_slot(cell)?;
        self.distances.get(slot).copied()
    }

    fn relax(&mut self, slot: usize, next: u16, obstacles: &[Option<Obstacle>]) {
        if obstacles.get(slot).copied().flatten().is_some() {
            return;
        }
        if self.distances[slot] <= next {
            return;
        }
        self.distances[slot] = next;
        self.frontier.push_back(slot);
    }

    fn cell_slot(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() >= self.columns || cell.row() >= self.rows {
            return None;
        }
        let column = usize::try_from(cell.column()).ok()?;
        let row = usize::try_from(cell.row()).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLUMNS: u32 = 4;
    const ROWS: u32 = 3;

    fn open_grid() -> Vec<Option<Obstacle>> {
        vec![None; (COLUMNS * ROWS) as usize]
    }

    fn bottom_row() -> Vec<CellCoord> {
        (0..COLUMNS)
            .map(|column| CellCoord::new(column, ROWS - 1))
            .collect()
    }

    #[test]
    fn every_free_cell_learns_its_steps_to_the_nearest_sink() {
        let mut field = NavigationField::default();
        field.rebuild(COLUMNS, ROWS, &bottom_row(), &open_grid());

        assert_eq!(field.distance(CellCoord::new(2, 2)), Some(0));
        assert_eq!(field.distance(CellCoord::new(2, 1)), Some(1));
        assert_eq!(field.distance(CellCoord::new(0, 0)), Some(2));
        assert_eq!(field.distance(CellCoord::new(5, 0)), None);
    }

    #[test]
    fn the_flood_detours_around_an_occupied_cell() {
        let mut grid = open_grid();
        grid[(COLUMNS + 1) as usize] = Some(Obstacle::Terrain);
        let sinks = [CellCoord::new(1, 2)];
        let mut field = NavigationField::default();
        field.rebuild(COLUMNS, ROWS, &sinks, &grid);

        assert_eq!(
            field.distance(CellCoord::new(1, 1)),
            Some(NavigationView::UNREACHABLE)
        );
        assert_eq!(field.distance(CellCoord::new(1, 0)), Some(4));
    }

    #[test]
    fn a_fully_occupied_sink_row_leaves_the_field_unreachable() {
        let mut grid = open_grid();
        for column in 0..COLUMNS {
            grid[((ROWS - 1) * COLUMNS + column) as usize] = Some(Obstacle::Terrain);
        }
        let mut field = NavigationField::default();
        field.rebuild(COLUMNS, ROWS, &bottom_row(), &grid);

        assert!(field
            .cells()
            .iter()
            .all(|&distance| distance == NavigationView::UNREACHABLE));
    }

    #[test]
    fn a_rebuild_discards_the_previous_field() {
        let mut field = NavigationField::default();
        field.rebuild(COLUMNS, ROWS, &bottom_row(), &open_grid());
        assert_eq!(field.distance(CellCoord::new(1, 0)), Some(2));

        let mut sealed = open_grid();
        for column in 0..COLUMNS {
            sealed[(COLUMNS + column) as usize] = Some(Obstacle::Terrain);
        }
        field.rebuild(COLUMNS, ROWS, &bottom_row(), &sealed);

        assert_eq!(
            field.distance(CellCoord::new(1, 0)),
            Some(NavigationView::UNREACHABLE)
        );
        assert_eq!(field.distance(CellCoord::new(1, 2)), Some(0));
    }
}
