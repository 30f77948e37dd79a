//! Uniform spatial grid indexing dots by their hitboxes.
//!
//! The battlefield is split into square cells stored in row-major order
//! (`row * cols + col`). A dot is registered in every cell touched by one of
//! its four hitbox corners, so a dot no larger than a cell lives in at most
//! four buckets. Points outside the battlefield are clamped to the nearest
//! edge cell.
//!
//! Buckets hold dot ids in ascending order, which keeps every query
//! deterministic given a deterministic registration order.

use std::collections::{btree_set, BTreeSet, HashSet};
use std::f64::consts::SQRT_2;

use serde::{Deserialize, Serialize};

use crate::dot::{Dot, DotId, DotMap};
use crate::error::{Result, SimError};
use crate::geometry::{distance_between, Line, Point, Rect};

/// Spatial index over all live dots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotsGrid {
    cell_size: f64,
    width: f64,
    height: f64,
    cols: usize,
    rows: usize,
    cells: Vec<BTreeSet<DotId>>,
}

impl DotsGrid {
    /// Create a grid covering `width` x `height` with square cells.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidGridDimensions`] unless all three values
    /// are positive and finite.
    pub fn new(cell_size: f64, width: f64, height: f64) -> Result<Self> {
        let valid = [cell_size, width, height]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0);
        if !valid {
            return Err(SimError::InvalidGridDimensions {
                cell_size,
                width,
                height,
            });
        }

        let cols = (width / cell_size).ceil() as usize;
        let rows = (height / cell_size).ceil() as usize;

        Ok(Self {
            cell_size,
            width,
            height,
            cols,
            rows,
            cells: vec![BTreeSet::new(); cols * rows],
        })
    }

    /// Cell edge length.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Battlefield width.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Battlefield height.
    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Total number of cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Unclamped cell coordinates of a point.
    fn raw_cell_coords(&self, point: Point) -> (i64, i64) {
        (
            (point.x / self.cell_size).floor() as i64,
            (point.y / self.cell_size).floor() as i64,
        )
    }

    /// Cell coordinates of a point, clamped to the grid bounds.
    #[must_use]
    pub fn cell_coords(&self, point: Point) -> (usize, usize) {
        let (col, row) = self.raw_cell_coords(point);
        (
            col.clamp(0, self.cols as i64 - 1) as usize,
            row.clamp(0, self.rows as i64 - 1) as usize,
        )
    }

    /// Index of the cell containing `point`, clamped to the grid bounds.
    #[must_use]
    pub fn cell_index(&self, point: Point) -> usize {
        let (col, row) = self.cell_coords(point);
        row * self.cols + col
    }

    /// Distinct cells touched by the corners of a hitbox, in corner order.
    #[must_use]
    pub fn cell_indexes_for_hit_box(&self, hit_box: &Rect) -> Vec<usize> {
        let mut indexes = Vec::with_capacity(4);
        for corner in hit_box.corners() {
            let index = self.cell_index(corner);
            if !indexes.contains(&index) {
                indexes.push(index);
            }
        }
        indexes
    }

    /// World-space bounds of a cell (for debug overlays).
    #[must_use]
    pub fn cell_bounds(&self, index: usize) -> Rect {
        let col = (index % self.cols) as f64;
        let row = (index / self.cols) as f64;
        let x = col * self.cell_size;
        let y = row * self.cell_size;
        Rect {
            p1: Point::new(x, y),
            p2: Point::new(x + self.cell_size, y),
            p3: Point::new(x + self.cell_size, y + self.cell_size),
            p4: Point::new(x, y + self.cell_size),
        }
    }

    /// Dots registered in a cell, in id order.
    pub fn dots_in_cell(&self, index: usize) -> impl Iterator<Item = DotId> + '_ {
        self.cells
            .get(index)
            .into_iter()
            .flat_map(|cell| cell.iter().copied())
    }

    /// Register a dot in the cells covered by its current hitbox.
    pub fn add_dot(&mut self, dot: &mut Dot) {
        if dot.half_diagonal() > self.cell_size {
            tracing::warn!(
                dot = dot.id,
                half_diagonal = dot.half_diagonal(),
                cell_size = self.cell_size,
                "Dot is larger than a grid cell; range queries may miss it"
            );
        }

        let indexes = self.cell_indexes_for_hit_box(&dot.hit_box);
        for &index in &indexes {
            self.cells[index].insert(dot.id);
        }
        dot.grid_square_indexes = indexes;
    }

    /// Remove a dot from every cell it is registered under.
    pub fn remove_dot(&mut self, dot: &mut Dot) {
        for &index in &dot.grid_square_indexes {
            if let Some(cell) = self.cells.get_mut(index) {
                cell.remove(&dot.id);
            }
        }
        dot.grid_square_indexes.clear();
    }

    /// Re-register a dot after its hitbox changed.
    ///
    /// Returns `false` without touching any bucket when the covered cells
    /// are unchanged.
    pub fn update_dot(&mut self, dot: &mut Dot) -> bool {
        let indexes = self.cell_indexes_for_hit_box(&dot.hit_box);

        let unchanged = indexes.len() == dot.grid_square_indexes.len()
            && indexes
                .iter()
                .all(|index| dot.grid_square_indexes.contains(index));
        if unchanged {
            return false;
        }

        for &old in &dot.grid_square_indexes {
            if !indexes.contains(&old) {
                self.cells[old].remove(&dot.id);
            }
        }
        for &new in &indexes {
            if !dot.grid_square_indexes.contains(&new) {
                self.cells[new].insert(dot.id);
            }
        }
        dot.grid_square_indexes = indexes;
        true
    }

    /// All dots whose position lies within `range` of `point` and which
    /// satisfy `predicate`.
    ///
    /// Cells whose whole area is in range are taken without a distance
    /// check for the dots centered inside them; every other candidate is
    /// verified by distance. The scanned ring extends one cell past
    /// `ceil(range / cell_size)` because dots are indexed by their corners,
    /// not their centers.
    ///
    /// Results are unique and in scan order (row-major cells, ids ascending
    /// within a cell).
    pub fn get_dots_in_range<F>(
        &self,
        dots: &DotMap,
        point: Point,
        range: f64,
        predicate: F,
    ) -> Vec<DotId>
    where
        F: Fn(&Dot) -> bool,
    {
        let mut result = Vec::new();
        if range < 0.0 || range.is_nan() {
            return result;
        }

        let (center_col, center_row) = self.raw_cell_coords(point);
        let ring = ((range / self.cell_size).ceil() as i64).saturating_add(1);
        let definite_reach = range - self.cell_size * SQRT_2 / 2.0;

        // Both ends are clamped: dots outside the battlefield live in the
        // edge cells, so a query from out there still scans those cells.
        let last_col = self.cols as i64 - 1;
        let last_row = self.rows as i64 - 1;
        let min_col = center_col.saturating_sub(ring).clamp(0, last_col);
        let max_col = center_col.saturating_add(ring).clamp(0, last_col);
        let min_row = center_row.saturating_sub(ring).clamp(0, last_row);
        let max_row = center_row.saturating_add(ring).clamp(0, last_row);

        let mut seen = HashSet::new();

        for row in min_row..=max_row {
            for col in min_col..=max_col {
                let index = row as usize * self.cols + col as usize;
                let cell_center = Point::new(
                    (col as f64 + 0.5) * self.cell_size,
                    (row as f64 + 0.5) * self.cell_size,
                );
                let definite = distance_between(point, cell_center) <= definite_reach;

                for &id in &self.cells[index] {
                    if !seen.insert(id) {
                        continue;
                    }
                    let Some(dot) = dots.get(&id) else {
                        debug_assert!(false, "grid references unknown dot {id}");
                        continue;
                    };
                    debug_assert!(!dot.removed, "removed dot {id} still in grid");
                    if dot.removed || !predicate(dot) {
                        continue;
                    }

                    let in_range = (definite && self.raw_cell_coords(dot.position) == (col, row))
                        || distance_between(point, dot.position) <= range;
                    if in_range {
                        result.push(id);
                    }
                }
            }
        }

        result
    }

    /// Cells crossed by a segment, from the cell containing `line.p1`
    /// towards `line.p2`.
    #[must_use]
    pub fn cells_along_line(&self, line: Line) -> CellWalk {
        let (col, row) = self.cell_coords(line.p1);
        CellWalk {
            cell_size: self.cell_size,
            cols: self.cols as i64,
            rows: self.rows as i64,
            origin: line.p1,
            delta: line.p2 - line.p1,
            col: col as i64,
            row: row as i64,
            done: false,
        }
    }

    /// Lazily yield every dot registered in the cells crossed by a segment,
    /// cell by cell. Dots spanning several crossed cells are yielded once
    /// per cell.
    #[must_use]
    pub fn iterate_dots_along_line(&self, line: Line) -> DotsAlongLine<'_> {
        DotsAlongLine {
            grid: self,
            walk: self.cells_along_line(line),
            current: None,
        }
    }
}

/// Iterator over the cell indexes crossed by a segment.
///
/// Each step leaves the current cell through whichever border the segment
/// reaches first. The walk stops when the next border lies beyond the
/// segment's end or the next cell is outside the grid, so it takes at most
/// `cols + rows` steps.
#[derive(Debug, Clone)]
pub struct CellWalk {
    cell_size: f64,
    cols: i64,
    rows: i64,
    origin: Point,
    delta: Point,
    col: i64,
    row: i64,
    done: bool,
}

impl CellWalk {
    /// Parametric position (0 at `p1`, 1 at `p2`) where the segment crosses
    /// the border of the current cell on one axis.
    fn border_t(cell: i64, start: f64, delta: f64, cell_size: f64) -> f64 {
        if delta > 0.0 {
            ((cell + 1) as f64 * cell_size - start) / delta
        } else if delta < 0.0 {
            (cell as f64 * cell_size - start) / delta
        } else {
            f64::INFINITY
        }
    }
}

impl Iterator for CellWalk {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let index = (self.row * self.cols + self.col) as usize;

        let tx = Self::border_t(self.col, self.origin.x, self.delta.x, self.cell_size);
        let ty = Self::border_t(self.row, self.origin.y, self.delta.y, self.cell_size);

        let (t, next_col, next_row) = if tx <= ty {
            (tx, self.col + self.delta.x.signum() as i64, self.row)
        } else {
            (ty, self.col, self.row + self.delta.y.signum() as i64)
        };

        let outside = next_col < 0 || next_col >= self.cols || next_row < 0 || next_row >= self.rows;
        if !t.is_finite() || t > 1.0 || outside {
            self.done = true;
        } else {
            self.col = next_col;
            self.row = next_row;
        }

        Some(index)
    }
}

/// Iterator over dots registered in the cells crossed by a segment.
#[derive(Debug, Clone)]
pub struct DotsAlongLine<'a> {
    grid: &'a DotsGrid,
    walk: CellWalk,
    current: Option<btree_set::Iter<'a, DotId>>,
}

impl Iterator for DotsAlongLine<'_> {
    type Item = DotId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(id) = self.current.as_mut().and_then(Iterator::next) {
                return Some(*id);
            }
            let index = self.walk.next()?;
            self.current = Some(self.grid.cells[index].iter());
        }
    }
}
