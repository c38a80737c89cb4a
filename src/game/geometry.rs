use crate::constants::{CELL_HEIGHT, CELL_WIDTH, NUM_HORIZONTAL_CELLS, NUM_VERTICAL_CELLS};
use crate::protocol::StimulusCoords;

/// Pixel extent of one grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRect {
    pub center_x: f64,
    pub center_y: f64,
    pub upper_left_x: f64,
    pub upper_left_y: f64,
    pub width: f64,
    pub height: f64,
}

/// The placement grid shared by both participants. Cells are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub horizontal_cells: i32,
    pub vertical_cells: i32,
    pub cell_width: f64,
    pub cell_height: f64,
    pub padding: f64,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self::with_padding(0.0)
    }
}

impl GridGeometry {
    pub fn with_padding(padding: f64) -> Self {
        Self {
            horizontal_cells: NUM_HORIZONTAL_CELLS,
            vertical_cells: NUM_VERTICAL_CELLS,
            cell_width: CELL_WIDTH,
            cell_height: CELL_HEIGHT,
            padding,
        }
    }

    /// World size in pixels as `(width, height)`.
    pub fn world_size(&self) -> (f64, f64) {
        (
            self.cell_width * self.horizontal_cells as f64 + self.padding,
            self.cell_height * self.vertical_cells as f64 + self.padding,
        )
    }

    /// All cells, row by row.
    pub fn cells(&self) -> Vec<(i32, i32)> {
        (1..=self.vertical_cells)
            .flat_map(|y| (1..=self.horizontal_cells).map(move |x| (x, y)))
            .collect()
    }

    pub fn cell_to_pixel(&self, x: i32, y: i32) -> CellRect {
        let upper_left_x = self.cell_width * (x - 1) as f64 + self.padding / 2.0;
        let upper_left_y = self.cell_height * (y - 1) as f64 + self.padding / 2.0;
        CellRect {
            center_x: upper_left_x + self.cell_width / 2.0,
            center_y: upper_left_y + self.cell_height / 2.0,
            upper_left_x,
            upper_left_y,
            width: self.cell_width,
            height: self.cell_height,
        }
    }

    pub fn pixel_to_cell(&self, px: f64, py: f64) -> (i32, i32) {
        let x = ((px - self.padding / 2.0) / self.cell_width).floor() as i32 + 1;
        let y = ((py - self.padding / 2.0) / self.cell_height).floor() as i32 + 1;
        (x, y)
    }

    pub fn contains_cell(&self, x: i32, y: i32) -> bool {
        (1..=self.horizontal_cells).contains(&x) && (1..=self.vertical_cells).contains(&y)
    }

    /// Top-left corner that centres an object of the given size in cell `(x, y)`.
    pub fn true_coords(&self, x: i32, y: i32, object_width: f64, object_height: f64) -> (f64, f64) {
        let cell = self.cell_to_pixel(x, y);
        (
            cell.center_x - object_width / 2.0,
            cell.center_y - object_height / 2.0,
        )
    }

    pub fn coords_for(
        &self,
        cell: (i32, i32),
        object_width: f64,
        object_height: f64,
    ) -> StimulusCoords {
        let (x, y) = cell;
        let rect = self.cell_to_pixel(x, y);
        let (true_x, true_y) = self.true_coords(x, y, object_width, object_height);
        StimulusCoords {
            grid_x: x,
            grid_y: y,
            true_x,
            true_y,
            grid_pixel_x: rect.center_x - rect.width / 2.0,
            grid_pixel_y: rect.center_y - rect.height / 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_is_three_cells_wide() {
        assert_eq!(GridGeometry::default().world_size(), (900.0, 300.0));
        assert_eq!(GridGeometry::with_padding(20.0).world_size(), (920.0, 320.0));
    }

    #[test]
    fn cell_to_pixel_centres() {
        let grid = GridGeometry::default();
        let rect = grid.cell_to_pixel(2, 1);
        assert_eq!(rect.center_x, 450.0);
        assert_eq!(rect.center_y, 150.0);
        assert_eq!(rect.upper_left_x, 300.0);
        assert_eq!(rect.upper_left_y, 0.0);
        assert_eq!(rect.width, 300.0);
    }

    #[test]
    fn padding_shifts_cells() {
        let grid = GridGeometry::with_padding(10.0);
        let rect = grid.cell_to_pixel(1, 1);
        assert_eq!(rect.upper_left_x, 5.0);
        assert_eq!(rect.center_x, 155.0);
    }

    #[test]
    fn pixel_to_cell_inverts_centres() {
        for padding in [0.0, 10.0, 37.5] {
            let grid = GridGeometry::with_padding(padding);
            for (x, y) in grid.cells() {
                let rect = grid.cell_to_pixel(x, y);
                assert_eq!(grid.pixel_to_cell(rect.center_x, rect.center_y), (x, y));
            }
        }
    }

    #[test]
    fn pixel_to_cell_floors_edges() {
        let grid = GridGeometry::default();
        assert_eq!(grid.pixel_to_cell(0.0, 0.0), (1, 1));
        assert_eq!(grid.pixel_to_cell(299.9, 299.9), (1, 1));
        assert_eq!(grid.pixel_to_cell(300.0, 10.0), (2, 1));
        assert_eq!(grid.pixel_to_cell(-1.0, 10.0), (0, 1));
        assert!(!grid.contains_cell(0, 1));
        assert!(!grid.contains_cell(4, 1));
        assert!(grid.contains_cell(3, 1));
    }

    #[test]
    fn coords_centre_object_in_cell() {
        let grid = GridGeometry::default();
        let coords = grid.coords_for((3, 1), 200.0, 100.0);
        assert_eq!(coords.grid_x, 3);
        assert_eq!(coords.grid_y, 1);
        assert_eq!(coords.true_x, 750.0 - 100.0);
        assert_eq!(coords.true_y, 150.0 - 50.0);
        assert_eq!(coords.grid_pixel_x, 600.0);
        assert_eq!(coords.grid_pixel_y, 0.0);
    }

    #[test]
    fn three_cells_in_one_row() {
        assert_eq!(GridGeometry::default().cells(), vec![(1, 1), (2, 1), (3, 1)]);
    }
}
