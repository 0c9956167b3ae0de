use serde::Serialize;

use super::color::Hsbk;

/// Matrix lights keep their top cell at row 0, column 0. The rest of row 0
/// is padding and the body starts on the next row.
pub const TOP_CELL: Rect = Rect::cell(0, 0);
pub const BODY_ROW: usize = 1;

/// Inclusive cell range of a matrix: rows `top..=bottom`, columns
/// `left..=right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Rect {
    pub const fn new(top: usize, bottom: usize, left: usize, right: usize) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    pub const fn cell(row: usize, column: usize) -> Self {
        Self::new(row, row, column, column)
    }
}

/// Row-major grid of colours, as read from and written to a matrix light.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorMatrix {
    height: usize,
    width: usize,
    cells: Vec<Hsbk>,
}

impl ColorMatrix {
    pub fn new(height: usize, width: usize, fill: Hsbk) -> Self {
        Self {
            height,
            width,
            cells: vec![fill; height * width],
        }
    }

    /// Rebuild from a flat row-major list. `None` if the length is wrong.
    pub fn from_cells(height: usize, width: usize, cells: Vec<Hsbk>) -> Option<Self> {
        (cells.len() == height * width).then_some(Self {
            height,
            width,
            cells,
        })
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn cells(&self) -> &[Hsbk] {
        &self.cells
    }

    pub fn get(&self, row: usize, column: usize) -> Option<Hsbk> {
        self.index(row, column).and_then(|i| self.cells.get(i)).copied()
    }

    pub fn contains(&self, rect: Rect) -> bool {
        rect.top <= rect.bottom
            && rect.left <= rect.right
            && rect.bottom < self.height
            && rect.right < self.width
    }

    /// Paint every cell of `rect`. Returns false, changing nothing, when the
    /// rectangle is empty or reaches outside the matrix.
    pub fn overlay(&mut self, rect: Rect, color: Hsbk) -> bool {
        if !self.contains(rect) {
            return false;
        }
        let width = self.width;
        for row in self.cells.chunks_mut(width).take(rect.bottom + 1).skip(rect.top) {
            row.iter_mut()
                .take(rect.right + 1)
                .skip(rect.left)
                .for_each(|cell| *cell = color);
        }
        true
    }

    fn index(&self, row: usize, column: usize) -> Option<usize> {
        (row < self.height && column < self.width).then_some(row * self.width + column)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RED: Hsbk = Hsbk::new(0, 65535, 65535, 2700);

    #[test]
    fn flat_cells_round_trip() {
        let cells: Vec<Hsbk> = (0..6u16).map(|n| Hsbk::new(n, n, n, n)).collect();
        let matrix = ColorMatrix::from_cells(2, 3, cells.clone()).unwrap();
        assert_eq!(matrix.cells(), cells.as_slice());
        assert_eq!(matrix.get(1, 0), Some(Hsbk::new(3, 3, 3, 3)));
        assert_eq!(matrix.get(2, 0), None);
        assert!(ColorMatrix::from_cells(2, 2, cells).is_none());
    }

    #[test]
    fn overlay_paints_an_inclusive_rect() {
        let mut matrix = ColorMatrix::new(4, 4, Hsbk::default());
        assert!(matrix.overlay(Rect::new(1, 2, 2, 3), RED));
        let painted: Vec<(usize, usize)> = (0..4)
            .flat_map(|r| (0..4).map(move |c| (r, c)))
            .filter(|&(r, c)| matrix.get(r, c) == Some(RED))
            .collect();
        assert_eq!(painted, [(1, 2), (1, 3), (2, 2), (2, 3)]);
    }

    #[test]
    fn overlay_outside_changes_nothing() {
        let mut matrix = ColorMatrix::new(3, 3, Hsbk::default());
        assert!(!matrix.overlay(Rect::new(2, 3, 0, 0), RED));
        assert!(!matrix.overlay(Rect::new(2, 1, 0, 0), RED));
        assert!(matrix.cells().iter().all(|c| *c == Hsbk::default()));
        assert!(matrix.overlay(Rect::cell(2, 2), RED));
        assert_eq!(matrix.get(2, 2), Some(RED));
    }
}
