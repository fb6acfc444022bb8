//! Regular sampling of a box region and subdivision of its cells.

use crate::bounder::BoundError;

/// A cubic-ish cell of the sampling grid, identified by its center.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub center: Vec<f64>,
    /// Length of the cell's diagonal
    pub diameter: f64,
}

/// Cell centers covering a box, plus the cell shape shared by all cells.
#[derive(Debug, Clone)]
pub struct Grid {
    pub cells: Vec<Cell>,
    /// Per-axis ratio of cell side to cell diameter. Subdivision keeps the
    /// shape, so the ratio holds for every descendant cell.
    pub side_to_diameter: Vec<f64>,
}

impl Grid {
    /// Split `region` into roughly `sample_size` equal cells. Each axis gets
    /// `ceil(width / side)` cells where `side` is the edge of a cube with the
    /// average cell volume, and must end up with more than one cell.
    pub fn regular(region: &[(f64, f64)], sample_size: usize) -> Result<Self, BoundError> {
        let dimension = region.len() as f64;
        let volume: f64 = region.iter().map(|(lo, hi)| hi - lo).product();
        let reference_side = (volume / sample_size as f64).powf(1.0 / dimension);

        let mut axes = Vec::with_capacity(region.len());
        let mut sides = Vec::with_capacity(region.len());
        for (axis, &(lo, hi)) in region.iter().enumerate() {
            let count = ((hi - lo) / reference_side).ceil();
            if !(count > 1.0) || !count.is_finite() {
                return Err(BoundError::TooFewSamples {
                    axis,
                    sample_size,
                });
            }
            let count = count as usize;
            let side = (hi - lo) / count as f64;
            axes.push((0..count).map(|i| lo + side * (i as f64 + 0.5)).collect::<Vec<_>>());
            sides.push(side);
        }

        let diameter = sides.iter().map(|s| s * s).sum::<f64>().sqrt();
        let side_to_diameter = sides.iter().map(|s| s / diameter).collect();
        let cells = cartesian(&axes)
            .into_iter()
            .map(|center| Cell { center, diameter })
            .collect();

        Ok(Self {
            cells,
            side_to_diameter,
        })
    }

    /// The `2^d` children of `cell`: centers moved a quarter side along each
    /// axis in both directions, diameter halved.
    pub fn split(&self, cell: &Cell) -> Vec<Cell> {
        let dimension = self.side_to_diameter.len();
        (0..1usize << dimension)
            .map(|mask| {
                let center = cell
                    .center
                    .iter()
                    .zip(&self.side_to_diameter)
                    .enumerate()
                    .map(|(axis, (x, ratio))| {
                        let sign = if mask & (1 << axis) != 0 { 1.0 } else { -1.0 };
                        x + sign * 0.25 * ratio * cell.diameter
                    })
                    .collect();
                Cell {
                    center,
                    diameter: cell.diameter / 2.0,
                }
            })
            .collect()
    }
}

fn cartesian(axes: &[Vec<f64>]) -> Vec<Vec<f64>> {
    axes.iter().fold(vec![Vec::new()], |prefixes, axis| {
        prefixes
            .iter()
            .flat_map(|prefix| {
                axis.iter().map(move |&x| {
                    let mut point = prefix.clone();
                    point.push(x);
                    point
                })
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_regular_one_dimension() {
        let grid = Grid::regular(&[(0.0, 1.0)], 4).unwrap();
        let centers: Vec<f64> = grid.cells.iter().map(|c| c.center[0]).collect();
        assert_eq!(centers.len(), 4);
        for (got, want) in centers.iter().zip([0.125, 0.375, 0.625, 0.875]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(grid.cells[0].diameter, 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(grid.side_to_diameter[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_regular_two_dimensions() {
        let grid = Grid::regular(&[(0.0, 2.0), (0.0, 1.0)], 8).unwrap();
        // reference side 0.5: 4 x 2 cells
        assert_eq!(grid.cells.len(), 8);
        assert_abs_diff_eq!(grid.cells[0].diameter, 0.5 * 2f64.sqrt(), epsilon = 1e-12);
        assert_eq!(grid.cells[0].center, vec![0.25, 0.25]);
        assert_eq!(grid.cells[1].center, vec![0.25, 0.75]);
    }

    #[test]
    fn test_too_few_cells() {
        let err = Grid::regular(&[(0.0, 1.0), (0.0, 100.0)], 4).unwrap_err();
        assert!(matches!(err, BoundError::TooFewSamples { axis: 0, .. }));

        let err = Grid::regular(&[(1.0, 1.0)], 10).unwrap_err();
        assert!(matches!(err, BoundError::TooFewSamples { axis: 0, .. }));
    }

    #[test]
    fn test_split_covers_parent() {
        let grid = Grid::regular(&[(0.0, 2.0), (0.0, 2.0)], 4).unwrap();
        let parent = &grid.cells[0];
        let children = grid.split(parent);

        assert_eq!(children.len(), 4);
        for child in &children {
            assert_abs_diff_eq!(child.diameter, parent.diameter / 2.0, epsilon = 1e-12);
            for (c, p) in child.center.iter().zip(&parent.center) {
                assert_abs_diff_eq!((c - p).abs(), 0.25, epsilon = 1e-12);
            }
        }
    }
}
