//! Compressed one-to-many relations between mesh entities.

use nalgebra_sparse as nas;
use std::ops::Range;

/// How a lower-dimensional entity sits inside an adjacent higher-dimensional one.
///
/// Stored once per arc of an [`Adjacency`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Orientation {
    which_down: u8,
    rotation: u8,
}

impl Orientation {
    /// Create an orientation from its parts.
    #[inline]
    pub const fn new(which_down: u8, rotation: u8) -> Self {
        Self {
            which_down,
            rotation,
        }
    }

    /// Local index of the lower entity among the higher entity's sub-entities
    /// of that dimension, in the order of the
    /// [`down_template`][crate::simplex::down_template]s.
    #[inline]
    pub const fn which_down(self) -> usize {
        self.which_down as usize
    }

    /// Position in the higher entity's local vertex tuple for the lower entity
    /// where the lower entity's own first vertex appears.
    ///
    /// For an edge this is a single bit:
    /// 0 if the edge runs the same way in both entities, 1 if it's reversed.
    #[inline]
    pub const fn rotation(self) -> usize {
        self.rotation as usize
    }
}

/// A one-to-many relation in compressed row form.
///
/// Row `i` relates entity `i` of the source dimension
/// to the targets `targets[offsets[i]..offsets[i + 1]]`,
/// each arc carrying an [`Orientation`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Adjacency {
    offsets: Vec<usize>,
    targets: Vec<usize>,
    codes: Vec<Orientation>,
}

impl Adjacency {
    /// Assemble an adjacency from raw parts.
    ///
    /// `offsets` must be nondecreasing, start at 0 and end at the number of arcs,
    /// and `targets` and `codes` must both have one entry per arc.
    pub fn new(offsets: Vec<usize>, targets: Vec<usize>, codes: Vec<Orientation>) -> Self {
        debug_assert!(offsets.first() == Some(&0), "offsets must start at 0");
        debug_assert!(
            offsets.windows(2).all(|w| w[0] <= w[1]),
            "offsets must be nondecreasing"
        );
        debug_assert_eq!(offsets.last(), Some(&targets.len()));
        debug_assert_eq!(targets.len(), codes.len());
        Self {
            offsets,
            targets,
            codes,
        }
    }

    /// Assemble an adjacency where every row has the same number of arcs,
    /// e.g. a simplex and its sub-entities.
    pub fn with_degree(degree: usize, targets: Vec<usize>, codes: Vec<Orientation>) -> Self {
        debug_assert_eq!(targets.len() % degree.max(1), 0);
        let row_count = if degree == 0 { 0 } else { targets.len() / degree };
        let offsets = (0..=row_count).map(|row| row * degree).collect();
        Self::new(offsets, targets, codes)
    }

    /// Number of rows, i.e. source entities.
    #[inline]
    pub fn row_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Total number of arcs across all rows.
    #[inline]
    pub fn arc_count(&self) -> usize {
        self.targets.len()
    }

    /// Row offsets, one more than the number of rows.
    #[inline]
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Flattened target entity ids of all arcs.
    #[inline]
    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    /// Flattened orientations of all arcs.
    #[inline]
    pub fn codes(&self) -> &[Orientation] {
        &self.codes
    }

    /// Range of arc indices belonging to a row.
    #[inline]
    pub fn row(&self, row: usize) -> Range<usize> {
        debug_assert!(
            row < self.row_count(),
            "row {row} out of range for an adjacency with {} rows",
            self.row_count()
        );
        self.offsets[row]..self.offsets[row + 1]
    }

    /// Number of arcs in a row.
    #[inline]
    pub fn degree(&self, row: usize) -> usize {
        self.row(row).len()
    }

    /// Targets of the arcs in a row.
    #[inline]
    pub fn targets_of(&self, row: usize) -> &[usize] {
        &self.targets[self.row(row)]
    }

    /// Iterate over `(target, orientation)` pairs of the arcs in a row.
    pub fn arcs_of(&self, row: usize) -> impl '_ + Iterator<Item = (usize, Orientation)> {
        let range = self.row(row);
        self.targets[range.clone()]
            .iter()
            .copied()
            .zip(self.codes[range].iter().copied())
    }
}

impl From<&nas::CsrMatrix<Orientation>> for Adjacency {
    fn from(mat: &nas::CsrMatrix<Orientation>) -> Self {
        Self::new(
            mat.row_offsets().to_vec(),
            mat.col_indices().to_vec(),
            mat.values().to_vec(),
        )
    }
}
