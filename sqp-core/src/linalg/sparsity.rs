//! CSC sparsity patterns, stored separately from the values they index.
//!
//! The solver keeps one immutable `Sparsity` per matrix (constraint
//! Jacobian, Lagrangian Hessian) and streams values through caller-owned
//! slices laid out in pattern order. Patterns are built from raw CSC
//! structure or extracted from `sprs` matrices.

use serde::{Deserialize, Serialize};
use sprs::{CsMat, TriMat};
use thiserror::Error;

/// Pattern construction errors.
#[derive(Debug, Error)]
pub enum SparsityError {
    /// Column pointer array has the wrong length or is not monotone.
    #[error("invalid column pointers: {0}")]
    InvalidColind(String),

    /// Row index out of range or out of order within a column.
    #[error("invalid row index in column {col}: {msg}")]
    InvalidRow {
        /// Column containing the offending entry
        col: usize,
        /// Description of the violation
        msg: String,
    },
}

/// Compressed sparse column pattern (structure only, no values).
///
/// Row indices are strictly increasing within each column. Values for a
/// matrix with this pattern live in a `&[f64]` of length `nnz()`, ordered
/// column-major by pattern position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sparsity {
    nrow: usize,
    ncol: usize,
    colind: Vec<usize>,
    row: Vec<usize>,
}

impl Sparsity {
    /// Build a pattern from raw CSC structure, validating it.
    pub fn new(
        nrow: usize,
        ncol: usize,
        colind: Vec<usize>,
        row: Vec<usize>,
    ) -> Result<Self, SparsityError> {
        if colind.len() != ncol + 1 {
            return Err(SparsityError::InvalidColind(format!(
                "expected {} column pointers, got {}",
                ncol + 1,
                colind.len()
            )));
        }
        if colind[0] != 0 || colind[ncol] != row.len() {
            return Err(SparsityError::InvalidColind(format!(
                "pointers must start at 0 and end at nnz = {}",
                row.len()
            )));
        }
        for cc in 0..ncol {
            if colind[cc] > colind[cc + 1] {
                return Err(SparsityError::InvalidColind(format!(
                    "pointers decrease at column {}",
                    cc
                )));
            }
            let mut last: Option<usize> = None;
            for &rr in &row[colind[cc]..colind[cc + 1]] {
                if rr >= nrow {
                    return Err(SparsityError::InvalidRow {
                        col: cc,
                        msg: format!("row {} >= nrow {}", rr, nrow),
                    });
                }
                if let Some(prev) = last {
                    if rr <= prev {
                        return Err(SparsityError::InvalidRow {
                            col: cc,
                            msg: format!("row {} after row {}", rr, prev),
                        });
                    }
                }
                last = Some(rr);
            }
        }
        Ok(Self {
            nrow,
            ncol,
            colind,
            row,
        })
    }

    /// Fully dense pattern (every entry present, column-major).
    pub fn dense(nrow: usize, ncol: usize) -> Self {
        let colind = (0..=ncol).map(|cc| cc * nrow).collect();
        let row = (0..ncol).flat_map(|_| 0..nrow).collect();
        Self {
            nrow,
            ncol,
            colind,
            row,
        }
    }

    /// Pattern with no entries.
    pub fn empty(nrow: usize, ncol: usize) -> Self {
        Self {
            nrow,
            ncol,
            colind: vec![0; ncol + 1],
            row: Vec::new(),
        }
    }

    /// Build a pattern from (row, col) coordinates.
    ///
    /// Duplicates collapse to a single entry.
    pub fn from_triplets(nrow: usize, ncol: usize, entries: &[(usize, usize)]) -> Self {
        let mut tri = TriMat::new((nrow, ncol));
        for &(r, c) in entries {
            tri.add_triplet(r, c, 1.0);
        }
        Self::from_csmat(&tri.to_csc())
    }

    /// Extract the pattern of a `sprs` matrix.
    pub fn from_csmat(mat: &CsMat<f64>) -> Self {
        let csc = if mat.is_csc() {
            mat.to_owned()
        } else {
            mat.to_csc()
        };
        Self {
            nrow: csc.rows(),
            ncol: csc.cols(),
            colind: csc.indptr().to_proper().to_vec(),
            row: csc.indices().to_vec(),
        }
    }

    /// Number of rows.
    #[inline]
    pub fn nrow(&self) -> usize {
        self.nrow
    }

    /// Number of columns.
    #[inline]
    pub fn ncol(&self) -> usize {
        self.ncol
    }

    /// Number of stored entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.row.len()
    }

    /// Whether every entry is present.
    pub fn is_dense(&self) -> bool {
        self.nnz() == self.nrow * self.ncol
    }

    /// Pattern positions belonging to column `cc`.
    #[inline]
    pub fn col_range(&self, cc: usize) -> std::ops::Range<usize> {
        self.colind[cc]..self.colind[cc + 1]
    }

    /// Row index stored at pattern position `el`.
    #[inline]
    pub fn row_at(&self, el: usize) -> usize {
        self.row[el]
    }

    /// Iterate stored entries as `(row, col, position)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        (0..self.ncol).flat_map(move |cc| {
            self.col_range(cc)
                .map(move |el| (self.row[el], cc, el))
        })
    }
}
