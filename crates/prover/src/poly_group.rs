//! Merkle commitment over a column-major coefficient matrix.
//!
//! A PolyGroup commits to `cols` coefficient vectors of `rows` entries
//! each: every row is hashed into a leaf, leaves fold pairwise up to a
//! single root. The root is the only part of the structure the core
//! consumes (it becomes a method-digest entry and a seal field); query
//! openings belong to the outer proof system.

use rayon::prelude::*;

use rvzk_primitives::{Digest, Fp};

/// A committed coefficient group.
pub struct PolyGroup {
    root: Digest,
    rows: usize,
    cols: usize,
}

impl PolyGroup {
    /// Commit to a `rows x cols` column-major matrix. `rows` must be a
    /// power of two.
    pub fn new(coeffs: &[Fp], cols: usize, rows: usize) -> Self {
        assert_eq!(coeffs.len(), cols * rows);
        assert!(rows.is_power_of_two());

        // Leaf per row: the row's value in every column, in column order.
        let mut layer: Vec<Digest> = (0..rows)
            .into_par_iter()
            .map(|row| {
                let row_vals: Vec<Fp> =
                    (0..cols).map(|col| coeffs[col * rows + row]).collect();
                Digest::hash_fps(&row_vals)
            })
            .collect();

        // Fold pairwise to the root.
        while layer.len() > 1 {
            layer = layer
                .par_chunks(2)
                .map(|pair| Digest::hash_pair(&pair[0], &pair[1]))
                .collect();
        }

        Self { root: layer[0], rows, cols }
    }

    pub fn root(&self) -> &Digest {
        &self.root
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}
