//! Pairwise STM distance cache with a sliding origin.

/// Square cache of pairwise STM distances.
///
/// The physical table has `(limit + 1)²` cells, allocated once and reused
/// forever. Logical STM position `i` maps to physical row and column
/// `origin + i`; trimming the STM front just advances the origin, and a
/// compaction ("rewrite") copies live rows back to origin 0 one step before
/// the next write would overflow the physical table.
///
/// Row `i` holds the distances from STM instance `i` to every older STM
/// instance in its first `i` logical columns, and 0 on the diagonal.
#[derive(Debug, Clone)]
pub struct SlidingDistanceMatrix {
    cells: Vec<f32>,
    side: usize,
    limit: usize,
    origin: usize,
}

impl SlidingDistanceMatrix {
    /// Allocates the matrix for a total capacity of `limit` instances.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let side = limit + 1;
        Self {
            cells: vec![0.0; side * side],
            side,
            limit,
            origin: 0,
        }
    }

    /// Returns the current physical origin.
    #[must_use]
    pub fn origin(&self) -> usize {
        self.origin
    }

    /// Writes the distance row for the newest STM instance.
    ///
    /// `stm_len` is the STM size including the newest instance. `dists`
    /// holds its distances to the STM in window order; the final diagonal
    /// entry may be omitted (`stm_len - 1` values) or included as a trailing
    /// zero (`stm_len` values). Compacts the table first when the write
    /// would fall outside it.
    ///
    /// # Panics
    ///
    /// Panics if `dists` has neither `stm_len` nor `stm_len - 1` entries.
    pub fn push_row(&mut self, stm_len: usize, dists: &[f32]) {
        assert!(
            dists.len() == stm_len || dists.len() + 1 == stm_len,
            "distance row length {} does not match STM size {}",
            dists.len(),
            stm_len
        );
        if self.origin + stm_len - 1 >= self.limit {
            self.rewrite(stm_len);
        }
        let row = self.origin + stm_len - 1;
        let start = row * self.side + self.origin;
        self.cells[start..start + dists.len()].copy_from_slice(dists);
        // Diagonal: dist(x, x) = 0.
        self.cells[row * self.side + row] = 0.0;
    }

    /// Copies live rows back to physical origin 0.
    fn rewrite(&mut self, stm_len: usize) {
        for i in 0..stm_len.saturating_sub(1) {
            let src = (self.origin + i) * self.side + self.origin;
            let dst = i * self.side;
            self.cells.copy_within(src..src + stm_len - 1, dst);
        }
        self.origin = 0;
    }

    /// Advances the origin past the `n` oldest rows. No data moves.
    pub fn trim_front(&mut self, n: usize) {
        self.origin += n;
    }

    /// Returns logical row `i` restricted to its first `i` columns: the
    /// distances from STM instance `i` to every older STM instance.
    #[must_use]
    pub fn distances_to_older(&self, i: usize) -> &[f32] {
        let start = (self.origin + i) * self.side + self.origin;
        &self.cells[start..start + i]
    }

    /// Returns the cached distance between logical positions `i` and `j`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f32 {
        self.cells[(self.origin + i) * self.side + self.origin + j]
    }

    /// Resets the origin; cell contents are left in place.
    pub fn reset(&mut self) {
        self.origin = 0;
    }
}

#[cfg(test)]
#[path = "matrix_tests.rs"]
mod tests;
