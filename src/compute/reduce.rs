//! Pairwise tree reduction over match flags.
//!
//! Each pass halves the live length: `dst[i] = src[2i] + src[2i + 1]`.
//! Inputs are zero-padded to a power of two so every pass sees an even length.

use rayon::prelude::*;

/// Length an input of `n` elements is padded to.
#[inline]
pub fn padded_len(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// One reduction pass. `dst` must hold at least `src.len() / 2` elements.
pub fn reduce_pass(src: &[u32], dst: &mut [u32]) {
    debug_assert!(src.len() % 2 == 0);
    let half = src.len() / 2;
    dst[..half]
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, out)| *out = src[2 * i] + src[2 * i + 1]);
}

/// Two buffers ping-ponged across passes, allocated once.
#[derive(Debug, Clone)]
pub struct Reducer {
    buffers: [Vec<u32>; 2],
    len: usize,
}

impl Reducer {
    /// Reducer for inputs of up to `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        let padded = padded_len(capacity);
        Self {
            buffers: [vec![0; padded], vec![0; padded / 2 + 1]],
            len: 0,
        }
    }

    /// Padded capacity of the input buffer.
    pub fn capacity(&self) -> usize {
        self.buffers[0].len()
    }

    /// Input slice for `n` elements. The padding tail is zeroed.
    ///
    /// Grows the buffers if `n` exceeds the capacity.
    pub fn input(&mut self, n: usize) -> &mut [u32] {
        let padded = padded_len(n);
        if padded > self.buffers[0].len() {
            self.buffers[0].resize(padded, 0);
            self.buffers[1].resize(padded / 2 + 1, 0);
        }
        self.len = padded;
        self.buffers[0][n..padded].fill(0);
        &mut self.buffers[0][..n]
    }

    /// Reduce the current input to a single sum.
    pub fn reduce(&mut self) -> u32 {
        let mut len = self.len;
        if len == 0 {
            return 0;
        }
        let mut src = 0;
        while len > 1 {
            let [a, b] = &mut self.buffers;
            let (from, to) = if src == 0 { (&*a, b) } else { (&*b, a) };
            reduce_pass(&from[..len], to);
            len /= 2;
            src = 1 - src;
        }
        self.buffers[src][0]
    }
}

/// Sum `values` through a fresh [`Reducer`].
pub fn reduce_sum(values: &[u32]) -> u32 {
    let mut reducer = Reducer::new(values.len());
    reducer.input(values.len()).copy_from_slice(values);
    reducer.reduce()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 1);
        assert_eq!(padded_len(1), 1);
        assert_eq!(padded_len(5), 8);
        assert_eq!(padded_len(65536), 65536);
    }

    #[test]
    fn test_full_grid() {
        assert_eq!(reduce_sum(&vec![1; 256 * 256]), 65536);
    }

    #[test]
    fn test_reuse_clears_padding() {
        let mut reducer = Reducer::new(8);
        reducer.input(8).fill(1);
        assert_eq!(reducer.reduce(), 8);

        // Stale ones past n must not leak into the next sum.
        reducer.input(5).fill(1);
        assert_eq!(reducer.reduce(), 5);
    }

    #[test]
    fn test_grows_past_capacity() {
        let mut reducer = Reducer::new(4);
        reducer.input(100).fill(1);
        assert_eq!(reducer.reduce(), 100);
    }

    proptest! {
        #[test]
        fn prop_sum_equals_count_of_ones(flags in prop::collection::vec(0u32..=1, 0..3000)) {
            let ones = flags.iter().filter(|&&f| f == 1).count() as u32;
            prop_assert_eq!(reduce_sum(&flags), ones);
        }

        #[test]
        fn prop_each_pass_preserves_total(values in prop::collection::vec(0u32..1000, 1..1024)) {
            let mut src = values.clone();
            src.resize(padded_len(values.len()), 0);
            let total: u32 = src.iter().sum();

            while src.len() > 1 {
                let mut dst = vec![0; src.len() / 2];
                reduce_pass(&src, &mut dst);
                prop_assert_eq!(dst.iter().sum::<u32>(), total);
                src = dst;
            }
            prop_assert_eq!(src[0], total);
        }
    }
}
