//! Test data generators with values that encode their own position.

/// Row-major 2-D grid where each cell holds `row * 1000 + col`.
///
/// Makes it easy to check that a slice came from the right place:
/// `grid[r * cols + c] == r * 1000 + c`.
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(3, 4);
/// assert_eq!(grid.len(), 12);
/// assert_eq!(grid[5], 1001); // row 1, col 1
/// ```
pub fn create_test_grid(rows: usize, cols: usize) -> Vec<i32> {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            data.push((row * 1000 + col) as i32);
        }
    }
    data
}

/// Expected contents of `rows` of a grid from `create_test_grid`.
pub fn expected_grid_rows(rows: std::ops::Range<usize>, cols: usize) -> Vec<i32> {
    rows.flat_map(|row| (0..cols).map(move |col| (row * 1000 + col) as i32))
        .collect()
}

/// `0.0, 1.0, 2.0, ...`
pub fn create_ramp(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64).collect()
}

/// Monotonic event times sampled at `rate` Hz with a small deterministic jitter.
pub fn create_event_times(count: usize, rate: f64) -> Vec<f64> {
    (0..count)
        .map(|i| {
            let jitter = ((i * 7919) % 13) as f64 / 13.0 * 0.5;
            (i as f64 + jitter) / rate
        })
        .collect()
}

/// Deterministic pseudo-random samples in `[-amplitude, amplitude]`.
pub fn create_noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            (unit * 2.0 - 1.0) * amplitude
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_rows() {
        let grid = create_test_grid(5, 3);
        assert_eq!(&grid[6..12], expected_grid_rows(2..4, 3).as_slice());
    }

    #[test]
    fn test_event_times_increase() {
        let times = create_event_times(100, 30.0);
        assert!(times.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_noise_is_bounded_and_repeatable() {
        let a = create_noise(256, 2.0, 42);
        assert!(a.iter().all(|v| v.abs() <= 2.0));
        assert_eq!(a, create_noise(256, 2.0, 42));
    }
}
