/// Every width a buffer view can have, sorted from the widest to the narrowest.
pub const WIDTHS: [usize; 9] = [512, 256, 128, 64, 32, 8, 4, 2, 1];

/// Selects the width of a staging window over the remaining bytes of a region.
///
/// Returns the largest supported width that does not exceed `remaining`, or `None`
/// when nothing remains.
///
/// # Examples
///
/// ```
/// use nmem_buffers::widths::window_width;
///
/// assert_eq!(window_width(0), None);
/// assert_eq!(window_width(1), Some(1));
/// assert_eq!(window_width(7), Some(4));
/// assert_eq!(window_width(31), Some(8));
/// assert_eq!(window_width(32), Some(32));
/// assert_eq!(window_width(600), Some(512));
/// ```
#[inline]
pub fn window_width(remaining: usize) -> Option<usize> {
    WIDTHS.iter().copied().find(|&w| w <= remaining)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths_sorted_descending() {
        assert!(WIDTHS.windows(2).all(|w| w[0] > w[1]));
        assert!(WIDTHS.iter().all(|w| w.is_power_of_two()));
    }

    #[test]
    fn test_window_width_boundaries() {
        for &w in &WIDTHS {
            assert_eq!(window_width(w), Some(w));
            if w > 1 {
                assert!(window_width(w - 1).unwrap() < w);
            }
        }
        assert_eq!(window_width(9), Some(8));
        assert_eq!(window_width(88), Some(64));
        assert_eq!(window_width(usize::MAX), Some(512));
    }
}
