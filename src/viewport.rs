/// Pure viewport arithmetic for the virtualized list.
///
/// Maps a pixel scroll offset onto the half-open index range of rows that
/// should be materialized, padded symmetrically with `buffer_rows`. This is
/// the single authoritative measurement path; there is deliberately no
/// scrollbar-fraction fallback.
pub fn compute_range(
    scroll_offset_px: f32,
    viewport_height_px: f32,
    row_height_px: f32,
    buffer_rows: usize,
    item_count: usize,
) -> (usize, usize) {
    if item_count == 0 || row_height_px <= 0.0 {
        return (0, 0);
    }

    let offset = scroll_offset_px.max(0.0);
    let first_visible = (offset / row_height_px).floor() as usize;
    let last_visible = ((offset + viewport_height_px.max(0.0)) / row_height_px).ceil() as usize;

    let start = first_visible.saturating_sub(buffer_rows).min(item_count);
    let end = last_visible.saturating_add(buffer_rows).min(item_count);

    (start, end.max(start))
}

/// A zero or degenerate height means the host surface has not been laid out
/// yet. Callers skip the recompute and retry on a later frame instead of
/// acting on a misleading range.
pub fn is_measurable(viewport_height_px: f32) -> bool {
    viewport_height_px > 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list() {
        assert_eq!(compute_range(0.0, 400.0, 50.0, 5, 0), (0, 0));
        assert_eq!(compute_range(5000.0, 400.0, 50.0, 5, 0), (0, 0));
    }

    #[test]
    fn test_basic_window() {
        // 10000 items, 50px rows, 400px viewport, 5 buffer rows, offset 5000px:
        // start = floor(5000/50) - 5 = 95, end = ceil(5400/50) + 5 = 113
        assert_eq!(compute_range(5000.0, 400.0, 50.0, 5, 10000), (95, 113));
    }

    #[test]
    fn test_clamped_at_top() {
        // Buffer cannot push start below zero.
        assert_eq!(compute_range(0.0, 400.0, 50.0, 5, 10000), (0, 13));
    }

    #[test]
    fn test_clamped_at_bottom() {
        // Fully scrolled: 10000 rows at 50px minus the 400px viewport.
        let (start, end) = compute_range(499_600.0, 400.0, 50.0, 5, 10000);
        assert_eq!(start, 9987);
        assert_eq!(end, 10000);
    }

    #[test]
    fn test_bounds_hold_for_arbitrary_inputs() {
        // 0 <= start <= end <= item_count for a sweep of offsets and counts.
        for count in [0usize, 1, 2, 7, 50, 10_000] {
            for offset in [0.0f32, 1.0, 49.9, 50.0, 2_500.0, 1_000_000.0] {
                for buffer in [0usize, 1, 5, 100] {
                    let (start, end) = compute_range(offset, 400.0, 50.0, buffer, count);
                    assert!(start <= end, "start {} > end {}", start, end);
                    assert!(end <= count, "end {} > count {}", end, count);
                }
            }
        }
    }

    #[test]
    fn test_list_shorter_than_viewport() {
        assert_eq!(compute_range(0.0, 400.0, 50.0, 5, 3), (0, 3));
    }

    #[test]
    fn test_degenerate_height_not_measurable() {
        assert!(!is_measurable(0.0));
        assert!(!is_measurable(1.0));
        assert!(is_measurable(120.0));
    }
}
