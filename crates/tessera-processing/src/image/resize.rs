use image::imageops::FilterType;

/// Pick a resampling filter from the downscale ratio.
///
/// Large reductions use cheaper filters; the visual difference is negligible there.
pub fn select_filter(
    orig_width: u32,
    orig_height: u32,
    new_width: u32,
    new_height: u32,
) -> FilterType {
    let width_ratio = orig_width as f32 / new_width.max(1) as f32;
    let height_ratio = orig_height as f32 / new_height.max(1) as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_filter_by_ratio() {
        assert_eq!(select_filter(4000, 3000, 1000, 750), FilterType::Triangle);
        assert_eq!(select_filter(1800, 1000, 1000, 600), FilterType::CatmullRom);
        assert_eq!(select_filter(1000, 1000, 900, 900), FilterType::Lanczos3);
        // upscaling (cover fit) also lands on Lanczos3
        assert_eq!(select_filter(10, 10, 200, 200), FilterType::Lanczos3);
    }
}
