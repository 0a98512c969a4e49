use super::*;

#[test]
fn raster_size_rejects_zero_dimensions() {
    assert!(RasterSize::new(0, 4).is_err());
    assert!(RasterSize::new(4, 0).is_err());
    assert_eq!(RasterSize::new(4, 3).unwrap().cell_count(), 12);
}

#[test]
fn raster_index_is_row_major_and_bounded() {
    let size = RasterSize::new(4, 3).unwrap();
    assert_eq!(size.index(0, 0), Some(0));
    assert_eq!(size.index(1, 2), Some(6));
    assert_eq!(size.index(2, 3), Some(11));
    assert_eq!(size.index(3, 0), None);
    assert_eq!(size.index(0, 4), None);
    assert_eq!(size.index(-1, 0), None);
}

#[test]
fn rgb_lerp_endpoints() {
    let a = Rgb::new(0.0, 10.0, 20.0);
    let b = Rgb::new(100.0, 110.0, 120.0);
    assert_eq!(a.lerp(b, 0.0), a);
    assert_eq!(a.lerp(b, 1.0), b);
    assert_eq!(a.lerp(b, 0.5), Rgb::new(50.0, 60.0, 70.0));
}

#[test]
fn point_state_finiteness() {
    assert!(PointState::new(1.0, 2.0, 3.0, 0.5).is_finite());
    assert!(!PointState::new(f64::NAN, 2.0, 3.0, 0.5).is_finite());
    assert!(!PointState::new(1.0, f64::INFINITY, 3.0, 0.5).is_finite());
}

#[test]
fn frame_pixel_reads_back_rgba() {
    let frame = FrameRGBA {
        width: 2,
        height: 1,
        data: vec![1, 2, 3, 4, 5, 6, 7, 8],
    };
    assert_eq!(frame.pixel(1, 0), Some([5, 6, 7, 8]));
    assert_eq!(frame.pixel(2, 0), None);
}
