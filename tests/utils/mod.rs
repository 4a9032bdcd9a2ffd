//! Helpers shared by the integration tests.

#![allow(dead_code)]

use rsvg_filters::{
    render, ChannelMap, CoordUnits, ExclusiveImageSurface, Filter, FilterContextParams,
    FilterPrimitive, FilterUnits, Pixel, Session, SharedImageSurface, SurfaceType, Transform,
};

/// Builds a surface with the given channel layout from a function of the pixel coordinates.
pub fn surface_with_channels(
    width: i32,
    height: i32,
    channels: ChannelMap,
    f: impl Fn(u32, u32) -> Pixel,
) -> SharedImageSurface {
    let mut surface =
        ExclusiveImageSurface::new_with_channels(width, height, channels, SurfaceType::SRgb)
            .unwrap();

    for y in 0..height as u32 {
        for x in 0..width as u32 {
            surface.set_pixel(f(x, y), x, y);
        }
    }

    surface.share()
}

/// Same as `surface_with_channels()`, in Cairo's native layout.
pub fn surface_from_fn(
    width: i32,
    height: i32,
    f: impl Fn(u32, u32) -> Pixel,
) -> SharedImageSurface {
    surface_with_channels(width, height, ChannelMap::cairo(), f)
}

/// A surface filled with a single color.
pub fn solid(width: i32, height: i32, pixel: Pixel) -> SharedImageSurface {
    surface_from_fn(width, height, |_, _| pixel)
}

/// A user space filter whose region covers the whole source.
pub fn user_space_filter(source: &SharedImageSurface, primitives: Vec<FilterPrimitive>) -> Filter {
    Filter {
        name: "test".to_string(),
        filter_units: FilterUnits(CoordUnits::UserSpaceOnUse),
        x: 0.0,
        y: 0.0,
        width: f64::from(source.width()),
        height: f64::from(source.height()),
        primitives,
        ..Default::default()
    }
}

/// Runs `primitives` over the whole source with an identity transform.
pub fn run(source: &SharedImageSurface, primitives: Vec<FilterPrimitive>) -> SharedImageSurface {
    let filter = user_space_filter(source, primitives);
    let params = FilterContextParams::new(source.clone(), Transform::identity());

    render(&filter, &params, &Session::new_for_test_suite()).unwrap()
}

/// Collects the logical pixels of a surface in row order.
pub fn pixels_of(surface: &SharedImageSurface) -> Vec<Pixel> {
    let mut pixels = Vec::new();

    for y in 0..surface.height() as u32 {
        for x in 0..surface.width() as u32 {
            pixels.push(surface.get_pixel(x, y));
        }
    }

    pixels
}
