//! Properties that hold for any input surface.

use proptest::prelude::*;
use rgb::RGB8;

use rsvg_filters::filters::blend::{self, Blend};
use rsvg_filters::filters::color_matrix::ColorMatrix;
use rsvg_filters::filters::component_transfer::{ComponentTransfer, Functions, TransferFunction};
use rsvg_filters::filters::composite::{Composite, Operator};
use rsvg_filters::filters::convolve_matrix::ConvolveMatrix;
use rsvg_filters::filters::displacement_map::{ColorChannel, DisplacementMap};
use rsvg_filters::filters::gaussian_blur::GaussianBlur;
use rsvg_filters::filters::lighting::{DiffuseLighting, LightSource, SpecularLighting};
use rsvg_filters::filters::morphology::{self, Morphology};
use rsvg_filters::filters::offset::Offset;
use rsvg_filters::filters::turbulence::{NoiseType, StitchTiles, Turbulence};
use rsvg_filters::{
    EdgeMode, FilterPrimitive, Input, Pixel, PixelOps, PrimitiveParams, SharedImageSurface,
};

mod utils;

use utils::{pixels_of, run, surface_from_fn};

prop_compose! {
    fn arbitrary_pixel()(r: u8, g: u8, b: u8, a: u8) -> Pixel {
        Pixel { r, g, b, a }
    }
}

prop_compose! {
    /// A small surface of valid premultiplied pixels.
    fn premultiplied_surface()(width in 1..6i32, height in 1..6i32)
        (pixels in prop::collection::vec(arbitrary_pixel(), (width * height) as usize),
         width in Just(width),
         height in Just(height)) -> SharedImageSurface {
        surface_from_fn(width, height, |x, y| {
            pixels[(y * width as u32 + x) as usize].premultiply()
        })
    }
}

prop_compose! {
    /// A small surface of arbitrary bytes, for primitives that treat channels as plain fields.
    fn raw_surface()(width in 1..6i32, height in 1..6i32)
        (pixels in prop::collection::vec(arbitrary_pixel(), (width * height) as usize),
         width in Just(width),
         height in Just(height)) -> SharedImageSurface {
        surface_from_fn(width, height, |x, y| pixels[(y * width as u32 + x) as usize])
    }
}

fn blend_mode() -> impl Strategy<Value = blend::Mode> {
    use blend::Mode::*;

    prop_oneof![
        Just(Normal),
        Just(Multiply),
        Just(Screen),
        Just(Darken),
        Just(Lighten),
        Just(Overlay),
        Just(ColorDodge),
        Just(ColorBurn),
        Just(HardLight),
        Just(SoftLight),
        Just(Difference),
        Just(Exclusion),
    ]
}

fn edge_mode() -> impl Strategy<Value = EdgeMode> {
    prop_oneof![
        Just(EdgeMode::Duplicate),
        Just(EdgeMode::Wrap),
        Just(EdgeMode::None),
    ]
}

fn color_channel() -> impl Strategy<Value = Option<ColorChannel>> {
    prop_oneof![
        Just(None),
        Just(Some(ColorChannel::R)),
        Just(Some(ColorChannel::G)),
        Just(Some(ColorChannel::B)),
        Just(Some(ColorChannel::A)),
    ]
}

fn light_source() -> impl Strategy<Value = LightSource> {
    prop_oneof![
        (0.0..360.0f64, -90.0..90.0f64)
            .prop_map(|(azimuth, elevation)| LightSource::Distant { azimuth, elevation }),
        (-5.0..10.0f64, -5.0..10.0f64, 0.0..20.0f64)
            .prop_map(|(x, y, z)| LightSource::Point { x, y, z }),
        (-5.0..10.0f64, 0.0..20.0f64, 0.5..8.0f64, prop::option::of(1.0..90.0f64)).prop_map(
            |(x, z, specular_exponent, limiting_cone_angle)| LightSource::Spot {
                x,
                y: x,
                z,
                points_at_x: 2.0,
                points_at_y: 2.0,
                points_at_z: 0.0,
                specular_exponent,
                limiting_cone_angle,
            }
        ),
    ]
}

fn one(params: PrimitiveParams) -> Vec<FilterPrimitive> {
    vec![FilterPrimitive::new(params)]
}

fn morphology(operator: morphology::Operator, radius: f64) -> Vec<FilterPrimitive> {
    one(PrimitiveParams::Morphology(Morphology {
        in1: Input::SourceGraphic,
        operator,
        radius: (radius, radius),
    }))
}

fn inverted(surface: &SharedImageSurface) -> SharedImageSurface {
    surface_from_fn(surface.width(), surface.height(), |x, y| {
        let p = surface.get_pixel(x, y);
        Pixel::new(255 - p.r, 255 - p.g, 255 - p.b, 255 - p.a)
    })
}

fn assert_premultiplied(surface: &SharedImageSurface) -> Result<(), TestCaseError> {
    for pixel in pixels_of(surface) {
        prop_assert!(pixel.is_premultiplied(), "{:?} is not premultiplied", pixel);
    }

    Ok(())
}

proptest! {
    #[test]
    fn color_matrix_output_is_premultiplied(
        source in premultiplied_surface(),
        values in prop::collection::vec(-2.0..2.0f64, 20),
    ) {
        let output = run(
            &source,
            one(PrimitiveParams::ColorMatrix(ColorMatrix::from_values(
                Input::SourceGraphic,
                &values,
            ))),
        );
        assert_premultiplied(&output)?;
    }

    #[test]
    fn component_transfer_output_is_premultiplied(
        source in premultiplied_surface(),
        slope in -2.0..2.0f64,
        intercept in -1.0..1.0f64,
        exponent in 0.1..4.0f64,
    ) {
        let functions = Functions {
            r: TransferFunction::Linear { slope, intercept },
            g: TransferFunction::Gamma { amplitude: 1.0, exponent, offset: 0.0 },
            b: TransferFunction::Discrete(vec![0.0, 1.0]),
            a: TransferFunction::Table(vec![1.0, 0.5]),
        };

        let output = run(
            &source,
            one(PrimitiveParams::ComponentTransfer(ComponentTransfer {
                in1: Input::SourceGraphic,
                functions,
            })),
        );
        assert_premultiplied(&output)?;
    }

    #[test]
    fn arithmetic_composite_output_is_premultiplied(
        source in premultiplied_surface(),
        k in prop::array::uniform4(-1.0..1.0f64),
    ) {
        let output = run(
            &source,
            vec![
                FilterPrimitive::new(PrimitiveParams::Offset(Offset {
                    in1: Input::SourceGraphic,
                    dx: 1.0,
                    dy: 0.0,
                }))
                .with_result("shifted"),
                FilterPrimitive::new(PrimitiveParams::Composite(Composite {
                    in1: Input::SourceGraphic,
                    in2: Input::FilterOutput("shifted".to_string()),
                    operator: Operator::Arithmetic,
                    k1: k[0],
                    k2: k[1],
                    k3: k[2],
                    k4: k[3],
                })),
            ],
        );
        assert_premultiplied(&output)?;
    }

    #[test]
    fn blend_output_is_premultiplied(source in premultiplied_surface(), mode in blend_mode()) {
        let output = run(
            &source,
            vec![
                FilterPrimitive::new(PrimitiveParams::Offset(Offset {
                    in1: Input::SourceGraphic,
                    dx: 0.0,
                    dy: 1.0,
                }))
                .with_result("shifted"),
                FilterPrimitive::new(PrimitiveParams::Blend(Blend {
                    in1: Input::SourceGraphic,
                    in2: Input::FilterOutput("shifted".to_string()),
                    mode,
                })),
            ],
        );
        assert_premultiplied(&output)?;
    }

    #[test]
    fn convolve_matrix_output_is_premultiplied(
        source in premultiplied_surface(),
        kernel_matrix in prop::collection::vec(-2.0..2.0f64, 9),
        divisor in prop_oneof![Just(0.0), 0.1..4.0f64],
        bias in -1.0..1.0f64,
        edge_mode in edge_mode(),
        preserve_alpha in any::<bool>(),
    ) {
        let output = run(
            &source,
            one(PrimitiveParams::ConvolveMatrix(ConvolveMatrix {
                in1: Input::SourceGraphic,
                kernel_matrix,
                divisor,
                bias,
                edge_mode,
                preserve_alpha,
                ..Default::default()
            })),
        );
        assert_premultiplied(&output)?;
    }

    #[test]
    fn lighting_output_is_premultiplied(
        source in premultiplied_surface(),
        light in light_source(),
        surface_scale in -5.0..5.0f64,
        constant in 0.0..3.0f64,
        specular_exponent in 1.0..64.0f64,
        color in any::<(u8, u8, u8)>(),
    ) {
        let lighting_color = RGB8::new(color.0, color.1, color.2);

        let diffuse = run(
            &source,
            one(PrimitiveParams::DiffuseLighting(DiffuseLighting {
                in1: Input::SourceGraphic,
                surface_scale,
                diffuse_constant: constant,
                light: light.clone(),
                lighting_color,
                ..Default::default()
            })),
        );
        assert_premultiplied(&diffuse)?;

        let specular = run(
            &source,
            one(PrimitiveParams::SpecularLighting(SpecularLighting {
                in1: Input::SourceGraphic,
                surface_scale,
                specular_constant: constant,
                specular_exponent,
                light,
                lighting_color,
                ..Default::default()
            })),
        );
        assert_premultiplied(&specular)?;
    }

    #[test]
    fn displacement_map_output_is_premultiplied(
        source in premultiplied_surface(),
        scale in -20.0..20.0f64,
        x_channel_selector in color_channel(),
        y_channel_selector in color_channel(),
    ) {
        let output = run(
            &source,
            vec![
                FilterPrimitive::new(PrimitiveParams::Offset(Offset {
                    in1: Input::SourceGraphic,
                    dx: 1.0,
                    dy: 1.0,
                }))
                .with_result("map"),
                FilterPrimitive::new(PrimitiveParams::DisplacementMap(DisplacementMap {
                    in1: Input::SourceGraphic,
                    in2: Input::FilterOutput("map".to_string()),
                    scale,
                    x_channel_selector,
                    y_channel_selector,
                })),
            ],
        );
        assert_premultiplied(&output)?;
    }

    #[test]
    fn morphology_output_is_premultiplied(
        source in premultiplied_surface(),
        radius in 0.0..4.0f64,
        dilate in any::<bool>(),
    ) {
        let operator = if dilate {
            morphology::Operator::Dilate
        } else {
            morphology::Operator::Erode
        };

        assert_premultiplied(&run(&source, morphology(operator, radius)))?;
    }

    #[test]
    fn gaussian_blur_output_is_premultiplied(
        source in premultiplied_surface(),
        std_deviation in (0.0..30.0f64, 0.0..30.0f64),
    ) {
        // Deviations from 10 up take the box blur path.
        let output = run(
            &source,
            one(PrimitiveParams::GaussianBlur(GaussianBlur {
                in1: Input::SourceGraphic,
                std_deviation,
            })),
        );
        assert_premultiplied(&output)?;
    }

    #[test]
    fn normal_blend_of_an_opaque_surface_with_itself_is_identity(
        source in premultiplied_surface(),
    ) {
        let opaque = surface_from_fn(source.width(), source.height(), |x, y| {
            Pixel { a: 255, ..source.get_pixel(x, y) }
        });

        let output = run(
            &opaque,
            one(PrimitiveParams::Blend(Blend {
                in1: Input::SourceGraphic,
                in2: Input::SourceGraphic,
                mode: blend::Mode::Normal,
            })),
        );
        prop_assert_eq!(pixels_of(&output), pixels_of(&opaque));
    }

    #[test]
    fn identity_color_matrix_is_lossless(source in premultiplied_surface()) {
        #[rustfmt::skip]
        let identity = [
            1.0, 0.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0, 0.0,
        ];

        let output = run(
            &source,
            one(PrimitiveParams::ColorMatrix(ColorMatrix::from_values(
                Input::SourceGraphic,
                &identity,
            ))),
        );
        prop_assert_eq!(pixels_of(&output), pixels_of(&source));
    }

    #[test]
    fn zero_deviation_blur_is_a_copy(source in premultiplied_surface()) {
        let output = run(
            &source,
            one(PrimitiveParams::GaussianBlur(GaussianBlur {
                in1: Input::SourceGraphic,
                std_deviation: (0.0, 0.0),
            })),
        );
        prop_assert_eq!(pixels_of(&output), pixels_of(&source));
    }

    #[test]
    fn offset_is_undone_by_its_inverse(
        source in premultiplied_surface(),
        dx in -3..4i32,
        dy in -3..4i32,
    ) {
        let offset = |dx: i32, dy: i32| {
            FilterPrimitive::new(PrimitiveParams::Offset(Offset {
                in1: Input::Unspecified,
                dx: f64::from(dx),
                dy: f64::from(dy),
            }))
        };

        let output = run(&source, vec![offset(dx, dy), offset(-dx, -dy)]);

        let (width, height) = (source.width(), source.height());
        for y in 0..height {
            for x in 0..width {
                let survived = (0..width).contains(&(x + dx)) && (0..height).contains(&(y + dy));
                let expected = if survived {
                    source.get_pixel(x as u32, y as u32)
                } else {
                    Pixel::default()
                };

                prop_assert_eq!(output.get_pixel(x as u32, y as u32), expected);
            }
        }
    }

    #[test]
    fn dilate_is_dual_to_erode(source in raw_surface(), radius in 0.0..3.0f64) {
        let dilated = run(&source, morphology(morphology::Operator::Dilate, radius));
        let eroded = run(&inverted(&source), morphology(morphology::Operator::Erode, radius));

        prop_assert_eq!(pixels_of(&dilated), pixels_of(&inverted(&eroded)));
    }

    #[test]
    fn turbulence_is_deterministic(
        seed in -100.0..100.0f64,
        base_frequency in (0.0..0.5f64, 0.0..0.5f64),
        num_octaves in 0..4i32,
        stitch in any::<bool>(),
        fractal in any::<bool>(),
    ) {
        let turbulence = Turbulence {
            base_frequency,
            num_octaves,
            seed,
            stitch_tiles: if stitch { StitchTiles::Stitch } else { StitchTiles::NoStitch },
            type_: if fractal { NoiseType::FractalNoise } else { NoiseType::Turbulence },
        };

        let source = surface_from_fn(8, 8, |_, _| Pixel::default());
        let first = run(&source, one(PrimitiveParams::Turbulence(turbulence.clone())));
        let second = run(&source, one(PrimitiveParams::Turbulence(turbulence)));

        prop_assert_eq!(pixels_of(&first), pixels_of(&second));
        assert_premultiplied(&first)?;
    }
}
