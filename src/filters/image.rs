use crate::surface_utils::{iterators::Pixels, shared_surface::SurfaceType};

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::FilterError;

/// The `feImage` filter primitive.
///
/// The image itself is produced by the caller's
/// [`ImageResolver`](super::context::ImageResolver); this primitive only places the
/// result into its subregion.
#[derive(Debug, Default, Clone)]
pub struct Image {
    /// The `href` of the referenced raster or element.
    pub href: String,
}

impl Image {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let bounds = bounds_builder.into_irect(ctx)?;

        let resolver = ctx.image_resolver().ok_or_else(|| {
            FilterError::InvalidParameter("no image resolver for feImage".to_string())
        })?;

        let image = resolver.resolve(&self.href, ctx.paffine(), bounds)?;

        let mut surface = ctx.source_graphic().new_like(SurfaceType::SRgb)?;

        // The resolver may hand back a surface of any size; only the part that
        // overlaps the subregion is used.
        if let Some(clip) = bounds.intersection(&image.bounds()) {
            for (x, y, pixel) in Pixels::within(&image, clip) {
                surface.set_pixel(pixel, x, y);
            }
        }

        Ok(FilterOutput {
            surface: surface.share(),
            bounds,
        })
    }
}
