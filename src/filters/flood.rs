use rgb::RGB8;

use crate::surface_utils::{Pixel, PixelOps};
use crate::util::clamp;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::FilterError;

/// The `feFlood` filter primitive.
#[derive(Debug, Clone)]
pub struct Flood {
    /// The `flood-color` property.
    pub color: RGB8,
    /// The `flood-opacity` property, in `[0, 1]`.
    pub opacity: f64,
}

impl Default for Flood {
    fn default() -> Flood {
        Flood {
            color: RGB8::new(0, 0, 0),
            opacity: 1.0,
        }
    }
}

impl Flood {
    /// The premultiplied pixel that fills the subregion.
    pub fn pixel(&self) -> Pixel {
        let alpha = (clamp(self.opacity, 0.0, 1.0) * 255.0).round() as u8;

        Pixel::new(self.color.r, self.color.g, self.color.b, alpha).premultiply()
    }

    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let bounds = bounds_builder.into_irect(ctx)?;

        let surface = ctx.source_graphic().flood(bounds, self.pixel())?;

        Ok(FilterOutput { surface, bounds })
    }
}
