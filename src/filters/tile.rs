use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterInput, FilterOutput};
use super::{FilterError, Input, InputRequirements};

/// The `feTile` filter primitive.
#[derive(Debug, Clone, Default)]
pub struct Tile {
    pub in1: Input,
}

impl Tile {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;

        // feTile doesn't consider its inputs in the filter primitive subregion calculation.
        let bounds = bounds_builder.into_irect(ctx)?;

        // The tile is the subregion of the input primitive; a standard input has none, so
        // the whole raster repeats.
        let tile_bounds = match input_1 {
            FilterInput::StandardInput(ref surface) => surface.bounds(),
            FilterInput::PrimitiveOutput(FilterOutput {
                bounds: input_bounds,
                ..
            }) => input_bounds,
        };

        let tile_bounds = tile_bounds
            .intersection(&input_1.surface().bounds())
            .ok_or(FilterError::EmptyRegion)?;

        let surface = input_1.surface().tile(tile_bounds, bounds)?;

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }
}
