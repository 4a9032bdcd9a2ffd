use crate::surface_utils::shared_surface::Operator as SurfaceOperator;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements};

/// Enumeration of the possible compositing operations.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Operator {
    #[default]
    Over,
    In,
    Out,
    Atop,
    Xor,
    Arithmetic,
}

/// The `feComposite` filter primitive.
///
/// `in1` is composited onto `in2`.  The `k*` coefficients are only used by
/// [`Operator::Arithmetic`].
#[derive(Debug, Clone, Default)]
pub struct Composite {
    pub in1: Input,
    pub in2: Input,
    pub operator: Operator,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub k4: f64,
}

impl Composite {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let input_2 = ctx.get_input(&self.in2)?;
        let bounds = bounds_builder
            .add_input(&input_1)
            .add_input(&input_2)
            .into_irect(ctx)?;

        let porter_duff = match self.operator {
            Operator::Over => SurfaceOperator::Over,
            Operator::In => SurfaceOperator::In,
            Operator::Out => SurfaceOperator::Out,
            Operator::Atop => SurfaceOperator::Atop,
            Operator::Xor => SurfaceOperator::Xor,
            Operator::Arithmetic => {
                let surface = input_1.surface().compose_arithmetic(
                    input_2.surface(),
                    bounds,
                    self.k1,
                    self.k2,
                    self.k3,
                    self.k4,
                )?;

                return Ok(FilterOutput { surface, bounds });
            }
        };

        let surface = input_1
            .surface()
            .compose(input_2.surface(), bounds, porter_duff)?;

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1
            .get_requirements()
            .fold(self.in2.get_requirements())
    }
}
