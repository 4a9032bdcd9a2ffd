use crate::surface_utils::shared_surface::{Operator, SharedImageSurface, SurfaceType};

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements};

/// The `feMerge` filter primitive.
#[derive(Debug, Clone, Default)]
pub struct Merge {
    /// The `feMergeNode` children, in document order.
    pub merge_nodes: Vec<MergeNode>,
}

/// The `<feMergeNode>` element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeNode {
    pub in1: Input,
}

impl Merge {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        // Nodes whose input does not resolve are left out of the merge.
        let mut inputs = Vec::with_capacity(self.merge_nodes.len());
        for merge_node in &self.merge_nodes {
            match ctx.get_input(&merge_node.in1) {
                Ok(input) => inputs.push(input),
                Err(FilterError::InvalidInput) => continue,
                Err(e) => return Err(e),
            }
        }

        // Compute the filter bounds, taking each feMergeNode's input into account.
        let bounds = inputs
            .iter()
            .fold(bounds_builder, |builder, input| builder.add_input(input))
            .into_irect(ctx)?;

        let source = ctx.source_graphic();
        let mut output_surface = SharedImageSurface::empty(
            source.width(),
            source.height(),
            source.channels(),
            SurfaceType::AlphaOnly,
        )?;

        // Later nodes are painted on top.
        for input in &inputs {
            output_surface = input
                .surface()
                .compose(&output_surface, bounds, Operator::Over)?;
        }

        Ok(FilterOutput {
            surface: output_surface,
            bounds,
        })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.merge_nodes
            .iter()
            .map(|node| node.in1.get_requirements())
            .fold(InputRequirements::default(), |a, b| a.fold(b))
    }
}
