//! Unit systems for the filter region and for primitive attributes.

use crate::rect::Rect;
use crate::transform::Transform;

/// Whether lengths are in user space or fractions of the element's bounding box.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoordUnits {
    UserSpaceOnUse,
    ObjectBoundingBox,
}

impl CoordUnits {
    /// Returns the transform from these units to device pixels.
    ///
    /// `ObjectBoundingBox` needs the element's bounding box; `None` is returned
    /// when there isn't one.
    pub fn to_device(self, user_to_device: Transform, bbox: Option<Rect>) -> Option<Transform> {
        match self {
            CoordUnits::UserSpaceOnUse => Some(user_to_device),
            CoordUnits::ObjectBoundingBox => {
                bbox.map(|r| Transform::from_unit_square_to(&r).then(&user_to_device))
            }
        }
    }
}

/// Declares a `CoordUnits` newtype whose `Default` is `$default`.
///
/// `filterUnits` and `primitiveUnits` share their values but not their defaults.
#[doc(hidden)]
#[macro_export]
macro_rules! coord_units {
    ($name:ident, $default:expr) => {
        #[derive(Debug, Copy, Clone, PartialEq, Eq)]
        pub struct $name(pub CoordUnits);

        impl Default for $name {
            fn default() -> $name {
                $name($default)
            }
        }

        impl From<$name> for CoordUnits {
            fn from(units: $name) -> CoordUnits {
                units.0
            }
        }
    };
}
