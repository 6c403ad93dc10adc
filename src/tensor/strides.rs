//! Strides type: element offsets for row-major addressing

use super::shape::{RANK, Shape};
use std::fmt;
use std::ops::Deref;

/// Strides type: element offsets between consecutive elements along each dimension
/// NOTE: Strides are in ELEMENTS, not bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Strides([usize; RANK]);

impl Strides {
    /// All four strides
    #[inline]
    pub const fn as_array(&self) -> [usize; RANK] {
        self.0
    }
}

/// Compute row-major strides for a shape
///
/// `stride[3] = 1` and `stride[i] = stride[i + 1] * shape[i + 1]`.
///
/// # Example
/// ```
/// use tilr::tensor::{Shape, compute_strides};
/// let shape = Shape::new([2, 3, 4, 5]).unwrap();
/// assert_eq!(compute_strides(&shape).as_array(), [60, 20, 5, 1]);
/// ```
pub fn compute_strides(shape: &Shape) -> Strides {
    let dims = shape.dims();
    let mut strides = [1usize; RANK];
    for i in (0..RANK - 1).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    Strides(strides)
}

impl Deref for Strides {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[usize]> for Strides {
    fn as_ref(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Debug for Strides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}
