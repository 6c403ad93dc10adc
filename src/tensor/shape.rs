//! Shape type: the (N, C, H, W) extents of a tensor

use super::layout::{TILE_HEIGHT, TILE_WIDTH};
use super::strides::compute_strides;
use crate::error::{Error, Result};
use std::fmt;
use std::ops::Deref;

/// Number of dimensions every tensor carries
pub const RANK: usize = 4;

/// Shape type: extents of a tensor along (N, C, H, W)
///
/// Every extent is at least 1; a `Shape` with a zero extent cannot be built.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape([usize; RANK]);

impl Shape {
    /// Create a shape, rejecting zero extents and volumes that overflow
    /// `usize`
    ///
    /// # Example
    /// ```
    /// use tilr::tensor::Shape;
    /// let shape = Shape::new([1, 2, 32, 64]).unwrap();
    /// assert_eq!(shape.volume(), 4096);
    /// assert!(Shape::new([1, 0, 32, 32]).is_err());
    /// ```
    pub fn new(dims: [usize; RANK]) -> Result<Self> {
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(Error::invalid_shape(format!(
                "extent of dimension {axis} must be positive, got {dims:?}"
            )));
        }
        checked_volume(&dims)?;
        Ok(Self(dims))
    }

    /// Batch extent
    #[inline]
    pub const fn n(&self) -> usize {
        self.0[0]
    }

    /// Channel extent
    #[inline]
    pub const fn c(&self) -> usize {
        self.0[1]
    }

    /// Height extent
    #[inline]
    pub const fn h(&self) -> usize {
        self.0[2]
    }

    /// Width extent
    #[inline]
    pub const fn w(&self) -> usize {
        self.0[3]
    }

    /// All four extents
    #[inline]
    pub const fn dims(&self) -> [usize; RANK] {
        self.0
    }

    /// Total number of elements
    ///
    /// Cannot overflow: `new` rejects shapes whose volume does not fit.
    #[inline]
    pub fn volume(&self) -> usize {
        self.0.iter().product()
    }

    /// Elements in one (H, W) plane
    #[inline]
    pub const fn plane(&self) -> usize {
        self.h() * self.w()
    }

    /// Row-major element offset of `(n, c, h, w)`
    #[inline]
    pub fn offset(&self, n: usize, c: usize, h: usize, w: usize) -> usize {
        let strides = compute_strides(self);
        n * strides[0] + c * strides[1] + h * strides[2] + w * strides[3]
    }

    /// Whether H and W are both multiples of the tile edge
    #[inline]
    pub const fn is_tile_aligned(&self) -> bool {
        self.h() % TILE_HEIGHT == 0 && self.w() % TILE_WIDTH == 0
    }

    /// Smallest tile-aligned shape that contains this one
    pub const fn tile_padded(&self) -> Self {
        Self([
            self.n(),
            self.c(),
            self.h().next_multiple_of(TILE_HEIGHT),
            self.w().next_multiple_of(TILE_WIDTH),
        ])
    }

    /// Resolve a reshape request against a tensor of `old_volume` elements
    ///
    /// At most one entry may be `-1`; it is solved as
    /// `old_volume / product(others)`. Every other entry must be positive and
    /// the result must preserve the volume.
    ///
    /// # Example
    /// ```
    /// use tilr::tensor::Shape;
    /// let shape = Shape::resolve_reshape(4096, [1, -1, 32, 32]).unwrap();
    /// assert_eq!(shape.dims(), [1, 4, 32, 32]);
    /// ```
    pub fn resolve_reshape(old_volume: usize, request: [isize; RANK]) -> Result<Self> {
        let mut wildcard = None;
        let mut known = 1usize;
        for (axis, &d) in request.iter().enumerate() {
            match d {
                -1 if wildcard.is_some() => {
                    return Err(Error::invalid_shape(format!(
                        "only one dimension can be inferred, got {request:?}"
                    )));
                }
                -1 => wildcard = Some(axis),
                d if d <= 0 => {
                    return Err(Error::invalid_shape(format!(
                        "extent of dimension {axis} must be positive or -1, got {d}"
                    )));
                }
                d => {
                    known = known.checked_mul(d as usize).ok_or_else(|| {
                        Error::invalid_shape(format!("element count of {request:?} overflows"))
                    })?;
                }
            }
        }

        let mut dims = [0usize; RANK];
        for (dst, &src) in dims.iter_mut().zip(request.iter()) {
            *dst = src.max(0) as usize;
        }

        match wildcard {
            Some(axis) => {
                if old_volume % known != 0 {
                    return Err(Error::invalid_shape(format!(
                        "cannot infer dimension {axis}: {old_volume} elements do not divide by {known}"
                    )));
                }
                dims[axis] = old_volume / known;
            }
            None if known != old_volume => {
                return Err(Error::invalid_shape(format!(
                    "cannot reshape {old_volume} elements into {request:?} ({known} elements)"
                )));
            }
            None => {}
        }

        Self::new(dims)
    }
}

fn checked_volume(dims: &[usize; RANK]) -> Result<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| Error::invalid_shape(format!("element count of {dims:?} overflows")))
}

impl Deref for Shape {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[usize]> for Shape {
    fn as_ref(&self) -> &[usize] {
        &self.0
    }
}

impl TryFrom<[usize; RANK]> for Shape {
    type Error = Error;

    fn try_from(value: [usize; RANK]) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.n(), self.c(), self.h(), self.w())
    }
}
