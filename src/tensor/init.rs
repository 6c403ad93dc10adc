//! Initial contents for newly constructed tensors

use super::shape::Shape;
use super::storage::HostData;
use crate::dtype::{DType, Element};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// How a new tensor is filled
///
/// Values are generated in the host representation of the dtype and in
/// linear order. BFP8 tensors are filled as `f32` and quantized when they
/// move to a device.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Initialize {
    /// All zeros
    #[default]
    Zeros,
    /// All ones
    Ones,
    /// `0, 1, 2, ...` in linear order (rounded to the nearest representable
    /// value for narrow floats)
    Increment,
    /// Ones on the `h == w` diagonal of every (H, W) plane, zeros elsewhere
    Identity,
    /// Uniform values from the thread-local generator: floats in [0, 1),
    /// integers in [0, 1024)
    Random,
    /// Same distribution as `Random` from a generator seeded with the value
    RandomSeeded(u64),
}

impl Initialize {
    /// Generate `shape.volume()` elements of type `T`
    ///
    /// # Example
    /// ```
    /// use tilr::tensor::{Initialize, Shape};
    /// let shape = Shape::new([1, 1, 2, 2]).unwrap();
    /// assert_eq!(Initialize::Identity.fill::<u32>(&shape), vec![1, 0, 0, 1]);
    /// ```
    pub fn fill<T: Element>(self, shape: &Shape) -> Vec<T> {
        let volume = shape.volume();
        match self {
            Self::Zeros => vec![T::zero(); volume],
            Self::Ones => vec![T::one(); volume],
            Self::Increment => (0..volume).map(|i| T::from_f64(i as f64)).collect(),
            Self::Identity => {
                let mut data = vec![T::zero(); volume];
                let (h, w) = (shape.h(), shape.w());
                for plane in data.chunks_mut(shape.plane()) {
                    for i in 0..h.min(w) {
                        plane[i * w + i] = T::one();
                    }
                }
                data
            }
            Self::Random => sample(&mut rand::rng(), volume),
            Self::RandomSeeded(seed) => sample(&mut StdRng::seed_from_u64(seed), volume),
        }
    }

    /// Generate host data for a tensor of `dtype`, dispatching on its host
    /// representation
    pub fn generate(self, dtype: DType, shape: &Shape) -> HostData {
        match dtype.host_dtype() {
            DType::U32 => HostData::U32(self.fill(shape)),
            DType::BF16 => HostData::BF16(self.fill(shape)),
            _ => HostData::F32(self.fill(shape)),
        }
    }
}

fn sample<T: Element, G: Rng>(rng: &mut G, count: usize) -> Vec<T> {
    (0..count).map(|_| T::sample(rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::bf16;

    fn shape(dims: [usize; 4]) -> Shape {
        Shape::new(dims).unwrap()
    }

    #[test]
    fn test_constant_fills() {
        let s = shape([1, 2, 3, 4]);
        assert!(Initialize::Zeros.fill::<f32>(&s).iter().all(|&v| v == 0.0));
        assert!(Initialize::Ones.fill::<u32>(&s).iter().all(|&v| v == 1));
        assert_eq!(Initialize::Ones.fill::<bf16>(&s)[0], bf16::ONE);
    }

    #[test]
    fn test_increment() {
        let s = shape([1, 1, 2, 3]);
        assert_eq!(Initialize::Increment.fill::<u32>(&s), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_identity_per_plane() {
        let s = shape([2, 1, 2, 3]);
        assert_eq!(
            Initialize::Identity.fill::<u32>(&s),
            vec![1, 0, 0, 0, 1, 0, 1, 0, 0, 0, 1, 0]
        );
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let s = shape([1, 1, 32, 32]);
        let a = Initialize::RandomSeeded(42).fill::<f32>(&s);
        let b = Initialize::RandomSeeded(42).fill::<f32>(&s);
        let c = Initialize::RandomSeeded(43).fill::<f32>(&s);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_random_integers_in_range() {
        let s = shape([1, 1, 16, 16]);
        assert!(Initialize::Random.fill::<u32>(&s).iter().all(|&v| v < 1024));
    }

    #[test]
    fn test_generate_dispatches_on_host_dtype() {
        let s = shape([1, 1, 32, 32]);
        assert_eq!(Initialize::Ones.generate(DType::BFP8, &s).dtype(), DType::F32);
        assert_eq!(Initialize::Ones.generate(DType::BF16, &s).dtype(), DType::BF16);
        assert_eq!(Initialize::Ones.generate(DType::U32, &s).len(), 1024);
    }
}
