//! Element rendering for tensors

use super::core::Tensor;
use super::layout::Layout;
use super::shape::{RANK, Shape};
use super::storage::dispatch_host;
use super::strides::compute_strides;
use super::transfer::tilize_host;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use std::borrow::Cow;

impl<R: Runtime> Tensor<R> {
    /// Render the elements as text
    ///
    /// `order` picks the traversal: `Linear` walks (N, C, H, W) row-major,
    /// `Tiled` walks the elements in tiled order. The plain form is a flat
    /// list `[e0, e1, ...]`; `pretty` nests one bracket level per dimension
    /// with right-aligned values and is only available in linear order.
    /// Device tensors are copied back first.
    ///
    /// # Example
    /// ```
    /// use tilr::prelude::*;
    ///
    /// let shape = Shape::new([1, 1, 2, 2])?;
    /// let t = Tensor::<SimRuntime>::from_host_vec(vec![1u32, 2, 3, 4], shape, DType::U32, Layout::Linear)?;
    /// assert_eq!(t.render(Layout::Linear, false)?, "[1, 2, 3, 4]");
    /// assert_eq!(t.render(Layout::Linear, true)?, "[[[[1, 2],\n   [3, 4]]]]");
    /// # Ok::<(), tilr::error::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `pretty` is requested with tiled order
    /// - `LayoutConstraint` if tiled order is requested for a shape that is
    ///   not tile aligned
    pub fn render(&self, order: Layout, pretty: bool) -> Result<String> {
        if pretty && order == Layout::Tiled {
            return Err(Error::InvalidArgument {
                arg: "order",
                reason: "pretty printing is only available in linear order".to_string(),
            });
        }

        let linear = self.host_view()?;
        let data = match order {
            Layout::Linear => linear,
            Layout::Tiled => Cow::Owned(tilize_host(&linear, self.shape())?),
        };
        let values: Vec<String> = dispatch_host!(&*data, v => v.iter().map(ToString::to_string).collect());

        if pretty {
            Ok(render_nested(&values, self.shape()))
        } else {
            Ok(format!("[{}]", values.join(", ")))
        }
    }

    /// Print the elements to stdout
    pub fn print(&self, order: Layout, pretty: bool) -> Result<()> {
        println!("{}", self.render(order, pretty)?);
        Ok(())
    }

    /// Print the elements in nested linear form
    pub fn pretty_print(&self) -> Result<()> {
        self.print(Layout::Linear, true)
    }
}

/// Nested brackets, one level per dimension, values right-aligned to the
/// widest one
fn render_nested(values: &[String], shape: &Shape) -> String {
    let width = values.iter().map(String::len).max().unwrap_or(0);
    let mut out = String::with_capacity(values.len() * (width + 2));
    let strides = compute_strides(shape);
    nest(&mut out, values, shape, &strides, 0, 0, width);
    out
}

fn nest(
    out: &mut String,
    values: &[String],
    shape: &Shape,
    strides: &[usize],
    level: usize,
    offset: usize,
    width: usize,
) {
    out.push('[');
    if level == RANK - 1 {
        for (i, v) in values[offset..offset + shape[level]].iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&format!("{v:>width$}"));
        }
    } else {
        // blank lines grow with the depth of the closed block
        let separator = format!(
            ",{}{}",
            "\n".repeat(RANK - 1 - level),
            " ".repeat(level + 1)
        );
        for i in 0..shape[level] {
            if i > 0 {
                out.push_str(&separator);
            }
            nest(out, values, shape, strides, level + 1, offset + i * strides[level], width);
        }
    }
    out.push(']');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;
    use crate::runtime::sim::{SimDevice, SimRuntime};
    use crate::tensor::Initialize;

    type T = Tensor<SimRuntime>;

    fn shape(dims: [usize; 4]) -> Shape {
        Shape::new(dims).unwrap()
    }

    #[test]
    fn test_flat_linear() {
        let t = T::new(shape([1, 1, 1, 3]), Initialize::Increment, DType::F32, Layout::Linear)
            .unwrap();
        assert_eq!(t.render(Layout::Linear, false).unwrap(), "[0, 1, 2]");
    }

    #[test]
    fn test_pretty_right_aligns() {
        let t = T::from_host_vec(
            vec![1u32, 200, 30, 4],
            shape([1, 1, 2, 2]),
            DType::U32,
            Layout::Linear,
        )
        .unwrap();
        assert_eq!(
            t.render(Layout::Linear, true).unwrap(),
            "[[[[  1, 200],\n   [ 30,   4]]]]"
        );
    }

    #[test]
    fn test_pretty_separates_channels() {
        let t = T::new(shape([1, 2, 1, 2]), Initialize::Increment, DType::U32, Layout::Linear)
            .unwrap();
        assert_eq!(
            t.render(Layout::Linear, true).unwrap(),
            "[[[[0, 1]],\n\n  [[2, 3]]]]"
        );
    }

    #[test]
    fn test_tiled_order_stream() {
        let t = T::new(shape([1, 1, 32, 64]), Initialize::Increment, DType::U32, Layout::Tiled)
            .unwrap();
        let text = t.render(Layout::Tiled, false).unwrap();
        let values: Vec<&str> = text[1..text.len() - 1].split(", ").collect();
        assert_eq!(values.len(), 2048);
        assert_eq!(values[32], "64");
        assert_eq!(values[1024], "32");
    }

    #[test]
    fn test_pretty_tiled_rejected() {
        let t = T::new(shape([1, 1, 32, 32]), Initialize::Zeros, DType::F32, Layout::Tiled)
            .unwrap();
        assert!(matches!(
            t.render(Layout::Tiled, true),
            Err(Error::InvalidArgument { arg: "order", .. })
        ));
    }

    #[test]
    fn test_tiled_order_needs_alignment() {
        let t = T::new(shape([1, 1, 2, 2]), Initialize::Zeros, DType::F32, Layout::Linear)
            .unwrap();
        assert!(matches!(
            t.render(Layout::Tiled, false),
            Err(Error::LayoutConstraint { .. })
        ));
    }

    #[test]
    fn test_device_tensor_renders_after_copy_back() {
        let device = SimDevice::new(0);
        let t = T::new_on_device(shape([1, 1, 1, 4]), Initialize::Ones, DType::U32, Layout::Linear, &device)
            .unwrap();
        assert_eq!(t.render(Layout::Linear, false).unwrap(), "[1, 1, 1, 1]");
    }
}
