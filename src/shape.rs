//! Spatial shape bookkeeping for the strided convolution ladders.
//!
//! The discriminator halves the spatial size four times with stride-2
//! convolutions under the SAME-padding convention, so each stage measures
//! `ceil(size / stride)`. The generator walks the same ladder backward with
//! transposed convolutions; for those to land on the exact target size the
//! `output_padding` of every layer has to be derived from the pair of sizes it
//! connects, which is what [`deconv_output_padding`] does.

/// Kernel size shared by every convolution in both networks.
pub const KERNEL_SIZE: i64 = 5;
/// Stride shared by every down/up-sampling convolution.
pub const STRIDE: i64 = 2;
/// Padding matching the SAME convention for a 5x5 kernel.
pub const PADDING: i64 = 2;

/// Output spatial size of a strided convolution with SAME padding:
/// `ceil(size / stride)`.
pub fn conv_out_size_same(size: i64, stride: i64) -> i64 {
    (size + stride - 1) / stride
}

/// `output_padding` needed for a transposed convolution to map `in_size`
/// back to exactly `out_size`.
///
/// Inverts `out = (in - 1) * stride - 2 * padding + kernel + output_padding`.
/// For any pair produced by [`conv_out_size_same`] with the constants above
/// the result is 0 or 1.
pub fn deconv_output_padding(in_size: i64, out_size: i64, stride: i64, kernel: i64, padding: i64) -> i64 {
    out_size - ((in_size - 1) * stride - 2 * padding + kernel)
}

/// The five spatial stages of the generator, from the full output resolution
/// down to the seed of the latent projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorShapes {
    pub s: (i64, i64),
    pub s2: (i64, i64),
    pub s4: (i64, i64),
    pub s8: (i64, i64),
    pub s16: (i64, i64),
}

impl GeneratorShapes {
    /// Walks the ceil-division ladder backward from the target output size.
    pub fn new(out_height: i64, out_width: i64) -> Self {
        let s = (out_height, out_width);
        let s2 = (conv_out_size_same(s.0, STRIDE), conv_out_size_same(s.1, STRIDE));
        let s4 = (conv_out_size_same(s2.0, STRIDE), conv_out_size_same(s2.1, STRIDE));
        let s8 = (conv_out_size_same(s4.0, STRIDE), conv_out_size_same(s4.1, STRIDE));
        let s16 = (conv_out_size_same(s8.0, STRIDE), conv_out_size_same(s8.1, STRIDE));
        Self { s, s2, s4, s8, s16 }
    }

    /// Per-dimension `output_padding` for the transposed convolution going
    /// from `from` up to `to`.
    pub fn output_padding(from: (i64, i64), to: (i64, i64)) -> (i64, i64) {
        (
            deconv_output_padding(from.0, to.0, STRIDE, KERNEL_SIZE, PADDING),
            deconv_output_padding(from.1, to.1, STRIDE, KERNEL_SIZE, PADDING),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_division() {
        assert_eq!(conv_out_size_same(64, 2), 32);
        assert_eq!(conv_out_size_same(63, 2), 32);
        assert_eq!(conv_out_size_same(1, 2), 1);
        assert_eq!(conv_out_size_same(7, 3), 3);
        assert_eq!(conv_out_size_same(9, 3), 3);
        for size in 1..=256 {
            for stride in 1..=4 {
                let expect = (size as f64 / stride as f64).ceil() as i64;
                assert_eq!(conv_out_size_same(size, stride), expect);
            }
        }
    }

    #[test]
    fn ladder_for_64() {
        let shapes = GeneratorShapes::new(64, 64);
        assert_eq!(shapes.s, (64, 64));
        assert_eq!(shapes.s2, (32, 32));
        assert_eq!(shapes.s4, (16, 16));
        assert_eq!(shapes.s8, (8, 8));
        assert_eq!(shapes.s16, (4, 4));
    }

    #[test]
    fn ladder_for_non_power_of_two() {
        let shapes = GeneratorShapes::new(28, 28);
        assert_eq!(shapes.s2, (14, 14));
        assert_eq!(shapes.s4, (7, 7));
        assert_eq!(shapes.s8, (4, 4));
        assert_eq!(shapes.s16, (2, 2));

        let shapes = GeneratorShapes::new(100, 37);
        assert_eq!(shapes.s2, (50, 19));
        assert_eq!(shapes.s4, (25, 10));
        assert_eq!(shapes.s8, (13, 5));
        assert_eq!(shapes.s16, (7, 3));
    }

    fn deconv_out(in_size: i64, output_padding: i64) -> i64 {
        (in_size - 1) * STRIDE - 2 * PADDING + KERNEL_SIZE + output_padding
    }

    #[test]
    fn deconv_inverts_the_ladder_exactly() {
        // For every target size the four transposed convolutions must land on
        // the exact intermediate sizes of the forward ladder.
        for out in 8..=256 {
            let shapes = GeneratorShapes::new(out, out);
            for (from, to) in [
                (shapes.s16, shapes.s8),
                (shapes.s8, shapes.s4),
                (shapes.s4, shapes.s2),
                (shapes.s2, shapes.s),
            ] {
                let (oph, opw) = GeneratorShapes::output_padding(from, to);
                assert!((0..STRIDE).contains(&oph), "out {out}: output_padding {oph}");
                assert!((0..STRIDE).contains(&opw));
                assert_eq!(deconv_out(from.0, oph), to.0, "out {out}: {from:?} -> {to:?}");
                assert_eq!(deconv_out(from.1, opw), to.1);
            }
        }
    }
}
