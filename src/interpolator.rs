use ndarray::ArrayView2;
use rayon::prelude::*;

use crate::metadata::PixelSpacing;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Dimensions (depth, height, width) the volume would have if every axis
    /// were sampled at the finest of the three spacings.
    pub(crate) fn get_isotropic_dimensions(
        spacing: PixelSpacing,
        original_dim: (usize, usize, usize),
    ) -> (usize, usize, usize) {
        if !spacing.is_valid() {
            return original_dim;
        }
        let min_spacing = spacing.x.min(spacing.y).min(spacing.z);
        let scale = |count: usize, axis_spacing: f64| {
            ((count as f64 * axis_spacing / min_spacing).round() as usize).max(1)
        };

        // original_dim is (depth, height, width) corresponding to (z, y, x)
        (
            scale(original_dim.0, spacing.z),
            scale(original_dim.1, spacing.y),
            scale(original_dim.2, spacing.x),
        )
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<i16>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]] as f32;
        let v01 = slice[[y0, x1]] as f32;
        let v10 = slice[[y1, x0]] as f32;
        let v11 = slice[[y1, x1]] as f32;

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Resample `slice` to `width` x `height` with pixel-center alignment,
    /// rounding back to stored sample values. Row-major output.
    pub(crate) fn resample(slice: &ArrayView2<i16>, width: usize, height: usize) -> Vec<i16> {
        let (slice_height, slice_width) = slice.dim();
        if slice_height == 0 || slice_width == 0 {
            return vec![0; width * height];
        }

        (0..height)
            .into_par_iter()
            .flat_map_iter(|y| {
                (0..width).map(move |x| {
                    let norm_x = (x as f32 + 0.5) / width as f32;
                    let norm_y = (y as f32 + 0.5) / height as f32;

                    let src_x = (norm_x * slice_width as f32 - 0.5)
                        .clamp(0.0, (slice_width - 1) as f32);
                    let src_y = (norm_y * slice_height as f32 - 0.5)
                        .clamp(0.0, (slice_height - 1) as f32);

                    Self::bilinear_interpolate(slice, src_y, src_x)
                        .round()
                        .clamp(i16::MIN as f32, i16::MAX as f32) as i16
                })
            })
            .collect()
    }
}
