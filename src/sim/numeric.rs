// Numeric approximations on the staggered grid

use rayon::prelude::*;

use crate::{ScalarField, VectorField};

/// Below this many samples a fill runs serially; the fan-out is not worth it.
const PAR_MIN_SAMPLES: usize = 16_384;

/// Linear interpolation between `a` and `b`.
///
/// Written as a weighted sum so that `t == 0` and `t == 1` return `a` and
/// `b` exactly.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1. - t) + b * t
}

/// Bilinearly sample a field at fractional, field-local coordinates.
///
/// The integer base index is clamped to `[0, dim - 2]` on each axis and the
/// fractional weights to `[0, 1]`, so queries at or past the border return
/// the nearest edge sample instead of reading out of bounds or
/// extrapolating.
///
/// Parameters:
/// - `values` - The field to sample, indexed `(x, y)`
/// - `px` - The x coordinate in units of samples
/// - `py` - The y coordinate in units of samples
///
/// Returns:
/// - The interpolated value
pub fn sample_bilinear(values: &ScalarField, px: f32, py: f32) -> f32 {
    let (count_x, count_y) = values.shape();

    let left = clamp_base(px, count_x);
    let bottom = clamp_base(py, count_y);
    let right = (left + 1).min(count_x - 1);
    let top = (bottom + 1).min(count_y - 1);

    let x_frac = (px - left as f32).clamp(0., 1.);
    let y_frac = (py - bottom as f32).clamp(0., 1.);

    let value_top = lerp(values[(left, top)], values[(right, top)], x_frac);
    let value_bottom = lerp(values[(left, bottom)], values[(right, bottom)], x_frac);

    lerp(value_bottom, value_top, y_frac)
}

fn clamp_base(p: f32, count: usize) -> usize {
    let max = count.saturating_sub(2) as f32;
    p.floor().clamp(0., max) as usize
}

/// Compute the divergence of a staggered velocity field. That is ∇⋅u
/// evaluated per cell from the four edge fluxes:
///
/// (velX[x+1,y] - velX[x,y] + velY[x,y+1] - velY[x,y]) / dx
///
/// Parameters:
/// - `field` - The staggered `[velX, velY]` pair
/// - `dx` - The cell size
///
/// Returns:
/// - A `ScalarField` of the divergence, one value per cell.
pub fn divergence(field: &VectorField, dx: f32) -> ScalarField {
    let (vel_x, vel_y) = (&field[0], &field[1]);
    let (cols, rows) = (vel_y.nrows(), vel_x.ncols());

    ScalarField::from_fn(cols, rows, |x, y| {
        (vel_x[(x + 1, y)] - vel_x[(x, y)] + vel_y[(x, y + 1)] - vel_y[(x, y)]) / dx
    })
}

/// Overwrite every sample of `dst` with `f(x, y)`.
///
/// Storage is column-major, so each contiguous chunk is one grid row (fixed
/// `y`). Large fields fan rows out over the rayon pool; `f` must only read
/// state that is frozen for the duration of the fill.
pub fn fill_with_index(dst: &mut ScalarField, f: impl Fn(usize, usize) -> f32 + Sync) {
    let count_x = dst.nrows();
    if count_x == 0 {
        return;
    }

    if count_x * dst.ncols() >= PAR_MIN_SAMPLES {
        dst.as_mut_slice()
            .par_chunks_mut(count_x)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, value) in row.iter_mut().enumerate() {
                    *value = f(x, y);
                }
            });
    } else {
        for (y, row) in dst.as_mut_slice().chunks_mut(count_x).enumerate() {
            for (x, value) in row.iter_mut().enumerate() {
                *value = f(x, y);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use na::dmatrix;

    use super::*;

    #[test]
    fn test_lerp_endpoints_exact() {
        let (a, b) = (0.1_f32, 0.3_f32);

        assert_eq!(lerp(a, b, 0.), a);
        assert_eq!(lerp(a, b, 1.), b);
        assert!((lerp(a, b, 0.5) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_sample_on_nodes() {
        let field: ScalarField = dmatrix![
            1., 2., 3.;
            4., 5., 6.;
            7., 8., 9.;
        ];

        for x in 0..3 {
            for y in 0..3 {
                assert_eq!(sample_bilinear(&field, x as f32, y as f32), field[(x, y)]);
            }
        }
    }

    #[test]
    fn test_sample_interpolates() {
        let field: ScalarField = dmatrix![
            0., 2.;
            4., 6.;
        ];

        // (x, y) = (0.5, 0.5) is the mean of all four corners
        assert!((sample_bilinear(&field, 0.5, 0.5) - 3.).abs() < 1e-6);
        // halfway along y at x = 0
        assert!((sample_bilinear(&field, 0., 0.5) - 1.).abs() < 1e-6);
    }

    #[test]
    fn test_sample_clamps_outside() {
        let field: ScalarField = dmatrix![
            1., 2., 3.;
            4., 5., 6.;
            7., 8., 9.;
        ];

        assert_eq!(sample_bilinear(&field, -3., -3.), 1.);
        assert_eq!(sample_bilinear(&field, 10., 10.), 9.);
        assert_eq!(sample_bilinear(&field, 2., -0.5), 7.);
        assert_eq!(sample_bilinear(&field, 50., 1.), 8.);
    }

    #[test]
    fn test_sample_single_column() {
        let field: ScalarField = dmatrix![
            3.;
            5.;
        ];

        assert_eq!(sample_bilinear(&field, 0., 4.), 3.);
        assert!((sample_bilinear(&field, 0.5, 0.) - 4.).abs() < 1e-6);
    }

    #[test]
    fn test_divergence() {
        // 2x2 cells: velX is 3x2, velY is 2x3
        let vel_x: ScalarField = dmatrix![
            0., 0.;
            1., 2.;
            0., 0.;
        ];
        let vel_y: ScalarField = dmatrix![
            0., 1., 0.;
            0., 0., 0.;
        ];

        let expected: ScalarField = dmatrix![
            4., 2.;
            -2., -4.;
        ];

        let actual = divergence(&[vel_x, vel_y], 0.5);

        assert_eq!(expected, actual);
    }

    #[test]
    fn test_fill_with_index_serial_and_parallel_agree() {
        let mut small = ScalarField::zeros(7, 5);
        fill_with_index(&mut small, |x, y| (x * 100 + y) as f32);
        assert_eq!(small[(6, 4)], 604.);

        let mut large = ScalarField::zeros(200, 120);
        fill_with_index(&mut large, |x, y| (x * 1000 + y) as f32);
        assert_eq!(large[(199, 0)], 199_000.);
        assert_eq!(large[(3, 119)], 3119.);
    }
}
