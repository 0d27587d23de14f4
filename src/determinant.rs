//! Determinants of the linear part of affine registration transforms.
//!
//! The determinant of the 3x3 linear block of a subject-to-template affine is the volume scaling
//! the registration applies, which makes it a proxy for intracranial volume.

use ndarray::{s, Array2, ArrayView2};

use std::path::Path;

use crate::ants_mat::read_ants_affine;
use crate::error::{IcvError, Result};

/// Number of stored parameters of a 3D affine transform: 9 linear entries and 3 translations.
pub const AFFINE_PARAMETER_COUNT: usize = 12;

/// The determinant of an affine's linear block and the determinant of its inverse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineDeterminant {
    pub det: f64,
    pub det_inv: f64,
}


/// Reshape the 12 stored parameters into 4 rows of 3 columns and return rows 0-2, columns 0-2.
pub fn linear_block(parameters: &[f64]) -> Result<Array2<f64>> {
    if parameters.len() != AFFINE_PARAMETER_COUNT {
        return Err(IcvError::InvalidParameterCount(AFFINE_PARAMETER_COUNT, parameters.len()));
    }
    let full = Array2::from_shape_vec((4, 3), parameters.to_vec())?;
    Ok(full.slice(s![0..3, 0..3]).to_owned())
}


/// Determinant of a 3x3 matrix by cofactor expansion along the first row.
pub fn det3(m: &ArrayView2<f64>) -> f64 {
    m[[0, 0]] * (m[[1, 1]] * m[[2, 2]] - m[[1, 2]] * m[[2, 1]])
        - m[[0, 1]] * (m[[1, 0]] * m[[2, 2]] - m[[1, 2]] * m[[2, 0]])
        + m[[0, 2]] * (m[[1, 0]] * m[[2, 1]] - m[[1, 1]] * m[[2, 0]])
}


/// Inverse of a 3x3 matrix via its adjugate.
///
/// Fails with [`IcvError::SingularMatrix`] if the determinant is zero or not finite.
pub fn inverse3(m: &ArrayView2<f64>) -> Result<Array2<f64>> {
    let det = det3(m);
    if det == 0.0 || !det.is_finite() {
        return Err(IcvError::SingularMatrix(det));
    }
    let cofactor = |r0: usize, r1: usize, c0: usize, c1: usize| m[[r0, c0]] * m[[r1, c1]] - m[[r0, c1]] * m[[r1, c0]];

    // inv[i][j] = cofactor(j, i) / det
    let adjugate = ndarray::arr2(&[
        [cofactor(1, 2, 1, 2), -cofactor(0, 2, 1, 2), cofactor(0, 1, 1, 2)],
        [-cofactor(1, 2, 0, 2), cofactor(0, 2, 0, 2), -cofactor(0, 1, 0, 2)],
        [cofactor(1, 2, 0, 1), -cofactor(0, 2, 0, 1), cofactor(0, 1, 0, 1)],
    ]);
    Ok(adjugate / det)
}


/// Compute the determinant of the linear block of the given affine parameters and the
/// determinant of its inverse.
///
/// # Examples
///
/// ```
/// let params = [2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 5.0, 5.0, 5.0];
/// let d = icvadjust::affine_determinant(&params).unwrap();
/// assert_eq!(8.0, d.det);
/// assert_eq!(0.125, d.det_inv);
/// ```
pub fn affine_determinant(parameters: &[f64]) -> Result<AffineDeterminant> {
    let block = linear_block(parameters)?;
    let det = det3(&block.view());
    let inverse = inverse3(&block.view())?;
    let det_inv = det3(&inverse.view());
    Ok(AffineDeterminant { det, det_inv })
}


/// Read an ANTs affine transform file and compute its determinants.
pub fn read_affine_determinant<P: AsRef<Path>>(path: P) -> Result<AffineDeterminant> {
    let affine = read_ants_affine(path)?;
    affine_determinant(&affine.parameters)
}


#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    /// Lay out a 3x3 linear matrix and a translation the way ANTs stores them.
    fn flat_record(m: &Array2<f64>, translation: [f64; 3]) -> Vec<f64> {
        let mut params: Vec<f64> = m.iter().cloned().collect();
        params.extend_from_slice(&translation);
        params
    }

    #[test]
    fn the_linear_block_drops_the_translation_row() {
        let params: Vec<f64> = (1..=12).map(|v| v as f64).collect();
        let block = linear_block(&params).unwrap();
        assert_eq!(arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]), block);
    }

    #[test]
    fn the_determinant_of_a_known_matrix_is_recovered() {
        let m = arr2(&[[1.2, 0.1, -0.3], [0.05, 0.95, 0.2], [-0.1, 0.15, 1.1]]);
        let expected = 1.2 * (0.95 * 1.1 - 0.2 * 0.15) - 0.1 * (0.05 * 1.1 - 0.2 * -0.1) + -0.3 * (0.05 * 0.15 - 0.95 * -0.1);
        let d = affine_determinant(&flat_record(&m, [10.0, -3.0, 7.5])).unwrap();
        assert_abs_diff_eq!(expected, d.det, epsilon = 1e-6);
    }

    #[test]
    fn the_translation_does_not_change_the_determinant() {
        let m = arr2(&[[0.8, 0.0, 0.1], [0.0, 1.3, 0.0], [0.2, 0.0, 0.9]]);
        let a = affine_determinant(&flat_record(&m, [0.0, 0.0, 0.0])).unwrap();
        let b = affine_determinant(&flat_record(&m, [100.0, -250.0, 33.0])).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn the_inverse_determinant_is_the_reciprocal() {
        let m = arr2(&[[1.05, -0.2, 0.3], [0.1, 0.87, -0.05], [0.02, 0.4, 1.3]]);
        let d = affine_determinant(&flat_record(&m, [1.0, 2.0, 3.0])).unwrap();
        assert_abs_diff_eq!(1.0 / d.det, d.det_inv, epsilon = 1e-6);
    }

    #[test]
    fn the_inverse_times_the_matrix_is_the_identity() {
        let m = arr2(&[[2.0, 1.0, 0.0], [0.0, 1.0, 3.0], [1.0, 0.0, 1.0]]);
        let inv = inverse3(&m.view()).unwrap();
        let product = m.dot(&inv);
        assert_abs_diff_eq!(Array2::<f64>::eye(3), product, epsilon = 1e-12);
    }

    #[test]
    fn a_singular_block_is_a_distinct_error() {
        let m = arr2(&[[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 1.0, 1.0]]);
        match affine_determinant(&flat_record(&m, [0.0; 3])) {
            Err(IcvError::SingularMatrix(det)) => assert_eq!(0.0, det),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn a_short_parameter_vector_is_rejected() {
        match affine_determinant(&[1.0; 9]) {
            Err(IcvError::InvalidParameterCount(12, 9)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }
}
