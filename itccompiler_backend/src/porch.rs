//! Gate porches around the train.
//!
//! The gate opens `porch_sets` sample-sets before the train and stays open as long after it. A
//! porch carries only the gate bit in its digital slot, no analog content. Whatever the gate
//! settings, the digital word of the very last sample-set is forced to zero so the gate is never
//! left asserted once the buffer has played out.

use ndarray::{s, Array2};

use crate::error::*;

/// Wraps `train` in front and back porches of `porch_sets` gate-only sets, then closes the gate.
///
/// With `porch_sets == 0` the train itself is returned, only with its last digital word zeroed.
///
/// ```
/// use ndarray::Array2;
/// use itccompiler_backend::porch::wrap_porch;
///
/// let train = Array2::<i16>::from_elem((3, 2), 1);
/// let program = wrap_porch(train, 2, 0b1).unwrap();
/// assert_eq!(program.nrows(), 7);
/// assert_eq!(program.column(1).to_vec(), vec![1, 1, 1, 1, 1, 1, 0]);
/// assert_eq!(program.column(0).to_vec(), vec![0, 0, 1, 1, 1, 0, 0]);
/// ```
pub fn wrap_porch(train: Array2<i16>, porch_sets: usize, gate_bits: i16) -> CompileResult<Array2<i16>> {
    let (train_sets, stride) = train.dim();
    if stride == 0 || train_sets == 0 {
        return Err(CompileError::BufferSizeMismatch {
            stage: "porch wrapping",
            expected: 1,
            actual: 0,
        });
    }
    let digital = stride - 1;

    let mut program = if porch_sets > 0 {
        let total_sets = train_sets + 2 * porch_sets;
        let mut program = Array2::<i16>::zeros((total_sets, stride));
        program.slice_mut(s![..porch_sets, digital]).fill(gate_bits);
        program
            .slice_mut(s![porch_sets..porch_sets + train_sets, ..])
            .assign(&train);
        let front_porch = program.slice(s![..porch_sets, ..]).to_owned();
        program
            .slice_mut(s![porch_sets + train_sets.., ..])
            .assign(&front_porch);
        program
    } else {
        train
    };

    close_gate(&mut program);
    Ok(program)
}

/// Zeroes the digital word of the final sample-set.
pub fn close_gate(program: &mut Array2<i16>) {
    let (n_sets, stride) = program.dim();
    if n_sets > 0 && stride > 0 {
        program[[n_sets - 1, stride - 1]] = 0;
    }
}
