//! Result sink used to persist solver output.
//!
//! The on-disk format belongs to the I/O layer. The solver only needs to
//! hand named values to something that implements [`Writer`].

use crate::error::WriteError;

/// A value handed to a [`Writer`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value<'a> {
    /// A signed integer.
    Integer(i64),
    /// A floating-point scalar.
    Scalar(f64),
    /// A string.
    Text(&'a str),
    /// A flat vector.
    Vector(&'a [f64]),
    /// A dense row-major matrix.
    Matrix {
        /// Number of rows.
        rows: usize,
        /// Number of columns.
        cols: usize,
        /// `rows * cols` entries, row-major.
        data: &'a [f64],
    },
    /// A multi-dimensional array tagged with the name of its domain.
    Array {
        /// Domain name, e.g. `"k_DCA x w"`.
        domain: &'a str,
        /// Extent along each dimension.
        shape: &'a [usize],
        /// Flattened entries, last dimension fastest.
        data: &'a [f64],
    },
}

/// Sink for named solver output, organised in nested groups.
///
/// Object-safe so that kernels can write through `&mut dyn Writer`.
pub trait Writer {
    /// Store `value` under `name` in the current group.
    fn execute(&mut self, name: &str, value: Value<'_>) -> Result<(), WriteError>;

    /// Enter a nested group.
    fn open_group(&mut self, name: &str) -> Result<(), WriteError>;

    /// Leave the innermost group.
    fn close_group(&mut self) -> Result<(), WriteError>;
}
