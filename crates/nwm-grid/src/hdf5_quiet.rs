//! Silences HDF5's own diagnostic error printing to stderr.
//!
//! The HDF5 C library writes verbose error traces directly to stderr
//! whenever an operation probes for something absent (an optional
//! attribute, say), even when the caller handles the `None` gracefully.
//! Left alone this drowns real log output in noise like:
//!
//! ```text
//! HDF5-DIAG: Error detected in HDF5 (1.14.x) thread 0:
//!   #000: H5A.c line 527 in H5Aopen(): can't locate attribute
//! ```
//!
//! Disabling it once per process with `H5Eset_auto2` and null handlers
//! matches how HDF5-backed readers elsewhere in this codebase suppress it.

use std::sync::Once;

pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe; passing null handlers is the
        // documented way to disable the default error stack printer.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}
