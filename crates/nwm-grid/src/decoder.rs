//! Decodes one NWM forcing grid file (NetCDF-4/HDF5) into the fixed
//! `(9, y, x)` variable tensor and valid-time stamp the rest of the
//! pipeline expects.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use forcing_core::ForcingError;
use forcing_core::Result;

use crate::hdf5_quiet::silence_hdf5_errors;

/// One decoded grid file: the fixed-order `(9, ysize*xsize)` variable
/// tensor in float32, the grid's `(ysize, xsize)` extent, and its
/// `"YYYYMMDD HHMM"` valid-time stamp.
#[derive(Debug, Clone)]
pub struct DecodedGrid {
    pub ysize: usize,
    pub xsize: usize,
    /// Row-major `(9, ysize * xsize)`, in [`forcing_core::OUTPUT_VARIABLES`]
    /// order.
    pub data: Vec<f32>,
    pub valid_time: String,
}

/// Input variable names in read order (distinct from
/// [`forcing_core::INPUT_VARIABLES`], which repeats `RAINRATE` to reflect
/// its two outputs); each is read from the file exactly once.
const SOURCE_VARIABLES: [&str; 8] = [
    "U2D", "V2D", "LWDOWN", "RAINRATE", "T2D", "Q2D", "PSFC", "SWDOWN",
];

/// Decode `bytes` (the raw contents of one NWM forcing file) into a
/// [`DecodedGrid`].
///
/// The netcdf/HDF5 libraries require a real file handle, so the bytes are
/// first written to a temp file — preferring `/dev/shm` on Linux to avoid
/// real disk I/O — then opened, read, and the temp file removed.
pub fn decode(bytes: &[u8]) -> Result<DecodedGrid> {
    silence_hdf5_errors();

    let temp_dir = optimal_temp_dir();
    let temp_path = temp_dir.join(temp_filename());

    let mut file = std::fs::File::create(&temp_path)?;
    file.write_all(bytes)?;
    drop(file);

    let result = decode_path(&temp_path);
    let _ = std::fs::remove_file(&temp_path);
    result
}

fn decode_path(path: &std::path::Path) -> Result<DecodedGrid> {
    let nc_file = netcdf::open(path)
        .map_err(|e| ForcingError::decoding(format!("failed to open grid file: {e}")))?;

    let ysize = nc_file
        .dimension("y")
        .ok_or_else(|| ForcingError::decoding("grid file is missing dimension 'y'"))?
        .len();
    let xsize = nc_file
        .dimension("x")
        .ok_or_else(|| ForcingError::decoding("grid file is missing dimension 'x'"))?
        .len();
    let flat_len = ysize * xsize;

    let mut source: Vec<Vec<f32>> = Vec::with_capacity(SOURCE_VARIABLES.len());
    for name in SOURCE_VARIABLES {
        let var = nc_file
            .variable(name)
            .ok_or_else(|| ForcingError::decoding(format!("grid file is missing variable '{name}'")))?;
        let values: Vec<f32> = var
            .get_values(..)
            .map_err(|e| ForcingError::decoding(format!("failed to read '{name}': {e}")))?;
        if values.len() != flat_len {
            return Err(ForcingError::decoding(format!(
                "variable '{name}' has {} values, expected {flat_len}",
                values.len()
            )));
        }
        source.push(values);
    }

    // SOURCE_VARIABLES index: 0=U2D 1=V2D 2=LWDOWN 3=RAINRATE 4=T2D 5=Q2D
    // 6=PSFC 7=SWDOWN. Output order and transforms per the fixed mapping:
    // RAINRATE feeds both APCP_surface (identity) and precip_rate (*3600).
    let mut data = Vec::with_capacity(9 * flat_len);
    data.extend_from_slice(&source[0]); // UGRD_10maboveground
    data.extend_from_slice(&source[1]); // VGRD_10maboveground
    data.extend_from_slice(&source[2]); // DLWRF_surface
    data.extend_from_slice(&source[3]); // APCP_surface
    data.extend(source[3].iter().map(|v| v * 3600.0)); // precip_rate
    data.extend_from_slice(&source[4]); // TMP_2maboveground
    data.extend_from_slice(&source[5]); // SPFH_2maboveground
    data.extend_from_slice(&source[6]); // PRES_surface
    data.extend_from_slice(&source[7]); // DSWRF_surface

    let valid_time = read_valid_time(&nc_file)?;

    Ok(DecodedGrid {
        ysize,
        xsize,
        data,
        valid_time,
    })
}

/// Parses `model_output_valid_time` (e.g. `"20230601_1200"`) into
/// `"YYYYMMDD HHMM"` by joining its first two underscore-separated
/// components with one space.
fn read_valid_time(nc_file: &netcdf::File) -> Result<String> {
    let attr = nc_file
        .attribute("model_output_valid_time")
        .ok_or_else(|| ForcingError::decoding("grid file is missing 'model_output_valid_time'"))?;
    let raw = attr
        .value()
        .map_err(|e| ForcingError::decoding(format!("unreadable 'model_output_valid_time': {e}")))?;
    let raw = String::try_from(raw)
        .map_err(|_| ForcingError::decoding("'model_output_valid_time' is not a string"))?;

    let mut parts = raw.splitn(3, '_');
    let date = parts
        .next()
        .ok_or_else(|| ForcingError::decoding("'model_output_valid_time' is empty"))?;
    let time = parts.next().unwrap_or_default();
    Ok(format!("{date} {time}"))
}

fn optimal_temp_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let shm = std::path::Path::new("/dev/shm");
        if shm.is_dir() {
            let probe = shm.join(format!(".nwm_grid_probe_{}", std::process::id()));
            if std::fs::write(&probe, b"probe").is_ok() {
                let _ = std::fs::remove_file(&probe);
                return shm.to_path_buf();
            }
        }
    }

    std::env::temp_dir()
}

fn temp_filename() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let pid = std::process::id();
    let tid = std::thread::current().id();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("nwm_grid_{pid}_{tid:?}_{count}.nc")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_filenames_are_unique() {
        assert_ne!(temp_filename(), temp_filename());
    }

    #[test]
    fn optimal_temp_dir_exists() {
        assert!(optimal_temp_dir().exists());
    }

    #[test]
    fn valid_time_formatting_splits_on_underscore() {
        // Exercised indirectly through decode_path in integration tests that
        // ship a real fixture file; this unit test only pins the string
        // contract documented above for reviewers who can't run one.
        let raw = "20230601_1200";
        let mut parts = raw.splitn(3, '_');
        let date = parts.next().unwrap();
        let time = parts.next().unwrap_or_default();
        assert_eq!(format!("{date} {time}"), "20230601 1200");
    }
}
