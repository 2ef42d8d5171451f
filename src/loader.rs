//! Sources of persisted (chain, parameter, iteration) sample arrays.
use crate::error::Result;
use crate::utils::read_csv;
use crate::{Array3, PlotError};
use log::debug;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Anything that can produce a sample tensor indexed as
/// `[chain][parameter][iteration]`.
pub trait SampleSource {
    fn load(&self) -> Result<Array3>;
}

impl SampleSource for Array3 {
    fn load(&self) -> Result<Array3> {
        Ok(self.clone())
    }
}

/// A NumPy `.npy` file holding a 3-D little-endian `float64` or `float32`
/// array in C order, as written by `numpy.save`.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyFile {
    path: PathBuf,
}

impl NpyFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

fn parse_err<T>(path: &Path, msg: impl std::fmt::Display) -> Result<T> {
    Err(PlotError::Parse(format!("{}: {}", path.display(), msg)))
}

/// Raw text of a value in the header dict, e.g. `'<f8'` or `(2, 3, 4)`.
fn header_field<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("'{}':", key);
    let start = header.find(&pattern)? + pattern.len();
    let rest = header[start..].trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')').map(|i| i + 1)
    } else {
        rest.find(|c: char| c == ',' || c == '}')
    };
    Some(rest[..end.unwrap_or_else(|| rest.len())].trim())
}

fn parse_shape(raw: &str) -> Option<Vec<usize>> {
    raw.trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

impl SampleSource for NpyFile {
    fn load(&self) -> Result<Array3> {
        let path = self.path.as_path();
        let bytes = fs::read(path)?;
        if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
            return parse_err(path, "not a .npy file");
        }
        let (header_len, header_start) = match bytes[6] {
            1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
            2 | 3 if bytes.len() >= 12 => (
                u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
                12,
            ),
            major => return parse_err(path, format!("unsupported .npy version {}", major)),
        };
        let data_start = header_start + header_len;
        if bytes.len() < data_start {
            return parse_err(path, "truncated header");
        }
        let header = String::from_utf8_lossy(&bytes[header_start..data_start]);

        let descr = header_field(&header, "descr")
            .map(|d| d.trim_matches(|c: char| c == '\'' || c == '"'));
        let item_size = match descr {
            Some("<f8") => 8,
            Some("<f4") => 4,
            other => return parse_err(path, format!("unsupported dtype {:?}", other)),
        };
        if header_field(&header, "fortran_order") != Some("False") {
            return parse_err(path, "only C-ordered arrays are supported");
        }
        let shape = match header_field(&header, "shape").and_then(parse_shape) {
            Some(shape) if shape.len() == 3 => shape,
            other => return parse_err(path, format!("expected a 3-D shape, got {:?}", other)),
        };
        let (chains, params, iters) = (shape[0], shape[1], shape[2]);
        let data_len = chains
            .checked_mul(params)
            .and_then(|rows| rows.checked_mul(iters))
            .and_then(|count| count.checked_mul(item_size));
        let data_len = match data_len {
            Some(len) => len,
            None => return parse_err(path, format!("shape {:?} is too large", shape)),
        };
        if params == 0 || iters == 0 {
            return Ok(vec![vec![Vec::new(); params]; chains]);
        }

        let payload = &bytes[data_start..];
        if payload.len() < data_len {
            return parse_err(
                path,
                format!("{} bytes of data for shape {:?}", payload.len(), shape),
            );
        }
        let values: Vec<f64> = payload[..data_len]
            .chunks(item_size)
            .map(|chunk| {
                if item_size == 8 {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(chunk);
                    f64::from_le_bytes(b)
                } else {
                    let mut b = [0u8; 4];
                    b.copy_from_slice(chunk);
                    f32::from_le_bytes(b) as f64
                }
            })
            .collect();

        let tensor: Array3 = values
            .chunks(params * iters)
            .take(chains)
            .map(|chain| chain.chunks(iters).take(params).map(<[f64]>::to_vec).collect())
            .collect();
        debug!(
            "loaded {} chains x {} parameters x {} iterations from {}",
            chains,
            params,
            iters,
            path.display()
        );
        Ok(tensor)
    }
}

/// One comma-separated file per chain, one row per iteration and one column
/// per parameter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CsvChains {
    pub paths: Vec<PathBuf>,
    /// Header lines to skip at the top of every file.
    pub skip_rows: usize,
}

impl CsvChains {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            skip_rows: 0,
        }
    }

    pub fn skip_rows(mut self, rows: usize) -> Self {
        self.skip_rows = rows;
        self
    }
}

impl SampleSource for CsvChains {
    fn load(&self) -> Result<Array3> {
        self.paths
            .iter()
            .map(|path| read_csv(path, self.skip_rows, None))
            .collect()
    }
}
