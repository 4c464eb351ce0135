use crate::Float;
use faer::Col;
use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIoError {
    #[error("vector input/output error")]
    Io(#[from] io::Error),
    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("line {line}: index {index} out of range for a vector of length {len}")]
    OutOfRange {
        line: usize,
        index: usize,
        len: usize,
    },
}

pub fn constant(size: usize, value: Float) -> Col<Float> {
    Col::from_fn(size, |_| value)
}

pub fn to_vec(v: &Col<Float>) -> Vec<Float> {
    (0..v.nrows()).map(|i| v[i]).collect()
}

pub fn mean(v: &Col<Float>) -> Float {
    to_vec(v).iter().sum::<Float>() / v.nrows().max(1) as Float
}

pub fn min_max(v: &Col<Float>) -> (Float, Float) {
    to_vec(v)
        .iter()
        .fold((Float::INFINITY, Float::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        })
}

/// Writes `v` in the plain text format: two `#` header lines followed by one
/// `<index> <value>` pair per line.
pub fn write_vector(v: &Col<Float>, output: &mut impl Write) -> io::Result<()> {
    writeln!(output, "# saved vector:")?;
    writeln!(output, "# <row index> <value>")?;
    for i in 0..v.nrows() {
        writeln!(output, "{} {}", i, v[i])?;
    }
    output.flush()
}

/// Reads `<index> <value>` pairs into `v`, skipping lines starting with `#`.
/// Elements that don't appear in the input keep their value.
pub fn read_vector(v: &mut Col<Float>, input: impl BufRead) -> Result<(), VectorIoError> {
    let mut parsed = Vec::new();
    for (n, line) in input.lines().enumerate() {
        let line = line?;
        let line_no = n + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut tokens = trimmed.split_whitespace();
        let (Some(index), Some(value), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(VectorIoError::Parse {
                line: line_no,
                reason: "expected `<index> <value>`".into(),
            });
        };
        let index: usize = index.parse().map_err(|_| VectorIoError::Parse {
            line: line_no,
            reason: format!("invalid index `{index}`"),
        })?;
        let value: Float = value.parse().map_err(|_| VectorIoError::Parse {
            line: line_no,
            reason: format!("invalid value `{value}`"),
        })?;
        if index >= v.nrows() {
            return Err(VectorIoError::OutOfRange {
                line: line_no,
                index,
                len: v.nrows(),
            });
        }
        parsed.push((index, value));
    }

    for (index, value) in parsed {
        v[index] = value;
    }
    Ok(())
}

pub fn save_vector(v: &Col<Float>, path: impl AsRef<Path>) -> Result<(), VectorIoError> {
    let mut output = BufWriter::new(File::create(path)?);
    write_vector(v, &mut output).map_err(VectorIoError::from)
}

pub fn load_vector(v: &mut Col<Float>, path: impl AsRef<Path>) -> Result<(), VectorIoError> {
    read_vector(v, BufReader::new(File::open(path)?))
}

/// Writes the raw native-endian bytes of `v`.
pub fn write_col_bytes(v: &Col<Float>, output: &mut impl Write) -> io::Result<()> {
    let data = to_vec(v);
    output.write_all(bytemuck::cast_slice(&data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_format() {
        let v = Col::from_fn(3, |i| i as Float * 1.5);
        let mut out = Vec::new();
        write_vector(&v, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "# saved vector:\n# <row index> <value>\n0 0\n1 1.5\n2 3\n"
        );
    }

    #[test]
    fn read_back() {
        let v = Col::from_fn(4, |i| 1e5 + i as Float);
        let mut out = Vec::new();
        write_vector(&v, &mut out).unwrap();

        let mut w = constant(4, 0.0);
        read_vector(&mut w, out.as_slice()).unwrap();
        assert_eq!(to_vec(&v), to_vec(&w));
    }

    #[test]
    fn read_rejects_bad_lines() {
        let mut w = constant(2, 7.0);
        assert!(matches!(
            read_vector(&mut w, "# c\n0 1\n5 2\n".as_bytes()),
            Err(VectorIoError::OutOfRange { line: 3, index: 5, .. })
        ));
        assert!(matches!(
            read_vector(&mut w, "0 x\n".as_bytes()),
            Err(VectorIoError::Parse { line: 1, .. })
        ));
        assert_eq!(to_vec(&w), vec![7.0, 7.0]);
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.dat");
        let v = Col::from_fn(5, |i| (i * i) as Float);
        save_vector(&v, &path).unwrap();
        let mut w = constant(5, 0.0);
        load_vector(&mut w, &path).unwrap();
        assert_eq!(to_vec(&v), to_vec(&w));
    }

    #[test]
    fn statistics() {
        let v = Col::from_fn(4, |i| i as Float);
        assert_eq!(mean(&v), 1.5);
        assert_eq!(min_max(&v), (0.0, 3.0));
    }
}
