//! Multi-file binary persistence
//!
//! A matrix is persisted as a set of files sharing one base name inside a
//! directory, one file per concern. All integers and doubles are big-endian,
//! matching the files this format must round-trip with.
//!
//! | suffix    | contents                                                    |
//! |-----------|-------------------------------------------------------------|
//! | `.size`   | 5 × i64: rows, columns, entries, observations, grid columns |
//! | `.rowsec` | count-prefixed row sections (stats, hits, name, i64 ids)    |
//! | `.colsec` | count-prefixed column sections (stats, hits, name, i32 ids) |
//! | `.norm`   | i32 length + f64s; length 0 encodes "not normalized"        |
//! | `.rhs`    | i32 length + f64s                                           |
//! | `.unc`    | i32 length + f64s; a missing file is a valid "absent"       |
//! | `.mtx`    | count-prefixed sparse vectors of (i32 index, f64 value)     |
//! | `.trn`    | same layout as `.mtx`; present only if a transpose was built|
//!
//! Only valid mappings are ever written; no "not found" sentinel exists on
//! disk. Truncated files and unknown section names are format errors.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::error::MatrixError;
use crate::matrix::SparseMatrix;
use crate::section::{
    ColumnKind, ColumnSection, MatrixSection, RowKind, RowSection, SectionContainer, SectionCore,
    SectionStats,
};

pub const SIZE_SUFFIX: &str = "size";
pub const ROW_SECTIONS_SUFFIX: &str = "rowsec";
pub const COL_SECTIONS_SUFFIX: &str = "colsec";
pub const NORM_SUFFIX: &str = "norm";
pub const RHS_SUFFIX: &str = "rhs";
pub const UNCERTAINTY_SUFFIX: &str = "unc";
pub const MATRIX_SUFFIX: &str = "mtx";
pub const TRANSPOSE_SUFFIX: &str = "trn";

fn file_path(dir: &Path, base: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{base}.{suffix}"))
}

fn format_err(path: &Path, reason: impl AsRef<str>) -> MatrixError {
    MatrixError::Format(format!("{}: {}", path.display(), reason.as_ref()))
}

fn open_writer(path: &Path) -> Result<BufWriter<File>, MatrixError> {
    Ok(BufWriter::new(File::create(path)?))
}

fn open_reader(path: &Path) -> Result<BufReader<File>, MatrixError> {
    Ok(BufReader::new(File::open(path)?))
}

/// Removes a stale optional file left over from an earlier write.
fn remove_stale(path: &Path) -> Result<(), MatrixError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn read_len<R: Read>(reader: &mut R, path: &Path, what: &str) -> Result<usize, MatrixError> {
    let len = reader.read_i32::<BigEndian>()?;
    usize::try_from(len).map_err(|_| format_err(path, format!("negative {what} count: {len}")))
}

fn write_dense<W: Write>(writer: &mut W, values: &[f64]) -> Result<(), MatrixError> {
    writer.write_i32::<BigEndian>(values.len() as i32)?;
    for &v in values {
        writer.write_f64::<BigEndian>(v)?;
    }
    Ok(())
}

fn read_dense<R: Read>(reader: &mut R, path: &Path) -> Result<Vec<f64>, MatrixError> {
    let len = read_len(reader, path, "array length")?;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(reader.read_f64::<BigEndian>()?);
    }
    Ok(values)
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<(), MatrixError> {
    writer.write_i32::<BigEndian>(s.len() as i32)?;
    writer.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string<R: Read>(reader: &mut R, path: &Path) -> Result<String, MatrixError> {
    let len = read_len(reader, path, "string length")?;
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| format_err(path, "section name is not valid UTF-8"))
}

fn write_vectors_to<W: Write>(
    writer: &mut W,
    vectors: &[Vec<(usize, f64)>],
) -> Result<(), MatrixError> {
    writer.write_i32::<BigEndian>(vectors.len() as i32)?;
    for vector in vectors {
        writer.write_i32::<BigEndian>(vector.len() as i32)?;
        for &(index, value) in vector {
            writer.write_i32::<BigEndian>(index as i32)?;
            writer.write_f64::<BigEndian>(value)?;
        }
    }
    Ok(())
}

/// Decodes a count-prefixed list of sparse `(index, value)` vectors, the raw
/// layout of the `.mtx` and `.trn` files. Exposed for peripheral consumers
/// that work on the vector stream without the build protocol.
pub fn read_vectors<R: Read>(reader: &mut R) -> Result<Vec<Vec<(usize, f64)>>, MatrixError> {
    let count = reader.read_i32::<BigEndian>()?;
    let count = usize::try_from(count)
        .map_err(|_| MatrixError::Format(format!("negative vector count: {count}")))?;
    let mut vectors = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.read_i32::<BigEndian>()?;
        let len = usize::try_from(len)
            .map_err(|_| MatrixError::Format(format!("negative vector length: {len}")))?;
        let mut vector = Vec::with_capacity(len);
        for _ in 0..len {
            let index = reader.read_i32::<BigEndian>()?;
            let index = usize::try_from(index)
                .map_err(|_| MatrixError::Format(format!("negative entry index: {index}")))?;
            let value = reader.read_f64::<BigEndian>()?;
            vector.push((index, value));
        }
        vectors.push(vector);
    }
    Ok(vectors)
}

fn write_section_core<W: Write>(
    writer: &mut W,
    core: &SectionCore,
    name: &str,
) -> Result<(), MatrixError> {
    let stats = core.stats();
    writer.write_i64::<BigEndian>(stats.count() as i64)?;
    writer.write_f64::<BigEndian>(stats.min())?;
    writer.write_f64::<BigEndian>(stats.max())?;
    writer.write_f64::<BigEndian>(stats.sum())?;
    writer.write_f64::<BigEndian>(stats.sum_sq())?;
    writer.write_i32::<BigEndian>(core.index_count() as i32)?;
    for &hits in core.hit_count() {
        writer.write_i32::<BigEndian>(hits as i32)?;
    }
    for &weight in core.hit_weight() {
        writer.write_f64::<BigEndian>(weight)?;
    }
    write_string(writer, name)
}

/// Reads the shared section prefix; start and position are not stored on
/// disk and come from the caller's running totals.
fn read_section_core<R: Read>(
    reader: &mut R,
    path: &Path,
    start: usize,
    position: usize,
) -> Result<(SectionCore, String), MatrixError> {
    let count = reader.read_i64::<BigEndian>()?;
    let count = u64::try_from(count)
        .map_err(|_| format_err(path, format!("negative statistics count: {count}")))?;
    let min = reader.read_f64::<BigEndian>()?;
    let max = reader.read_f64::<BigEndian>()?;
    let sum = reader.read_f64::<BigEndian>()?;
    let sum_sq = reader.read_f64::<BigEndian>()?;
    let stats = SectionStats::from_raw(count, min, max, sum, sum_sq);

    let index_count = read_len(reader, path, "section index")?;
    let mut hit_count = Vec::with_capacity(index_count);
    for _ in 0..index_count {
        let hits = reader.read_i32::<BigEndian>()?;
        let hits = u32::try_from(hits)
            .map_err(|_| format_err(path, format!("negative hit count: {hits}")))?;
        hit_count.push(hits);
    }
    let mut hit_weight = Vec::with_capacity(index_count);
    for _ in 0..index_count {
        hit_weight.push(reader.read_f64::<BigEndian>()?);
    }
    let name = read_string(reader, path)?;
    let core = SectionCore::from_parts(start, position, stats, hit_count, hit_weight);
    Ok((core, name))
}

fn write_row_sections(
    path: &Path,
    sections: &SectionContainer<RowSection>,
) -> Result<(), MatrixError> {
    let mut writer = open_writer(path)?;
    writer.write_i32::<BigEndian>(sections.len() as i32)?;
    for section in sections.iter() {
        write_section_core(&mut writer, section.core(), section.kind().name())?;
        for &id in section.ids() {
            writer.write_i64::<BigEndian>(id)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn read_row_sections(path: &Path) -> Result<SectionContainer<RowSection>, MatrixError> {
    let mut reader = open_reader(path)?;
    let count = read_len(&mut reader, path, "section")?;
    let mut sections = Vec::with_capacity(count);
    let mut start = 0usize;
    for position in 0..count {
        let (core, name) = read_section_core(&mut reader, path, start, position)?;
        let kind = RowKind::from_name(&name)
            .ok_or_else(|| format_err(path, format!("unknown row section '{name}'")))?;
        let mut ids = Vec::with_capacity(core.index_count());
        for _ in 0..core.index_count() {
            ids.push(reader.read_i64::<BigEndian>()?);
        }
        start += core.index_count();
        sections.push(RowSection::from_parts(kind, core, ids));
    }
    Ok(SectionContainer::from_sections(sections))
}

fn write_col_sections(
    path: &Path,
    sections: &SectionContainer<ColumnSection>,
) -> Result<(), MatrixError> {
    let mut writer = open_writer(path)?;
    writer.write_i32::<BigEndian>(sections.len() as i32)?;
    for section in sections.iter() {
        write_section_core(&mut writer, section.core(), section.kind().name())?;
        for &id in section.ids() {
            writer.write_i32::<BigEndian>(id)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn read_col_sections(path: &Path) -> Result<SectionContainer<ColumnSection>, MatrixError> {
    let mut reader = open_reader(path)?;
    let count = read_len(&mut reader, path, "section")?;
    let mut sections = Vec::with_capacity(count);
    let mut start = 0usize;
    for position in 0..count {
        let (core, name) = read_section_core(&mut reader, path, start, position)?;
        let kind = ColumnKind::from_name(&name)
            .ok_or_else(|| format_err(path, format!("unknown column section '{name}'")))?;
        let mut ids = Vec::with_capacity(core.index_count());
        for _ in 0..core.index_count() {
            ids.push(reader.read_i32::<BigEndian>()?);
        }
        start += core.index_count();
        sections.push(ColumnSection::from_parts(kind, core, ids));
    }
    Ok(SectionContainer::from_sections(sections))
}

/// Writes the full persistence set for `matrix` under `dir/base.*`.
///
/// The uncertainty and transpose files are written only when present; stale
/// copies from an earlier write are removed so a later read sees a
/// consistent set.
pub fn write_matrix(matrix: &SparseMatrix, dir: &Path, base: &str) -> Result<(), MatrixError> {
    let size_path = file_path(dir, base, SIZE_SUFFIX);
    let mut writer = open_writer(&size_path)?;
    writer.write_i64::<BigEndian>(matrix.n_rows() as i64)?;
    writer.write_i64::<BigEndian>(matrix.n_cols() as i64)?;
    writer.write_i64::<BigEndian>(matrix.entry_count() as i64)?;
    writer.write_i64::<BigEndian>(matrix.observation_count() as i64)?;
    writer.write_i64::<BigEndian>(matrix.grid_node_column_count() as i64)?;
    writer.flush()?;

    write_row_sections(&file_path(dir, base, ROW_SECTIONS_SUFFIX), matrix.row_sections())?;
    write_col_sections(&file_path(dir, base, COL_SECTIONS_SUFFIX), matrix.col_sections())?;

    let mut writer = open_writer(&file_path(dir, base, NORM_SUFFIX))?;
    write_dense(&mut writer, matrix.col_norm().unwrap_or(&[]))?;
    writer.flush()?;

    let mut writer = open_writer(&file_path(dir, base, RHS_SUFFIX))?;
    write_dense(&mut writer, matrix.rhs())?;
    writer.flush()?;

    let unc_path = file_path(dir, base, UNCERTAINTY_SUFFIX);
    match matrix.uncertainty() {
        Some(values) => {
            let mut writer = open_writer(&unc_path)?;
            write_dense(&mut writer, values)?;
            writer.flush()?;
        }
        None => remove_stale(&unc_path)?,
    }

    let mut writer = open_writer(&file_path(dir, base, MATRIX_SUFFIX))?;
    write_vectors_to(&mut writer, matrix.rows())?;
    writer.flush()?;

    let trn_path = file_path(dir, base, TRANSPOSE_SUFFIX);
    match matrix.transpose() {
        Some(cols) => {
            let mut writer = open_writer(&trn_path)?;
            write_vectors_to(&mut writer, cols)?;
            writer.flush()?;
        }
        None => remove_stale(&trn_path)?,
    }

    debug!(
        base,
        rows = matrix.n_rows(),
        cols = matrix.n_cols(),
        entries = matrix.entry_count(),
        "wrote matrix file set"
    );
    Ok(())
}

/// Reads a matrix file set written by [`write_matrix`].
///
/// A missing uncertainty or transpose file is a valid "absent" outcome; a
/// zero-length normalization array means the matrix was never normalized.
pub fn read_matrix(dir: &Path, base: &str) -> Result<SparseMatrix, MatrixError> {
    let size_path = file_path(dir, base, SIZE_SUFFIX);
    let mut reader = open_reader(&size_path)?;
    let n_rows = reader.read_i64::<BigEndian>()?;
    let n_cols = reader.read_i64::<BigEndian>()?;
    let entries = reader.read_i64::<BigEndian>()?;
    let _observations = reader.read_i64::<BigEndian>()?;
    let _grid_node_cols = reader.read_i64::<BigEndian>()?;
    let entry_count = u64::try_from(entries)
        .map_err(|_| format_err(&size_path, format!("negative entry count: {entries}")))?;

    let row_sections = read_row_sections(&file_path(dir, base, ROW_SECTIONS_SUFFIX))?;
    let col_sections = read_col_sections(&file_path(dir, base, COL_SECTIONS_SUFFIX))?;
    if row_sections.total_indexes() as i64 != n_rows {
        return Err(format_err(
            &size_path,
            format!(
                "row count {} does not match row sections ({})",
                n_rows,
                row_sections.total_indexes()
            ),
        ));
    }
    if col_sections.total_indexes() as i64 != n_cols {
        return Err(format_err(
            &size_path,
            format!(
                "column count {} does not match column sections ({})",
                n_cols,
                col_sections.total_indexes()
            ),
        ));
    }

    let norm_path = file_path(dir, base, NORM_SUFFIX);
    let mut reader = open_reader(&norm_path)?;
    let norm = read_dense(&mut reader, &norm_path)?;
    let col_norm = if norm.is_empty() { None } else { Some(norm) };

    let rhs_path = file_path(dir, base, RHS_SUFFIX);
    let mut reader = open_reader(&rhs_path)?;
    let rhs = read_dense(&mut reader, &rhs_path)?;
    if rhs.len() as i64 != n_rows {
        return Err(format_err(
            &rhs_path,
            format!("rhs length {} does not match row count {}", rhs.len(), n_rows),
        ));
    }

    let unc_path = file_path(dir, base, UNCERTAINTY_SUFFIX);
    let uncertainty = match File::open(&unc_path) {
        Ok(f) => {
            let mut reader = BufReader::new(f);
            Some(read_dense(&mut reader, &unc_path)?)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    let mtx_path = file_path(dir, base, MATRIX_SUFFIX);
    let mut reader = open_reader(&mtx_path)?;
    let rows = read_vectors(&mut reader)?;
    if rows.len() as i64 != n_rows {
        return Err(format_err(
            &mtx_path,
            format!("{} rows on disk, size file says {}", rows.len(), n_rows),
        ));
    }

    let trn_path = file_path(dir, base, TRANSPOSE_SUFFIX);
    let transpose = match File::open(&trn_path) {
        Ok(f) => {
            let mut reader = BufReader::new(f);
            Some(read_vectors(&mut reader)?)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e.into()),
    };

    debug!(base, rows = rows.len(), "read matrix file set");
    Ok(SparseMatrix::from_parts(
        rows,
        rhs,
        uncertainty,
        row_sections,
        col_sections,
        entry_count,
        col_norm,
        transpose,
    ))
}
