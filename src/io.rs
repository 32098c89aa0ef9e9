//! Reading and writing patterns as two whitespace separated text columns.
//!
//! Lines starting with `#` are comments. Two file variants get special treatment:
//! - `.chi`: the first 4 lines are a header
//! - `.fxye`: everything up to and including the first line containing `BANK` is a header,
//!   and x is stored in centidegrees unless that line contains `CONQ`

use crate::error::{PatternError, Result};
use crate::pattern::{Pattern, PatternData};
use ndarray::Array1;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const CHI_HEADER_LINES: usize = 4;

/// Parses two numeric columns, skipping the first `skip_lines` lines and `#` comments.
///
/// Extra columns are ignored. `x_factor` is applied to every x value.
pub fn read_columns(
    text: &str,
    source_name: &str,
    skip_lines: usize,
    x_factor: f64,
) -> Result<PatternData> {
    let mut x = vec![];
    let mut y = vec![];
    for (line_number, line) in text.lines().enumerate().skip(skip_lines) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut columns = line.split_whitespace();
        let (Some(first), Some(second)) = (columns.next(), columns.next()) else {
            return Err(PatternError::malformed(
                source_name,
                format!("line {} has fewer than two columns", line_number + 1),
            ));
        };
        let parse = |value: &str| {
            value.parse::<f64>().map_err(|err| {
                PatternError::malformed(
                    source_name,
                    format!("line {}: {value:?} is not a number ({err})", line_number + 1),
                )
            })
        };
        x.push(parse(first)? * x_factor);
        y.push(parse(second)?);
    }
    if x.is_empty() {
        return Err(PatternError::malformed(source_name, "no data rows"));
    }
    PatternData::new(Array1::from(x), Array1::from(y))
}

/// Number of header lines and x factor of a `.fxye` file.
fn fxye_layout(text: &str, source_name: &str) -> Result<(usize, f64)> {
    let (index, line) = text
        .lines()
        .enumerate()
        .find(|(_, line)| line.contains("BANK"))
        .ok_or_else(|| PatternError::malformed(source_name, "no BANK line"))?;
    let factor = if line.contains("CONQ") { 1.0 } else { 0.01 };
    Ok((index + 1, factor))
}

/// Pattern name for a file: the file name up to its first dot.
fn pattern_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| name.split('.').next().map(str::to_string))
        .unwrap_or_default()
}

/// Reads a pattern file and returns its data together with the pattern name.
pub fn read_pattern_file(path: &Path) -> Result<(PatternData, String)> {
    let text = std::fs::read_to_string(path)?;
    let source_name = path.display().to_string();
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let data = match extension.as_str() {
        "chi" => read_columns(&text, &source_name, CHI_HEADER_LINES, 1.0)?,
        "fxye" => {
            let (skip, factor) = fxye_layout(&text, &source_name)?;
            read_columns(&text, &source_name, skip, factor)?
        }
        _ => read_columns(&text, &source_name, 0, 1.0)?,
    };
    log::info!("read {} samples from {}", data.len(), source_name);
    Ok((data, pattern_name(path)))
}

/// Loads a pattern file into a new pattern.
pub fn load_pattern(path: &Path) -> Result<Pattern> {
    let (data, name) = read_pattern_file(path)?;
    let mut pattern = Pattern::new(data, &name);
    pattern.filename = path.to_path_buf();
    Ok(pattern)
}

/// Formats like C's `%.18e`: 18 digits after the point, signed two-digit exponent.
fn format_scientific(value: f64) -> String {
    let formatted = format!("{value:.18e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exponent) => {
                let sign = if exponent < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exponent.abs())
            }
            Err(_) => formatted,
        },
        // inf and NaN have no exponent
        None => formatted,
    }
}

/// Writes `data` as `x y` rows, preceded by `header` with every line prefixed by `# `.
pub fn write_columns(data: &PatternData, path: &Path, header: &str) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    if !header.is_empty() {
        for line in header.lines() {
            writeln!(writer, "# {line}")?;
        }
    }
    for (x, y) in data.x.iter().zip(data.y.iter()) {
        writeln!(writer, "{} {}", format_scientific(*x), format_scientific(*y))?;
    }
    writer.flush()?;
    Ok(())
}

/// Saves the original data of `pattern`.
pub fn save_pattern(pattern: &Pattern, path: &Path, header: &str) -> Result<()> {
    write_columns(pattern.original_data(), path, header)?;
    log::info!("saved pattern {} to {}", pattern.name, path.display());
    Ok(())
}
