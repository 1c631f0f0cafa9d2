use crate::PermsetError;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// An entity stored one JSON object per line
pub trait JsonLine: Sized {
    fn to_json(&self) -> Result<String, PermsetError>;
    fn from_json(line: &str) -> Result<Self, PermsetError>;
}

/// Read every non-blank line of a reader as one entity
pub fn read_json_lines<T: JsonLine, R: BufRead>(reader: R) -> Result<Vec<T>, PermsetError> {
    let mut items = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        items.push(T::from_json(line)?);
    }
    Ok(items)
}

pub fn read_json_lines_file<T: JsonLine>(path: &Path) -> Result<Vec<T>, PermsetError> {
    let file = File::open(path)?;
    read_json_lines(BufReader::new(file))
}

pub fn write_json_lines<'a, T, W, I>(writer: W, items: I) -> Result<(), PermsetError>
where
    T: JsonLine + 'a,
    W: Write,
    I: IntoIterator<Item = &'a T>,
{
    let mut writer = BufWriter::new(writer);
    for item in items {
        writer.write_all(item.to_json()?.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json_lines_file<'a, T, I>(path: &Path, items: I) -> Result<(), PermsetError>
where
    T: JsonLine + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let file = File::create(path)?;
    write_json_lines(file, items)
}
