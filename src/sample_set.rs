use crate::json_lines::JsonLine;
use crate::PermsetError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dense-array value for samples with no membership information
pub const MISSING_VALUE: i8 = -1;

/// Named binary membership over a sample universe.
///
/// Only samples with a known value are stored and every stored value is 0
/// or 1; anything else is rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SampleSetRecord", into = "SampleSetRecord")]
pub struct SampleSet {
    pub name: String,
    pub desc: String,
    values: BTreeMap<String, i8>,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct SampleSetRecord {
    name: String,
    desc: String,
    values: Vec<(String, i64)>,
}

impl TryFrom<SampleSetRecord> for SampleSet {
    type Error = PermsetError;

    fn try_from(record: SampleSetRecord) -> Result<Self, Self::Error> {
        SampleSet::new(record.name, record.desc, record.values)
    }
}

impl From<SampleSet> for SampleSetRecord {
    fn from(set: SampleSet) -> Self {
        SampleSetRecord {
            name: set.name,
            desc: set.desc,
            values: set
                .values
                .into_iter()
                .map(|(sample, v)| (sample, i64::from(v)))
                .collect(),
        }
    }
}

fn membership_value(value: i64) -> Option<i8> {
    match value {
        0 => Some(0),
        1 => Some(1),
        _ => None,
    }
}

impl SampleSet {
    pub fn new<I, S>(
        name: impl Into<String>,
        desc: impl Into<String>,
        values: I,
    ) -> Result<Self, PermsetError>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        let mut set = Self::empty(name, desc);
        for (sample, value) in values {
            set.insert(sample.into(), value)?;
        }
        Ok(set)
    }

    pub fn empty(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
            values: BTreeMap::new(),
        }
    }

    fn insert(&mut self, sample: String, value: i64) -> Result<(), PermsetError> {
        let value = membership_value(value).ok_or_else(|| {
            PermsetError::Invariant(format!(
                "sample set '{}': sample '{}' has membership value {} (must be 0 or 1)",
                self.name, sample, value
            ))
        })?;
        self.values.insert(sample, value);
        Ok(())
    }

    /// Number of samples with a known membership value
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, sample: &str) -> Option<i8> {
        self.values.get(sample).copied()
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, i8)> {
        self.values.iter().map(|(s, v)| (s.as_str(), *v))
    }

    /// Samples in the set (value 1)
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter(|(_, v)| **v == 1)
            .map(|(s, _)| s.as_str())
    }

    /// Dense membership over an ordered sample list, `MISSING_VALUE` where unknown
    pub fn get_array<S: AsRef<str>>(&self, samples: &[S]) -> Vec<i8> {
        samples
            .iter()
            .map(|s| self.get(s.as_ref()).unwrap_or(MISSING_VALUE))
            .collect()
    }

    pub fn parse_json_file(path: &Path) -> Result<Vec<SampleSet>, PermsetError> {
        crate::json_lines::read_json_lines_file(path)
    }

    pub fn parse_smx_file(path: &Path) -> Result<Vec<SampleSet>, PermsetError> {
        Self::parse_smx(BufReader::new(File::open(path)?))
    }

    pub fn parse_smt_file(path: &Path) -> Result<Vec<SampleSet>, PermsetError> {
        Self::parse_smt(BufReader::new(File::open(path)?))
    }

    /// Parse the column layout: one column per sample set, one row per sample.
    ///
    /// The first two rows carry set names and descriptions after a leading
    /// label cell.
    pub fn parse_smx<R: BufRead>(reader: R) -> Result<Vec<SampleSet>, PermsetError> {
        let mut lines = reader.lines();
        let names = header_line(lines.next(), 1, "sample set names")?;
        let descs = header_line(lines.next(), 2, "sample set descriptions")?;
        let names = &names[1.min(names.len())..];
        let descs = &descs[1.min(descs.len())..];
        if names.len() != descs.len() {
            return Err(PermsetError::Parse(format!(
                "number of fields differ in rows 1 and 2 of sample set file ({} names, {} descriptions)",
                names.len(),
                descs.len()
            )));
        }
        let mut sets: Vec<SampleSet> = names
            .iter()
            .zip(descs)
            .map(|(n, d)| SampleSet::empty(n.as_str(), d.as_str()))
            .collect();

        for (i, line) in lines.enumerate() {
            let lineno = i + 3;
            let line = line?;
            let line = trim_eol(&line);
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let sample = fields.next().unwrap_or_default();
            for (col, cell) in fields.enumerate() {
                let Some(value) = parse_cell(cell, lineno)? else {
                    continue;
                };
                let set = sets.get_mut(col).ok_or_else(|| {
                    PermsetError::parse_at(
                        lineno,
                        format!(
                            "sample '{}' has more values than sample sets ({})",
                            sample,
                            names.len()
                        ),
                    )
                })?;
                set.insert(sample.to_string(), value)?;
            }
        }
        Ok(sets)
    }

    /// Parse the row layout: one row per sample set (`name`, `desc`, values),
    /// with sample names in the header row from the third column on.
    pub fn parse_smt<R: BufRead>(reader: R) -> Result<Vec<SampleSet>, PermsetError> {
        let mut lines = reader.lines();
        let samples = header_line(lines.next(), 1, "sample names")?;
        let mut sets = Vec::new();
        for (i, line) in lines.enumerate() {
            let lineno = i + 2;
            let line = line?;
            let line = trim_eol(&line);
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return Err(PermsetError::parse_at(
                    lineno,
                    "sample set row needs a name and a description",
                ));
            }
            if fields.len() > samples.len() {
                return Err(PermsetError::parse_at(
                    lineno,
                    format!(
                        "row has {} fields but header has {}",
                        fields.len(),
                        samples.len()
                    ),
                ));
            }
            let mut set = SampleSet::empty(fields[0], fields[1]);
            for (col, cell) in fields.iter().enumerate().skip(2) {
                if let Some(value) = parse_cell(cell, lineno)? {
                    set.insert(samples[col].clone(), value)?;
                }
            }
            sets.push(set);
        }
        Ok(sets)
    }
}

impl JsonLine for SampleSet {
    fn to_json(&self) -> Result<String, PermsetError> {
        Ok(serde_json::to_string(self)?)
    }

    fn from_json(line: &str) -> Result<Self, PermsetError> {
        Ok(serde_json::from_str(line)?)
    }
}

fn trim_eol(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

fn header_line(
    line: Option<std::io::Result<String>>,
    lineno: usize,
    what: &str,
) -> Result<Vec<String>, PermsetError> {
    let line = line
        .ok_or_else(|| PermsetError::parse_at(lineno, format!("missing header row of {}", what)))??;
    Ok(trim_eol(&line).split('\t').map(str::to_string).collect())
}

/// A membership cell: empty and -1 mean excluded, 0 and 1 are stored
fn parse_cell(cell: &str, lineno: usize) -> Result<Option<i64>, PermsetError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    let value: i64 = cell.parse().map_err(|_| {
        PermsetError::parse_at(lineno, format!("invalid membership value '{}'", cell))
    })?;
    match value {
        -1 => Ok(None),
        0 | 1 => Ok(Some(value)),
        _ => Err(PermsetError::parse_at(
            lineno,
            format!("membership value {} not in {{-1, 0, 1}}", value),
        )),
    }
}
