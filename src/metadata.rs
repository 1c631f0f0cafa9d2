use crate::json_lines::JsonLine;
use crate::PermsetError;
use rustc_hash::FxHashMap;
use serde_json::{Map, Value};
use std::hash::{Hash, Hasher};
use std::io::BufRead;

const ID_KEY: &str = "_id";
const NAME_KEY: &str = "name";

/// Key/value annotations for one named entity (usually a sample).
///
/// Identity is the externally assigned `id` only.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub id: u64,
    pub name: String,
    pub params: Map<String, Value>,
}

impl PartialEq for Metadata {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Metadata {}

impl Hash for Metadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Metadata {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            params: Map::new(),
        }
    }

    pub fn with_params(id: u64, name: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            id,
            name: name.into(),
            params,
        }
    }

    /// Build from a flat object carrying `_id` and `name` next to the params
    pub fn from_map(mut map: Map<String, Value>) -> Result<Self, PermsetError> {
        let id = map.remove(ID_KEY).and_then(|v| v.as_u64()).ok_or_else(|| {
            PermsetError::Parse(format!("metadata record needs an integer '{}'", ID_KEY))
        })?;
        let name = match map.remove(NAME_KEY) {
            Some(Value::String(s)) => s,
            _ => {
                return Err(PermsetError::Parse(format!(
                    "metadata record {} needs a string '{}'",
                    id, NAME_KEY
                )));
            }
        };
        Ok(Self { id, name, params: map })
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.params.clone();
        map.insert(ID_KEY.to_string(), Value::from(self.id));
        map.insert(NAME_KEY.to_string(), Value::from(self.name.clone()));
        map
    }

    /// Parse a tab-delimited metadata table and join it against `names`.
    ///
    /// The header row names the columns (the first is ignored) and the first
    /// column of each row is the entity name. One record is produced per entry
    /// of `names`, in order, taking ids from `ids`.
    pub fn parse_tsv<R, S, I>(reader: R, names: &[S], ids: I) -> Result<Vec<Metadata>, PermsetError>
    where
        R: BufRead,
        S: AsRef<str>,
        I: IntoIterator<Item = u64>,
    {
        let mut lines = reader.lines();
        let header = lines
            .next()
            .ok_or_else(|| PermsetError::parse_at(1, "missing metadata header row"))??;
        let header_fields: Vec<String> =
            header.trim().split('\t').skip(1).map(str::to_string).collect();

        let mut rows: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for line in lines {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split('\t').map(str::to_string);
            if let Some(name) = fields.next() {
                rows.insert(name, fields.collect());
            }
        }

        let mut ids = ids.into_iter();
        let mut records = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let Some(fields) = rows.get(name) else {
                tracing::error!(name, "name not found in metadata");
                return Err(PermsetError::MissingKey(format!(
                    "name '{}' not found in metadata",
                    name
                )));
            };
            let id = ids.next().ok_or_else(|| {
                PermsetError::InvalidArgument("ran out of metadata ids".to_string())
            })?;
            let params = header_fields
                .iter()
                .zip(fields)
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect();
            records.push(Metadata::with_params(id, name, params));
        }
        Ok(records)
    }
}

impl JsonLine for Metadata {
    fn to_json(&self) -> Result<String, PermsetError> {
        Ok(serde_json::to_string(&self.to_map())?)
    }

    fn from_json(line: &str) -> Result<Self, PermsetError> {
        let value: Value = serde_json::from_str(line)?;
        match value {
            Value::Object(map) => Metadata::from_map(map),
            _ => Err(PermsetError::Parse("metadata record must be a JSON object".to_string())),
        }
    }
}

/// Lower-case a free-text label and reduce it to `[a-z0-9_]`-style words
/// joined by single underscores.
pub fn computerize_name(s: &str) -> String {
    let lowered = s.trim().to_lowercase().replace('\'', "");
    let mut out = String::with_capacity(lowered.len());
    let mut in_gap = false;
    for c in lowered.chars() {
        if c.is_alphanumeric() || c == '_' {
            out.push(c);
            in_gap = false;
        } else if !in_gap {
            out.push('_');
            in_gap = true;
        }
    }
    out.trim_matches('_').to_string()
}
