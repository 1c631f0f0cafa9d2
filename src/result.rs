use crate::histogram::NullHistogram;
use crate::json_lines::JsonLine;
use crate::PermsetError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// One column value as handed to the tabular storage layer
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Real(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(v: Option<i64>) -> Self {
        v.map_or(FieldValue::Null, FieldValue::Integer)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(v: Option<String>) -> Self {
        v.map_or(FieldValue::Null, FieldValue::Text)
    }
}

fn mismatch(expected: &str, got: &FieldValue) -> PermsetError {
    PermsetError::Parse(format!("expected {} column, got {:?}", expected, got))
}

impl TryFrom<FieldValue> for f64 {
    type Error = PermsetError;

    fn try_from(v: FieldValue) -> Result<Self, Self::Error> {
        match v {
            FieldValue::Real(x) => Ok(x),
            FieldValue::Integer(x) => Ok(x as f64),
            other => Err(mismatch("real", &other)),
        }
    }
}

impl TryFrom<FieldValue> for i64 {
    type Error = PermsetError;

    fn try_from(v: FieldValue) -> Result<Self, Self::Error> {
        match v {
            FieldValue::Integer(x) => Ok(x),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl TryFrom<FieldValue> for Option<i64> {
    type Error = PermsetError;

    fn try_from(v: FieldValue) -> Result<Self, Self::Error> {
        match v {
            FieldValue::Null => Ok(None),
            FieldValue::Integer(x) => Ok(Some(x)),
            other => Err(mismatch("nullable integer", &other)),
        }
    }
}

impl TryFrom<FieldValue> for Option<String> {
    type Error = PermsetError;

    fn try_from(v: FieldValue) -> Result<Self, Self::Error> {
        match v {
            FieldValue::Null => Ok(None),
            FieldValue::Text(s) => Ok(Some(s)),
            other => Err(mismatch("nullable text", &other)),
        }
    }
}

/// JSON form of real columns. Non-finite values are written as the strings
/// `"inf"`, `"-inf"` and `"nan"`, since JSON numbers cannot carry them.
mod real {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(x) => Ok(x),
            // also takes "Infinity" and "NaN"
            Repr::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|x| !x.is_finite())
                .ok_or_else(|| serde::de::Error::custom(format!("invalid real value '{}'", s))),
        }
    }
}

/// Column declaration: name, storage type, construction default
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub storage: &'static str,
    pub default: FieldValue,
}

// Field order here is the order of the struct, the JSON object, the table
// columns and the value tuple.
macro_rules! result_record {
    ($($(#[$attr:meta])* $field:ident : $ty:ty = $default:expr => $storage:literal),+ $(,)?) => {
        /// Outcome of one sample set under one permutation run
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields, default)]
        pub struct ResultRecord {
            $($(#[$attr])* pub $field: $ty,)+
        }

        impl Default for ResultRecord {
            fn default() -> Self {
                Self { $($field: $default,)+ }
            }
        }

        impl ResultRecord {
            /// Ordered column declarations
            pub fn schema() -> Vec<FieldSpec> {
                vec![$(FieldSpec {
                    name: stringify!($field),
                    storage: $storage,
                    default: FieldValue::from({
                        let v: $ty = $default;
                        v
                    }),
                },)+]
            }

            /// Column values in schema order
            pub fn values(&self) -> Vec<FieldValue> {
                vec![$(FieldValue::from(self.$field.clone()),)+]
            }

            /// Inverse of [`ResultRecord::values`]
            pub fn from_values(values: Vec<FieldValue>) -> Result<Self, PermsetError> {
                let expected = Self::field_count();
                if values.len() != expected {
                    return Err(PermsetError::Parse(format!(
                        "result row has {} values, expected {}",
                        values.len(),
                        expected
                    )));
                }
                let mut it = values.into_iter();
                Ok(Self {
                    $($field: <$ty>::try_from(it.next().unwrap_or(FieldValue::Null))?,)+
                })
            }
        }
    };
}

result_record! {
    t_id: Option<String> = None => "text primary key not null",
    name: Option<String> = None => "text",
    rand_seed: Option<i64> = None => "bigint",
    #[serde(with = "real")]
    es: f64 = 0.0 => "real",
    es_rank: i64 = 0 => "integer",
    #[serde(with = "real")]
    nominal_p_value: f64 = 1.0 => "real",
    #[serde(with = "real")]
    nes: f64 = 0.0 => "real",
    #[serde(with = "real")]
    fold_change: f64 = 0.0 => "real",
    #[serde(with = "real")]
    core_fold_change: f64 = 0.0 => "real",
    core_hits: i64 = 0 => "integer",
    core_misses: i64 = 0 => "integer",
    null_hits: i64 = 0 => "integer",
    null_misses: i64 = 0 => "integer",
    #[serde(with = "real")]
    fisher_p_value: f64 = 1.0 => "real",
    #[serde(with = "real")]
    odds_ratio: f64 = 1.0 => "real",
    #[serde(with = "real")]
    ss_fdr_q_value: f64 = 1.0 => "real",
    ss_rank: i64 = 0 => "integer",
    #[serde(with = "real")]
    ss_frac: f64 = 0.0 => "real",
    #[serde(with = "real")]
    es_min: f64 = 0.0 => "real",
    #[serde(with = "real")]
    es_max: f64 = 0.0 => "real",
    es_rank_min: i64 = 0 => "integer",
    es_rank_max: i64 = 0 => "integer",
    #[serde(with = "real")]
    null_es_mean: f64 = 0.0 => "real",
    #[serde(with = "real")]
    null_es_min: f64 = 0.0 => "real",
    #[serde(with = "real")]
    null_es_max: f64 = 0.0 => "real",
    null_es_rank_min: i64 = 0 => "integer",
    null_es_rank_max: i64 = 0 => "integer",
}

impl ResultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_count() -> usize {
        Self::schema().len()
    }

    /// `create table` statement for a results table
    pub fn create_table_sql(table: &str) -> String {
        let columns = Self::schema()
            .iter()
            .map(|f| format!("{} {}", f.name, f.storage))
            .join(", ");
        format!("create table {} ({})", table, columns)
    }

    /// Parameter placeholder tuple with one `?` per column
    pub fn placeholders() -> String {
        format!("({})", std::iter::repeat_n("?", Self::field_count()).join(","))
    }

    /// Copy the null-distribution summary of an accumulated histogram.
    /// An empty histogram leaves the defaults in place.
    pub fn apply_null_distribution(&mut self, null: &NullHistogram) {
        if let (Some(mean), Some(min), Some(max)) = (null.mean(), null.min(), null.max()) {
            self.null_es_mean = mean;
            self.null_es_min = min;
            self.null_es_max = max;
        }
    }
}

impl JsonLine for ResultRecord {
    fn to_json(&self) -> Result<String, PermsetError> {
        Ok(serde_json::to_string(self)?)
    }

    fn from_json(line: &str) -> Result<Self, PermsetError> {
        Ok(serde_json::from_str(line)?)
    }
}
