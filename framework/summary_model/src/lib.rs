use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha3::Digest;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

/// A row was appended with fields that the table has no column for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Result row has fields that are not table columns: {}", unknown_columns.join(", "))]
pub struct SchemaDriftError {
    pub unknown_columns: Vec<String>,
}

/// Append-only table of results, one row per successful run.
///
/// The columns are fixed when the table is created. Each row is stored aligned to the columns,
/// with `null` for any column the row did not set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. Every key of `row` must be a column of this table.
    pub fn append(&mut self, row: &Map<String, Value>) -> Result<(), SchemaDriftError> {
        let unknown_columns = row
            .keys()
            .filter(|key| !self.columns.contains(key))
            .cloned()
            .collect::<Vec<_>>();
        if !unknown_columns.is_empty() {
            return Err(SchemaDriftError { unknown_columns });
        }

        self.rows.push(
            self.columns
                .iter()
                .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                .collect(),
        );
        Ok(())
    }

    /// Look up a single cell.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(index)
    }

    /// All values of one column, in row order.
    pub fn column(&self, column: &str) -> Option<impl Iterator<Item = &Value>> {
        let index = self.columns.iter().position(|c| c == column)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }

    /// Wrap the accumulated rows into a run artifact.
    pub fn finalize(self, config: Value, metadata: RunMetadata) -> RunArtifact {
        RunArtifact {
            config,
            metadata,
            dataframe: self,
        }
    }
}

/// Metadata about a single invocation of the runner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The host the benchmarks ran on
    pub hostname: String,
    /// When the run started, as an RFC 3339 timestamp
    pub start_timestamp: String,
    /// When the run finished, as an RFC 3339 timestamp
    ///
    /// Not set until the run completes.
    pub end_timestamp: Option<String>,
    /// Environment variables captured before the first benchmark
    ///
    /// Which variables are captured is decided by the `envvars` setting of the configuration.
    pub start_env: BTreeMap<String, String>,
    /// Environment variables captured after the last benchmark
    pub end_env: BTreeMap<String, String>,
    /// The version of Spinner that produced the artifact
    pub spinner_version: String,
    /// See [RunMetadata::fingerprint]
    pub fingerprint: String,
    /// Extra parameters supplied when the run was started
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RunMetadata {
    /// The serialized field names. Extra parameters share the same map, so they cannot use these.
    pub const FIELDS: [&'static str; 8] = [
        "run_id",
        "hostname",
        "start_timestamp",
        "end_timestamp",
        "start_env",
        "end_env",
        "spinner_version",
        "fingerprint",
    ];

    /// Create metadata for a run that is just starting
    pub fn new(
        run_id: String,
        hostname: String,
        start_timestamp: String,
        spinner_version: String,
        config: &Value,
        extra: Map<String, Value>,
    ) -> Self {
        let fingerprint = Self::fingerprint(config, &extra, &spinner_version);
        Self {
            run_id,
            hostname,
            start_timestamp,
            end_timestamp: None,
            start_env: BTreeMap::new(),
            end_env: BTreeMap::new(),
            spinner_version,
            fingerprint,
            extra,
        }
    }

    /// Record the end of the run
    pub fn finish(&mut self, end_timestamp: String, end_env: BTreeMap<String, String>) {
        self.end_timestamp = Some(end_timestamp);
        self.end_env = end_env;
    }

    /// Compute a fingerprint for a run
    ///
    /// The fingerprint identifies the setup that produced a result, so runs with matching
    /// fingerprints can be compared. It uses the
    ///     - Configuration document
    ///     - Extra parameters, sorted by name
    ///     - Spinner version
    ///
    /// The fingerprint is computed using [sha3::Sha3_256].
    pub fn fingerprint(config: &Value, extra: &Map<String, Value>, spinner_version: &str) -> String {
        let mut hasher = sha3::Sha3_256::new();
        Digest::update(&mut hasher, config.to_string().as_bytes());
        extra
            .iter()
            .sorted_by_key(|(k, _)| k.to_owned())
            .for_each(|(k, v)| {
                Digest::update(&mut hasher, k.as_bytes());
                Digest::update(&mut hasher, v.to_string().as_bytes());
            });
        Digest::update(&mut hasher, spinner_version.as_bytes());

        format!("{:x}", hasher.finalize())
    }
}

/// Everything a run produced, in one self-contained object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunArtifact {
    /// The configuration document the run was started with
    pub config: Value,
    pub metadata: RunMetadata,
    pub dataframe: ResultTable,
}

/// Serialize the run artifact to a writer
///
/// The artifact is encoded as MessagePack with field names, so it can be read without this crate.
pub fn store_run_artifact<W: Write>(artifact: &RunArtifact, writer: &mut W) -> anyhow::Result<()> {
    rmp_serde::encode::write_named(writer, artifact)?;
    Ok(())
}

/// Load a run artifact from a reader
pub fn load_run_artifact<R: Read>(reader: R) -> anyhow::Result<RunArtifact> {
    let reader = std::io::BufReader::new(reader);
    let artifact: RunArtifact = rmp_serde::from_read(reader)?;
    Ok(artifact)
}

/// Load a run artifact from a file
pub fn load_run_artifact_file(path: impl AsRef<Path>) -> anyhow::Result<RunArtifact> {
    let file = std::fs::File::open(path)?;
    load_run_artifact(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rows_are_aligned_to_columns() {
        let mut table = ResultTable::new(columns(&["name", "size", "out", "time"]));
        table
            .append(&row(json!({"name": "a", "time": 0.5, "size": 3})))
            .unwrap();
        table
            .append(&row(json!({"out": "x", "name": "b", "size": 4, "time": 1.0})))
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0], vec![json!("a"), json!(3), Value::Null, json!(0.5)]);
        assert_eq!(table.get(1, "out"), Some(&json!("x")));
        assert_eq!(
            table.column("name").unwrap().collect::<Vec<_>>(),
            vec![&json!("a"), &json!("b")]
        );
        assert!(table.column("missing").is_none());
    }

    #[test]
    fn schema_drift_is_rejected() {
        let mut table = ResultTable::new(columns(&["name", "time"]));
        let err = table
            .append(&row(json!({"name": "a", "size": 1, "extra": 2, "time": 0.1})))
            .unwrap_err();
        assert_eq!(err.unknown_columns, columns(&["size", "extra"]));
        assert!(table.is_empty());
    }

    #[test]
    fn fingerprint_ignores_extra_order() {
        let config = json!({"metadata": {"runs": 1}});
        let a = row(json!({"hosts": "A,B", "size": [1, 2]}));
        let b = row(json!({"size": [1, 2], "hosts": "A,B"}));
        assert_eq!(
            RunMetadata::fingerprint(&config, &a, "0.1.0"),
            RunMetadata::fingerprint(&config, &b, "0.1.0")
        );
        assert_ne!(
            RunMetadata::fingerprint(&config, &a, "0.1.0"),
            RunMetadata::fingerprint(&config, &a, "0.2.0")
        );
    }

    #[test]
    fn artifact_survives_storage() {
        let config = json!({"metadata": {"description": "d", "runs": 1}});
        let mut metadata = RunMetadata::new(
            "run-1".to_string(),
            "host".to_string(),
            "2024-01-01T00:00:00+00:00".to_string(),
            "0.1.0".to_string(),
            &config,
            row(json!({"hosts": "A,B"})),
        );
        metadata.start_env.insert("HOME".to_string(), "/root".to_string());
        metadata.finish("2024-01-01T00:01:00+00:00".to_string(), BTreeMap::new());

        let mut table = ResultTable::new(columns(&["name", "raw_output", "time"]));
        table
            .append(&row(json!({"name": "echo", "raw_output": "hello\n\n", "time": 0.01})))
            .unwrap();
        let artifact = table.finalize(config, metadata);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench_metadata.msgpack");
        let mut file = std::fs::File::create(&path).unwrap();
        store_run_artifact(&artifact, &mut file).unwrap();
        drop(file);

        let loaded = load_run_artifact_file(&path).unwrap();
        assert_eq!(loaded, artifact);
        assert_eq!(loaded.metadata.extra.get("hosts"), Some(&json!("A,B")));
    }

    #[test]
    fn extra_parameters_sit_beside_metadata_fields() {
        let metadata = RunMetadata::new(
            "id".to_string(),
            "host".to_string(),
            "start".to_string(),
            "0.1.0".to_string(),
            &Value::Null,
            row(json!({"hosts": "A"})),
        );
        let encoded = serde_json::to_value(&metadata).unwrap();
        assert_eq!(encoded["hosts"], json!("A"));
        assert_eq!(encoded["hostname"], json!("host"));
    }

    #[test]
    fn field_names_match_serialized_fields() {
        let metadata = RunMetadata::new(
            "id".to_string(),
            "host".to_string(),
            "start".to_string(),
            "0.1.0".to_string(),
            &Value::Null,
            Map::new(),
        );
        let encoded = serde_json::to_value(&metadata).unwrap();
        let mut keys = encoded.as_object().unwrap().keys().cloned().collect::<Vec<_>>();
        keys.sort();
        let mut fields = RunMetadata::FIELDS.map(String::from).to_vec();
        fields.sort();
        assert_eq!(keys, fields);
    }
}
