use serde_json::Value;
use spinner_core::render_value;
use spinner_summary_model::{ResultTable, RunArtifact};
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::Table;

/// Build a printable table of the recorded results, one line per row.
pub fn results_table(results: &ResultTable) -> Table {
    let mut builder = Builder::default();
    builder.push_record(results.columns().iter().cloned());
    for row in results.rows() {
        builder.push_record(row.iter().map(format_cell));
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .map_or_else(|| n.to_string(), |f| format!("{f:.4}")),
        Value::String(s) => s.trim_end().to_string(),
        other => render_value(other),
    }
}

/// Print the run metadata followed by the results.
pub fn print_artifact(artifact: &RunArtifact) {
    let metadata = &artifact.metadata;
    println!("Run {} on {}", metadata.run_id, metadata.hostname);
    println!(
        "Started {}, finished {}",
        metadata.start_timestamp,
        metadata.end_timestamp.as_deref().unwrap_or("-")
    );
    println!("Spinner {} (fingerprint {})", metadata.spinner_version, metadata.fingerprint);
    for (key, value) in &metadata.extra {
        println!("{key} = {}", render_value(value));
    }

    if artifact.dataframe.is_empty() {
        println!("\nNo results were recorded");
    } else {
        println!("\n{}", results_table(&artifact.dataframe));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_every_column_and_row() {
        let mut results = ResultTable::new(vec![
            "name".to_string(),
            "size".to_string(),
            "out".to_string(),
            "time".to_string(),
        ]);
        let rows = [
            json!({"name": "echo", "size": 2, "out": "hello\n", "time": 0.123456}),
            json!({"name": "echo", "size": [1, 2], "time": 1.0}),
        ];
        for row in &rows {
            results.append(row.as_object().unwrap()).unwrap();
        }

        let text = results_table(&results).to_string();
        assert!(text.contains("name"));
        assert!(text.contains("hello"));
        assert!(text.contains("0.1235"));
        assert!(text.contains("[1,2]"));
        assert_eq!(text.lines().filter(|line| line.contains("echo")).count(), 2);
    }
}
