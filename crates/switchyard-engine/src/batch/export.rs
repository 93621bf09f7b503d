//! Batch result export.

use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use super::job::{BatchJob, BatchResult};
use crate::error::EngineError;
use crate::fsutil::atomic_write;

const CSV_HEADER: &str =
    "index,prompt,response,success,input_tokens,output_tokens,duration_ms,error_message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Json,
    Csv,
}

impl ResultFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ResultFormat::Json => "json",
            ResultFormat::Csv => "csv",
        }
    }
}

impl FromStr for ResultFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ResultFormat::Json),
            "csv" => Ok(ResultFormat::Csv),
            other => Err(format!("unknown result format '{other}' (expected json or csv)")),
        }
    }
}

#[derive(Serialize)]
struct JsonExport<'a> {
    job: &'a BatchJob,
    results: &'a [BatchResult],
}

/// Render results in `format`.
pub fn render_results(
    job: &BatchJob,
    results: &[BatchResult],
    format: ResultFormat,
) -> Result<String, EngineError> {
    match format {
        ResultFormat::Json => Ok(serde_json::to_string_pretty(&JsonExport { job, results })?),
        ResultFormat::Csv => Ok(render_csv(results)),
    }
}

/// Write results to `path`.
pub fn export_results(
    job: &BatchJob,
    results: &[BatchResult],
    path: &Path,
    format: ResultFormat,
) -> Result<(), EngineError> {
    let body = render_results(job, results, format)?;
    atomic_write(path, body.as_bytes())?;
    tracing::info!(job = %job.job_id, path = %path.display(), "exported batch results");
    Ok(())
}

fn render_csv(results: &[BatchResult]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for r in results {
        let row = [
            r.index.to_string(),
            csv_field(&r.prompt),
            csv_field(&r.response_text),
            r.success.to_string(),
            r.input_tokens.to_string(),
            r.output_tokens.to_string(),
            r.duration_ms.to_string(),
            csv_field(r.error_message.as_deref().unwrap_or("")),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (BatchJob, Vec<BatchResult>) {
        let job = BatchJob::new("phi4-14b", vec!["a, b".into(), "say \"hi\"".into()]);
        let results = vec![
            BatchResult {
                index: 0,
                prompt: "a, b".into(),
                response_text: "line one\nline two".into(),
                input_tokens: 3,
                output_tokens: 4,
                duration_ms: 50,
                success: true,
                error_message: None,
                extra: Default::default(),
            },
            BatchResult {
                index: 1,
                prompt: "say \"hi\"".into(),
                response_text: String::new(),
                input_tokens: 0,
                output_tokens: 0,
                duration_ms: 7,
                success: false,
                error_message: Some("backend: exit 1".into()),
                extra: Default::default(),
            },
        ];
        (job, results)
    }

    #[test]
    fn test_csv_quoting() {
        let (job, results) = sample();
        let csv = render_results(&job, &results, ResultFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert!(csv.contains("0,\"a, b\",\"line one\nline two\",true,3,4,50,\n"));
        assert!(csv.contains("1,\"say \"\"hi\"\"\",,false,0,0,7,backend: exit 1\n"));
    }

    #[test]
    fn test_json_export_to_file() {
        let (job, results) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        export_results(&job, &results, &path, ResultFormat::Json).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["job"]["model_id"], "phi4-14b");
        assert_eq!(value["results"].as_array().unwrap().len(), 2);
    }
}
