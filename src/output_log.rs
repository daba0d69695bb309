//! # Output Log (C2)
//!
//! Append-only, line-delimited JSON serialization of request outcomes.
//! Many concurrent call tasks may append at once; a single async mutex
//! around the open file guarantees no two writes interleave within a line,
//! which is all `spec.md` §4.2 requires (a per-file lock, rather than a
//! dedicated serializer task).

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct OutputLog {
    file: Arc<Mutex<File>>,
}

impl OutputLog {
    pub async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Append a success outcome: `[request_payload, response_body]`, or the
    /// 3-element form with `metadata` appended when present.
    pub async fn append_success(
        &self,
        payload: &Value,
        response_body: &Value,
        metadata: Option<&Value>,
    ) -> std::io::Result<()> {
        let record = match metadata {
            Some(metadata) => serde_json::json!([payload, response_body, metadata]),
            None => serde_json::json!([payload, response_body]),
        };
        self.append_line(&record).await
    }

    /// Append a terminal failure outcome: `[request_payload, [error, ...]]`,
    /// or the 3-element form with `metadata` appended when present.
    pub async fn append_failure(
        &self,
        payload: &Value,
        errors: &[String],
        metadata: Option<&Value>,
    ) -> std::io::Result<()> {
        let record = match metadata {
            Some(metadata) => serde_json::json!([payload, errors, metadata]),
            None => serde_json::json!([payload, errors]),
        };
        self.append_line(&record).await
    }

    async fn append_line(&self, record: &Value) -> std::io::Result<()> {
        let mut line = serde_json::to_string(record).expect("Value serialization cannot fail");
        line.push('\n');
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, BufReader};

    async fn read_lines(path: &Path) -> Vec<Value> {
        let file = File::open(path).await.unwrap();
        let mut lines = BufReader::new(file).lines();
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(serde_json::from_str(&line).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn success_without_metadata_is_two_elements() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let log = OutputLog::create(tmp.path()).await.unwrap();
        log.append_success(&json!({"a": 1}), &json!({"ok": true}), None)
            .await
            .unwrap();
        let lines = read_lines(tmp.path()).await;
        assert_eq!(lines[0], json!([{"a": 1}, {"ok": true}]));
    }

    #[tokio::test]
    async fn success_with_metadata_is_three_elements() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let log = OutputLog::create(tmp.path()).await.unwrap();
        log.append_success(&json!({"a": 1}), &json!({"ok": true}), Some(&json!({"tag": "x"})))
            .await
            .unwrap();
        let lines = read_lines(tmp.path()).await;
        assert_eq!(lines[0], json!([{"a": 1}, {"ok": true}, {"tag": "x"}]));
    }

    #[tokio::test]
    async fn failure_carries_error_strings() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let log = OutputLog::create(tmp.path()).await.unwrap();
        log.append_failure(&json!({"a": 1}), &["boom".to_string()], None)
            .await
            .unwrap();
        let lines = read_lines(tmp.path()).await;
        assert_eq!(lines[0], json!([{"a": 1}, ["boom"]]));
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_interleave() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let log = OutputLog::create(tmp.path()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append_success(&json!({"i": i}), &json!({"ok": true}), None)
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let lines = read_lines(tmp.path()).await;
        assert_eq!(lines.len(), 50);
    }
}
