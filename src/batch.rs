use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::client::{FinishReason, GenerationService};
use crate::config::GenerationConfig;
use crate::error::GptError;
use crate::model::{ChatMessage, GeneratorModel};
use crate::parser::ThinkingParser;

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub messages: Vec<ChatMessage>,
}
impl BatchInput {
    pub fn prompt(content: impl Into<String>) -> Self {
        Self {
            id: None,
            messages: vec![ChatMessage::user(content)],
        }
    }
}

/// Parsed outcome of one batch input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub index: usize,
    pub id: String,
    pub input: Vec<ChatMessage>,
    pub output: String,
    pub thinking: String,
    pub raw_output: String,
    pub finish_reason: FinishReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub requests: usize,
    pub elapsed_secs: f64,
    pub mean_secs_per_request: f64,
    pub requests_per_sec: f64,
}
impl BatchSummary {
    fn new(requests: usize, elapsed_secs: f64) -> Self {
        let (mean, throughput) = if requests == 0 || elapsed_secs <= 0.0 {
            (0.0, 0.0)
        } else {
            (elapsed_secs / requests as f64, requests as f64 / elapsed_secs)
        };
        Self {
            requests,
            elapsed_secs,
            mean_secs_per_request: mean,
            requests_per_sec: throughput,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub records: Vec<BatchRecord>,
    pub summary: BatchSummary,
}

pub fn load_inputs(path: &Path) -> Result<Vec<BatchInput>, GptError> {
    let reader = std::io::BufReader::new(std::fs::File::open(path)?);
    let inputs: Vec<BatchInput> = serde_json::from_reader(reader)?;
    if inputs.is_empty() {
        return Err(GptError::EmptyBatch(path.display().to_string()));
    }
    Ok(inputs)
}

pub fn save_records(records: &[BatchRecord], path: &Path) -> Result<(), GptError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let writer = std::io::BufWriter::new(std::fs::File::create(path)?);
    serde_json::to_writer_pretty(writer, records)?;
    log::info!("Saved {} batch records to {}", records.len(), path.display());
    Ok(())
}

/// Generate all inputs concurrently with at most `concurrency` requests in
/// flight. Records are returned in input order; the first failing input
/// aborts the remaining requests.
pub async fn run_batch<S>(
    service: Arc<S>,
    model: GeneratorModel,
    inputs: Vec<BatchInput>,
    config: &GenerationConfig,
    concurrency: usize,
) -> Result<BatchOutcome, GptError>
where
    S: GenerationService + Send + Sync + 'static,
{
    let started = Instant::now();
    let total = inputs.len();
    let mode = config.mode();
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));

    log::info!("Running batch of {total} requests (concurrency: {})", concurrency.max(1));

    let mut tasks = JoinSet::new();
    for (index, input) in inputs.into_iter().enumerate() {
        let service = Arc::clone(&service);
        let permits = Arc::clone(&permits);
        let config = config.clone();
        let prompt = model.format_conversation(&input.messages, mode);

        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            let result = service.generate(&prompt, &config).await;
            (index, input, result)
        });
    }

    let parser = ThinkingParser::default();
    let mut slots: Vec<Option<BatchRecord>> = vec![None; total];

    while let Some(joined) = tasks.join_next().await {
        let (index, input, result) = joined?;
        let generated = result.map_err(|source| GptError::BatchItem {
            index,
            source: Box::new(source),
        })?;
        let parsed = parser.parse(&generated.text, mode);
        log::debug!("Batch item {index} finished ({})", generated.finish_reason);

        slots[index] = Some(BatchRecord {
            index,
            id: input.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            input: input.messages,
            output: parsed.answer,
            thinking: parsed.reasoning,
            raw_output: generated.text,
            finish_reason: generated.finish_reason,
        });
    }

    let records: Vec<BatchRecord> = slots.into_iter().flatten().collect();
    let summary = BatchSummary::new(records.len(), started.elapsed().as_secs_f64());

    log::info!(
        "Batch completed in {:.2} seconds ({:.2} seconds per request, {:.2} requests/sec)",
        summary.elapsed_secs,
        summary.mean_secs_per_request,
        summary.requests_per_sec
    );

    Ok(BatchOutcome { records, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::EchoService;
    use crate::parser::ReasoningMode;

    fn inputs() -> Vec<BatchInput> {
        vec![
            BatchInput {
                id: Some("qa_1".to_string()),
                messages: vec![ChatMessage::user("What is machine learning?")],
            },
            BatchInput::prompt("What is a neural network?"),
            BatchInput::prompt("Explain gradient descent."),
        ]
    }

    #[tokio::test]
    async fn records_keep_input_order_and_reasoning_per_mode() {
        let service = Arc::new(EchoService::default());
        let config = GenerationConfig::for_mode(ReasoningMode::ReasoningRequested);

        let outcome = run_batch(service, GeneratorModel::Qwen8b, inputs(), &config, 2)
            .await
            .unwrap();

        assert_eq!(outcome.summary.requests, 3);
        let indices: Vec<_> = outcome.records.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);

        let first = &outcome.records[0];
        assert_eq!(first.id, "qa_1");
        assert_eq!(first.output, "reply");
        assert!(first.thinking.starts_with("prompt has"));
        assert!(first.raw_output.starts_with("<think>"));
        assert_eq!(first.finish_reason, FinishReason::Stop);
        assert_eq!(first.input, vec![ChatMessage::user("What is machine learning?")]);

        // generated ids for inputs without one
        assert!(uuid::Uuid::parse_str(&outcome.records[1].id).is_ok());
    }

    #[tokio::test]
    async fn suppressed_mode_drops_thinking() {
        let service = Arc::new(EchoService::default());
        let config = GenerationConfig::for_mode(ReasoningMode::ReasoningSuppressed);

        let outcome = run_batch(service.clone(), GeneratorModel::Qwen8b, inputs(), &config, 8)
            .await
            .unwrap();

        assert!(outcome.records.iter().all(|r| r.thinking.is_empty() && r.output == "reply"));
        let prompts = service.prompts.lock().unwrap();
        assert!(prompts.iter().all(|p| p.ends_with("<think>\n\n</think>\n\n")));
    }

    #[tokio::test]
    async fn failing_item_reports_index() {
        let service = Arc::new(EchoService {
            fail_on: Some("neural".to_string()),
            ..Default::default()
        });
        let err = run_batch(service, GeneratorModel::Qwen8b, inputs(), &GenerationConfig::default(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, GptError::BatchItem { index: 1, .. }));
    }

    #[test]
    fn records_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let input_path = dir.path().join("inputs.json");
        std::fs::write(
            &input_path,
            r#"[{"id": "qa_1", "messages": [{"role": "user", "content": "什么是机器学习？"}]}]"#,
        )
        .unwrap();
        let loaded = load_inputs(&input_path).unwrap();
        assert_eq!(loaded[0].id.as_deref(), Some("qa_1"));

        let record = BatchRecord {
            index: 0,
            id: "qa_1".to_string(),
            input: loaded[0].messages.clone(),
            output: "答案".to_string(),
            thinking: String::new(),
            raw_output: "<think>\n\n</think>\n\n答案".to_string(),
            finish_reason: FinishReason::Length,
        };
        let output_path = dir.path().join("batch_results").join("qa.json");
        save_records(&[record.clone()], &output_path).unwrap();

        let written = std::fs::read_to_string(&output_path).unwrap();
        assert!(written.contains("答案"));
        assert!(written.contains(r#""finish_reason": "length""#));
        let back: Vec<BatchRecord> = serde_json::from_str(&written).unwrap();
        assert_eq!(back, vec![record]);
    }

    #[test]
    fn empty_input_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        std::fs::write(&path, "[]").unwrap();
        assert!(matches!(load_inputs(&path), Err(GptError::EmptyBatch(_))));
    }
}
