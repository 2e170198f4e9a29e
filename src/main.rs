//! Fuel Fraud Detection - Batch Scorer
//!
//! Reads one JSON transaction per line on stdin, scores and records each one,
//! and writes one JSON result per line on stdout. Per-pump rollups and a
//! metrics summary are logged at the end.

use anyhow::{Context, Result};
use fuel_fraud_detection::{
    config::AppConfig,
    metrics::{MetricsReporter, ScoringMetrics},
    models::inference::FraudDetector,
    pipeline::FraudPipeline,
    store::MemoryLedger,
    PipelineError, Transaction,
};
use futures::stream::{FuturesOrdered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// One stdout line per input line
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ScoredLine {
    Scored {
        line: usize,
        transaction_id: u64,
        is_fraud: bool,
        confidence: f64,
        risk_level: String,
        summary: &'static str,
        strategy: &'static str,
        explanation: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        alert_id: Option<String>,
    },
    Rejected {
        line: usize,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<&'static str>,
    },
}

fn score_line(pipeline: &FraudPipeline, line: usize, raw: &str) -> ScoredLine {
    let transaction: Transaction = match serde_json::from_str(raw) {
        Ok(tx) => tx,
        Err(e) => {
            warn!(line, error = %e, "Failed to deserialize transaction");
            pipeline.metrics().record_rejected();
            return ScoredLine::Rejected {
                line,
                error: format!("malformed transaction: {}", e),
                message: Some("Please enter valid numeric values"),
            };
        }
    };

    match pipeline.submit(transaction) {
        Ok(ingested) => ScoredLine::Scored {
            line,
            transaction_id: ingested.record.id,
            is_fraud: ingested.record.is_fraud,
            confidence: ingested.record.fraud_score,
            risk_level: ingested.record.risk_level.as_str().to_string(),
            summary: ingested.record.risk_level.summary(),
            strategy: ingested.record.strategy.as_str(),
            explanation: ingested.record.explanation,
            alert_id: ingested.alert.map(|a| a.alert_id.to_string()),
        },
        Err(e) => ScoredLine::Rejected {
            line,
            message: match &e {
                PipelineError::Validation(v) => Some(v.user_message()),
                _ => None,
            },
            error: e.to_string(),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    fuel_fraud_detection::logging::init(&config.logging)?;

    info!("Starting fuel fraud batch scorer");
    info!(
        "Rule thresholds: medium>{:.2}, high>{:.2}",
        config.detection.medium_risk_difference, config.detection.high_risk_difference
    );

    let metrics = Arc::new(ScoringMetrics::new());
    let detector = Arc::new(FraudDetector::new(&config));
    info!(
        "Feature extractor ready ({} features)",
        detector.extractor().feature_count()
    );
    let ledger = Arc::new(MemoryLedger::new());
    let pipeline = Arc::new(FraudPipeline::new(detector, ledger.clone(), metrics.clone()));

    let num_workers = config.pipeline.workers;
    info!("Scoring stdin with {} parallel workers", num_workers);

    // Semaphore to limit in-flight transactions
    let semaphore = Arc::new(Semaphore::new(num_workers));

    let reporter = tokio::spawn(
        MetricsReporter::new(metrics.clone(), config.pipeline.report_interval_secs).start(),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = FuturesOrdered::new();
    let mut stdout = tokio::io::stdout();
    let mut line_no = 0usize;

    while let Some(raw) = lines.next_line().await.context("Failed to read stdin")? {
        line_no += 1;
        if raw.trim().is_empty() {
            continue;
        }

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;
        let pipeline = pipeline.clone();
        let line = line_no;

        let task = tokio::task::spawn_blocking(move || {
            let result = score_line(&pipeline, line, &raw);
            drop(permit);
            result
        });
        pending.push_back(async move { (line, task.await) });

        // Flush results that are already done so output keeps pace with input
        while pending.len() > num_workers * 4 {
            if let Some((line, done)) = pending.next().await {
                write_result(&mut stdout, &metrics, line, done).await?;
            }
        }
    }

    while let Some((line, done)) = pending.next().await {
        write_result(&mut stdout, &metrics, line, done).await?;
    }
    stdout.flush().await?;
    reporter.abort();

    info!("Input exhausted, {} lines read", line_no);
    for rollup in ledger.rollups()? {
        info!(
            pump_id = rollup.pump_id,
            total_transactions = rollup.total_transactions,
            fraud_count = rollup.fraud_count,
            fraud_percentage = format!("{:.1}%", rollup.fraud_percentage),
            total_fuel_dispensed = format!("{:.2}", rollup.total_fuel_dispensed),
            total_revenue = format!("{:.2}", rollup.total_revenue),
            "Pump rollup"
        );
    }
    info!(
        alerts = ledger.alerts()?.len(),
        unreviewed = ledger.unreviewed_alerts()?.len(),
        "Fraud alerts"
    );
    metrics.print_summary();

    Ok(())
}

async fn write_result(
    stdout: &mut tokio::io::Stdout,
    metrics: &ScoringMetrics,
    line: usize,
    done: Result<ScoredLine, tokio::task::JoinError>,
) -> Result<()> {
    let scored = done.unwrap_or_else(|e| {
        error!(line, error = %e, "Scoring task failed");
        metrics.record_failed();
        failed_line(line, &e)
    });

    let mut json = serde_json::to_vec(&scored)?;
    json.push(b'\n');
    stdout.write_all(&json).await.context("Failed to write stdout")?;
    Ok(())
}

fn failed_line(line: usize, e: &tokio::task::JoinError) -> ScoredLine {
    ScoredLine::Rejected {
        line,
        error: format!("scoring task failed: {}", e),
        message: None,
    }
}
