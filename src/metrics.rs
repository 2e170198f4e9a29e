//! Scoring metrics and periodic summaries.

use crate::types::alert::RiskLevel;
use crate::types::decision::StrategyKind;
use crate::types::rollup::TransactionRecord;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;

/// Counters for the scoring pipeline
pub struct ScoringMetrics {
    /// Transactions scored and recorded
    pub transactions_processed: AtomicU64,
    /// Recorded transactions flagged as fraud
    pub transactions_flagged: AtomicU64,
    /// Transactions rejected by validation
    pub transactions_rejected: AtomicU64,
    /// Transactions the scorer or the ledger could not handle
    pub transactions_failed: AtomicU64,
    by_risk_level: RwLock<HashMap<RiskLevel, u64>>,
    by_strategy: RwLock<HashMap<StrategyKind, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Confidence histogram; the last bucket holds everything >= 0.9
    confidence_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            transactions_processed: AtomicU64::new(0),
            transactions_flagged: AtomicU64::new(0),
            transactions_rejected: AtomicU64::new(0),
            transactions_failed: AtomicU64::new(0),
            by_risk_level: RwLock::new(HashMap::new()),
            by_strategy: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            confidence_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a scored transaction
    pub fn record_scored(&self, record: &TransactionRecord, processing_time: Duration) {
        self.transactions_processed.fetch_add(1, Ordering::Relaxed);
        if record.is_fraud {
            self.transactions_flagged.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut levels) = self.by_risk_level.write() {
            *levels.entry(record.risk_level).or_insert(0) += 1;
        }
        if let Ok(mut strategies) = self.by_strategy.write() {
            *strategies.entry(record.strategy).or_insert(0) += 1;
        }

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }

        let bucket = (record.fraud_score * 10.0).clamp(0.0, 9.0) as usize;
        if let Ok(mut buckets) = self.confidence_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    pub fn record_rejected(&self) {
        self.transactions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.transactions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_confidence_distribution(&self) -> [u64; 10] {
        self.confidence_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    pub fn count_for_level(&self, level: RiskLevel) -> u64 {
        self.by_risk_level
            .read()
            .ok()
            .and_then(|m| m.get(&level).copied())
            .unwrap_or(0)
    }

    pub fn count_for_strategy(&self, strategy: StrategyKind) -> u64 {
        self.by_strategy
            .read()
            .ok()
            .and_then(|m| m.get(&strategy).copied())
            .unwrap_or(0)
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let processed = self.transactions_processed.load(Ordering::Relaxed);
        let flagged = self.transactions_flagged.load(Ordering::Relaxed);
        let rejected = self.transactions_rejected.load(Ordering::Relaxed);
        let failed = self.transactions_failed.load(Ordering::Relaxed);
        let flag_rate = if processed > 0 {
            (flagged as f64 / processed as f64) * 100.0
        } else {
            0.0
        };
        let processing = self.get_processing_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              FUEL FRAUD SCORING - METRICS SUMMARY            ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Scored:    {:>8}  │  Throughput: {:>6.1} tx/s ║",
            processed,
            self.get_throughput()
        );
        info!(
            "║ Flagged as Fraud:       {:>8}  │  Flag Rate:  {:>6.1}%     ║",
            flagged, flag_rate
        );
        info!(
            "║ Rejected:               {:>8}  │  Failed:     {:>8}     ║",
            rejected, failed
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!(
            "║ Strategy: trained={:>8} rule_fallback={:>8}               ║",
            self.count_for_strategy(StrategyKind::TrainedModel),
            self.count_for_strategy(StrategyKind::RuleFallback)
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Decisions by Risk Level:                                     ║");
        for level in [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low] {
            let count = self.count_for_level(level);
            let pct = if processed > 0 {
                (count as f64 / processed as f64) * 100.0
            } else {
                0.0
            };
            info!("║   {:10}: {:>6} ({:>5.1}%)", level.as_str(), count, pct);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Confidence Distribution:                                     ║");
        let distribution = self.get_confidence_distribution();
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar = "█".repeat(((pct / 2.0) as usize).min(20));
            let label = if i == 9 {
                "0.9+   ".to_string()
            } else {
                format!("{:.1}-{:.1}", i as f64 / 10.0, (i + 1) as f64 / 10.0)
            };
            info!("║   {}: {:>6} ({:>5.1}%) {}", label, count, pct, bar);
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Prints a summary every `interval_secs`
pub struct MetricsReporter {
    metrics: Arc<ScoringMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ScoringMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decision::Decision;
    use crate::types::transaction::Transaction;

    fn record(is_fraud: bool, confidence: f64, strategy: StrategyKind) -> TransactionRecord {
        let decision = Decision {
            is_fraud,
            confidence,
            risk_level: if is_fraud { RiskLevel::High } else { RiskLevel::Low },
            strategy,
            explanation: vec![],
        };
        TransactionRecord::new(1, Transaction::new(30.0, 1.5, 45.0, 1, 100), &decision)
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = ScoringMetrics::new();

        for (fraud, confidence, strategy, us) in [
            (false, 0.05, StrategyKind::RuleFallback, 100),
            (true, 0.67, StrategyKind::RuleFallback, 200),
            (true, 3.2, StrategyKind::TrainedModel, 300),
        ] {
            metrics.record_scored(&record(fraud, confidence, strategy), Duration::from_micros(us));
        }
        metrics.record_rejected();
        metrics.record_failed();

        assert_eq!(metrics.transactions_processed.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.transactions_flagged.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.transactions_rejected.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.transactions_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.count_for_level(RiskLevel::High), 2);
        assert_eq!(metrics.count_for_level(RiskLevel::Medium), 0);
        assert_eq!(metrics.count_for_strategy(StrategyKind::RuleFallback), 2);

        // Confidence above 1 lands in the top bucket
        assert_eq!(metrics.get_confidence_distribution(), [1, 0, 0, 0, 0, 0, 1, 0, 0, 1]);
    }

    #[test]
    fn test_processing_stats() {
        let metrics = ScoringMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);

        for us in 1..=100 {
            let scored = record(false, 0.1, StrategyKind::TrainedModel);
            metrics.record_scored(&scored, Duration::from_micros(us));
        }
        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.mean_us, 50);
        assert_eq!(stats.p50_us, 51);
        assert_eq!(stats.max_us, 100);
    }
}
