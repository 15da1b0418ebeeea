//! # Prometheus Metrics
//!
//! Organizer counters and forest gauges, registered in a dedicated
//! [`prometheus::Registry`] with the `chainspan` prefix. The node is a
//! one-shot CLI, so the metrics are printed in text exposition format at
//! the end of a command instead of being scraped.

use chainspan::forest::ForestStats;
use chainspan::SettleReport;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct OrganizerMetrics {
    registry: Registry,
    /// Organizer passes run.
    pub passes_total: IntCounter,
    /// Blocks moved from pending to linked.
    pub blocks_linked_total: IntCounter,
    /// Fork reservations made by the allocator.
    pub forks_reserved_total: IntCounter,
    pub pending_blocks: IntGauge,
    pub linked_blocks: IntGauge,
    /// Depth of the deepest linked block.
    pub max_depth: IntGauge,
}

impl OrganizerMetrics {
    /// Create and register every metric.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chainspan".into()), None)?;

        let passes_total = IntCounter::new("passes_total", "Organizer passes run")?;
        registry.register(Box::new(passes_total.clone()))?;

        let blocks_linked_total =
            IntCounter::new("blocks_linked_total", "Blocks linked into the forest")?;
        registry.register(Box::new(blocks_linked_total.clone()))?;

        let forks_reserved_total = IntCounter::new(
            "forks_reserved_total",
            "Chain ids reserved for forks by the interval allocator",
        )?;
        registry.register(Box::new(forks_reserved_total.clone()))?;

        let pending_blocks = IntGauge::new("pending_blocks", "Blocks waiting for a linked parent")?;
        registry.register(Box::new(pending_blocks.clone()))?;

        let linked_blocks = IntGauge::new("linked_blocks", "Blocks linked into the forest")?;
        registry.register(Box::new(linked_blocks.clone()))?;

        let max_depth = IntGauge::new("max_depth", "Depth of the deepest linked block")?;
        registry.register(Box::new(max_depth.clone()))?;

        Ok(Self {
            registry,
            passes_total,
            blocks_linked_total,
            forks_reserved_total,
            pending_blocks,
            linked_blocks,
            max_depth,
        })
    }

    pub fn record_settle(&self, report: &SettleReport) {
        self.passes_total.inc_by(report.passes as u64);
        self.blocks_linked_total.inc_by(report.linked as u64);
        self.forks_reserved_total.inc_by(report.forks_reserved as u64);
    }

    pub fn observe(&self, stats: &ForestStats) {
        self.pending_blocks.set(stats.pending as i64);
        self.linked_blocks.set(stats.linked as i64);
        self.max_depth.set(stats.max_depth.unwrap_or(0) as i64);
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_reports_accumulate() {
        let metrics = OrganizerMetrics::new().unwrap();
        let report = SettleReport {
            passes: 3,
            linked: 5,
            forks_reserved: 1,
            still_pending: 0,
            settled: true,
        };
        metrics.record_settle(&report);
        metrics.record_settle(&report);

        assert_eq!(metrics.passes_total.get(), 6);
        assert_eq!(metrics.blocks_linked_total.get(), 10);
        assert_eq!(metrics.forks_reserved_total.get(), 2);
    }

    #[test]
    fn encode_uses_namespace() {
        let metrics = OrganizerMetrics::new().unwrap();
        metrics.observe(&ForestStats {
            total: 4,
            linked: 3,
            pending: 1,
            roots: 1,
            tips: 2,
            max_depth: Some(2),
        });

        let text = metrics.encode().unwrap();
        assert!(text.contains("chainspan_passes_total 0"));
        assert!(text.contains("chainspan_pending_blocks 1"));
        assert!(text.contains("chainspan_max_depth 2"));
    }
}
