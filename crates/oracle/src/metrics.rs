use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Prometheus instruments for one oracle engine.
#[derive(Clone)]
pub struct OracleMetrics {
    pub requests_created: IntCounter,
    pub requests_finalized: IntCounter,
    pub requests_open: IntGauge,
    pub segments_received: IntCounter,
    pub deposits: IntCounter,
    pub withdrawals: IntCounter,
    pub callback_failures: IntCounter,
    pub rejections: IntCounterVec,
}

impl OracleMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let requests_created = IntCounter::new("aioracle_requests_created_total", "Total AI requests created")?;
        let requests_finalized =
            IntCounter::new("aioracle_requests_finalized_total", "Total AI requests finalized")?;
        let requests_open = IntGauge::new("aioracle_requests_open", "AI requests awaiting finalization")?;
        let segments_received =
            IntCounter::new("aioracle_segments_received_total", "Total response segments appended")?;
        let deposits = IntCounter::new("aioracle_deposits_total", "Total escrow deposits")?;
        let withdrawals = IntCounter::new("aioracle_withdrawals_total", "Total escrow withdrawals")?;
        let callback_failures =
            IntCounter::new("aioracle_callback_failures_total", "Finalization callbacks that failed")?;
        let rejections = IntCounterVec::new(
            Opts::new("aioracle_rejections_total", "Rejected operations by error kind"),
            &["kind"],
        )?;

        registry.register(Box::new(requests_created.clone()))?;
        registry.register(Box::new(requests_finalized.clone()))?;
        registry.register(Box::new(requests_open.clone()))?;
        registry.register(Box::new(segments_received.clone()))?;
        registry.register(Box::new(deposits.clone()))?;
        registry.register(Box::new(withdrawals.clone()))?;
        registry.register(Box::new(callback_failures.clone()))?;
        registry.register(Box::new(rejections.clone()))?;

        Ok(Self {
            requests_created,
            requests_finalized,
            requests_open,
            segments_received,
            deposits,
            withdrawals,
            callback_failures,
            rejections,
        })
    }

    pub fn record_rejection(&self, kind: &str) {
        self.rejections.with_label_values(&[kind]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_count() {
        let registry = Registry::new();
        let metrics = OracleMetrics::new(&registry).unwrap();

        metrics.requests_created.inc();
        metrics.record_rejection("unauthorized");
        metrics.record_rejection("unauthorized");

        assert_eq!(metrics.requests_created.get(), 1);
        assert_eq!(metrics.rejections.with_label_values(&["unauthorized"]).get(), 2);
        assert!(registry.gather().len() >= 8);
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        OracleMetrics::new(&registry).unwrap();
        assert!(OracleMetrics::new(&registry).is_err());
    }
}
