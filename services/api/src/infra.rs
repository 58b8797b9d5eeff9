use govguard::scoring::ApplicantRecord;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Sample applicant used when `score applicant` is run without a file.
pub(crate) fn simulated_applicant() -> ApplicantRecord {
    ApplicantRecord::new()
        .with("SSN", "123-45-6789")
        .with("Bank_Account", "9876543210")
        .with("Income", 100000)
        .with("Address", "123 Elm St, FL")
        .with("Age", 17)
        .with("Program", "SNAP")
}
