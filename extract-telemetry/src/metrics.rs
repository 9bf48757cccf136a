use std::sync::{Mutex, PoisonError};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// Handle of the global recorder, which can be installed once per process.
static PROMETHEUS_HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the global Prometheus recorder and returns a handle rendering what it collected.
///
/// No HTTP listener is started: a run is short-lived, so the caller renders the handle once the
/// run ends. Later calls return clones of the first handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let mut prometheus_handle = PROMETHEUS_HANDLE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if let Some(handle) = &*prometheus_handle {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    *prometheus_handle = Some(handle.clone());

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_rendered_by_every_handle() {
        let first = init_metrics().unwrap();
        let second = init_metrics().unwrap();

        metrics::counter!("telemetry_test_total", "outcome" => "inserted").increment(3);

        for handle in [first, second] {
            assert!(
                handle
                    .render()
                    .contains("telemetry_test_total{outcome=\"inserted\"} 3")
            );
        }
    }
}
