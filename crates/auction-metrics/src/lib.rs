//! Prometheus registry and exporter shared by the gateway and processor
//! binaries, generalized from the teacher's per-binary
//! `actors::prometheus_exporter` module into a single reusable crate.

use anyhow::Result;
use hyper::{
    header::CONTENT_TYPE,
    service::{make_service_fn, service_fn},
    Body, Response, Server,
};
use lazy_static::lazy_static;
use log::{error, info};
use prometheus::{
    register_counter_vec_with_registry, register_gauge_vec_with_registry,
    register_histogram_vec_with_registry, Encoder, CounterVec, GaugeVec, HistogramVec, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("auction".to_string()), None).unwrap();

    pub static ref GATEWAY_CONNECTIONS_ACTIVE: GaugeVec = register_gauge_vec_with_registry!(
        "gateway_connections_active",
        "Currently connected gateway sockets",
        &["instance"],
        REGISTRY
    )
    .unwrap();

    pub static ref BIDS_ACCEPTED_TOTAL: CounterVec = register_counter_vec_with_registry!(
        "bids_accepted_total",
        "Bids accepted by the processor",
        &["auction_id"],
        REGISTRY
    )
    .unwrap();

    pub static ref BIDS_REJECTED_TOTAL: CounterVec = register_counter_vec_with_registry!(
        "bids_rejected_total",
        "Bids rejected by the processor",
        &["reason"],
        REGISTRY
    )
    .unwrap();

    pub static ref LOCK_ACQUIRE_FAILURES_TOTAL: CounterVec = register_counter_vec_with_registry!(
        "lock_acquire_failures_total",
        "Auction lock acquisitions that failed",
        &["auction_id"],
        REGISTRY
    )
    .unwrap();

    pub static ref ADMISSION_DENIED_TOTAL: CounterVec = register_counter_vec_with_registry!(
        "admission_denied_total",
        "Connections denied by the admission controller",
        &["scope"],
        REGISTRY
    )
    .unwrap();

    pub static ref BID_PROCESSING_SECONDS: HistogramVec = register_histogram_vec_with_registry!(
        "bid_processing_seconds",
        "Time spent processing one bid envelope end to end",
        &["outcome"],
        REGISTRY
    )
    .unwrap();
}

/// Mirrors the teacher's `metrics_update!` macro: bumps a labelled series
/// plus its `"total"` aggregate in one call.
#[macro_export]
macro_rules! metrics_update {
    ( inc total $metric:ident, $labels:expr ) => {
        $crate::$metric.with_label_values($labels).inc();
        $crate::$metric.with_label_values(&["total"]).inc();
    };
    ( inc $metric:ident, $labels:expr ) => {
        $crate::$metric.with_label_values($labels).inc();
    };
    ( dec total $metric:ident, $labels:expr ) => {
        $crate::$metric.with_label_values($labels).dec();
        $crate::$metric.with_label_values(&["total"]).dec();
    };
    ( dec $metric:ident, $labels:expr ) => {
        $crate::$metric.with_label_values($labels).dec();
    };
    ( timer $metric:ident, $labels:expr ) => {
        $crate::$metric.with_label_values($labels).start_timer()
    };
}

pub fn inc_total(gauge: &GaugeVec, label: &str) {
    gauge.with_label_values(&[label]).inc();
    gauge.with_label_values(&["total"]).inc();
}

pub fn dec_total(gauge: &GaugeVec, label: &str) {
    gauge.with_label_values(&[label]).dec();
    gauge.with_label_values(&["total"]).dec();
}

/// Serves the registry on `bind_address` until the process exits, following
/// the teacher's `PrometheusExporter::start_server`.
pub async fn serve(bind_address: &str) -> Result<()> {
    let addr = bind_address.parse()?;

    info!("Prometheus exporter listening on http://{addr}");

    let serve_future = Server::bind(&addr).serve(make_service_fn(|_| async {
        Ok::<_, hyper::Error>(service_fn(|_req| async {
            let encoder = TextEncoder::new();
            let metric_families = REGISTRY.gather();
            let mut buffer = vec![];
            encoder.encode(&metric_families, &mut buffer).unwrap();

            let response = Response::builder()
                .status(200)
                .header(CONTENT_TYPE, encoder.format_type())
                .body(Body::from(buffer))
                .unwrap();

            Ok::<_, hyper::Error>(response)
        }))
    }));

    if let Err(err) = serve_future.await {
        error!("Prometheus exporter server error: {err}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inc_total_bumps_both_the_label_and_the_total_series() {
        let label = "test-inc-total-label";
        let before = GATEWAY_CONNECTIONS_ACTIVE.with_label_values(&[label]).get();
        let before_total = GATEWAY_CONNECTIONS_ACTIVE.with_label_values(&["total"]).get();

        inc_total(&GATEWAY_CONNECTIONS_ACTIVE, label);

        assert_eq!(GATEWAY_CONNECTIONS_ACTIVE.with_label_values(&[label]).get(), before + 1.0);
        assert_eq!(GATEWAY_CONNECTIONS_ACTIVE.with_label_values(&["total"]).get(), before_total + 1.0);
    }

    #[test]
    fn dec_total_mirrors_inc_total() {
        let label = "test-dec-total-label";
        inc_total(&GATEWAY_CONNECTIONS_ACTIVE, label);
        let before = GATEWAY_CONNECTIONS_ACTIVE.with_label_values(&[label]).get();
        let before_total = GATEWAY_CONNECTIONS_ACTIVE.with_label_values(&["total"]).get();

        dec_total(&GATEWAY_CONNECTIONS_ACTIVE, label);

        assert_eq!(GATEWAY_CONNECTIONS_ACTIVE.with_label_values(&[label]).get(), before - 1.0);
        assert_eq!(GATEWAY_CONNECTIONS_ACTIVE.with_label_values(&["total"]).get(), before_total - 1.0);
    }

    #[test]
    fn metrics_update_macro_increments_a_counter() {
        let before = BIDS_ACCEPTED_TOTAL.with_label_values(&["test-macro-auction"]).get();
        metrics_update!(inc BIDS_ACCEPTED_TOTAL, &["test-macro-auction"]);
        assert_eq!(BIDS_ACCEPTED_TOTAL.with_label_values(&["test-macro-auction"]).get(), before + 1.0);
    }
}
