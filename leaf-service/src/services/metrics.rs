//! Domain counters on top of the shared HTTP metrics.

use metrics::counter;

pub fn record_prediction(label: &str) {
    counter!("leaf_predictions_total", "label" => label.to_string()).increment(1);
}

pub fn record_classification_failure(kind: &'static str) {
    counter!("leaf_classification_failures_total", "kind" => kind).increment(1);
}

pub fn record_question(outcome: &'static str) {
    counter!("leaf_questions_total", "outcome" => outcome).increment(1);
}
