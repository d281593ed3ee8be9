// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Concurrent probe runner
//
// Idle -> ProducerRunning -> (ProducerRunning || ConsumerWaiting)
//      -> (ProducerDone, ConsumerRunning | ConsumerDone) -> Joined -> Verdicted
//
// The producer starts first; the consumer starts after the stagger delay so
// its dependent call lands while the producer is still streaming. Each task
// hands back a typed result; all aggregation happens here after both joins.

use super::abandon::AbandonHandle;
use super::tasks::{Consumer, ConsumerContext, Producer, ProducerContext};
use super::types::{
    ActorOutcome, ActorRole, ActorStatus, ConsumerReport, ProbeError, ProbeStatus, ProbeTimings,
    ProbeVerdict, ProducerReport,
};
use crate::classifier::{Classification, ResponseClassifier};
use crate::coordinator::SessionCoordinator;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

pub struct ProbeRunner {
    timings: ProbeTimings,
    classifier: ResponseClassifier,
}

impl ProbeRunner {
    pub fn new(timings: ProbeTimings, classifier: ResponseClassifier) -> Self {
        Self {
            timings,
            classifier,
        }
    }

    /// Run one probe. Never fails: every task error is folded into the
    /// returned verdict.
    pub async fn run(
        &self,
        producer: Arc<dyn Producer>,
        consumer: Arc<dyn Consumer>,
    ) -> ProbeVerdict {
        let probe_id = Uuid::new_v4();
        let started_at = Utc::now();
        let coordinator = Arc::new(SessionCoordinator::new());
        let (abandon_producer, producer_signal) = AbandonHandle::new();
        let (abandon_consumer, consumer_signal) = AbandonHandle::new();

        tracing::debug!(%probe_id, state = "producer_running", "probe started");
        let producer_started = Instant::now();
        let producer_handle = tokio::spawn({
            let ctx = ProducerContext {
                coordinator: coordinator.clone(),
                abandon: producer_signal,
            };
            async move { producer.produce(ctx).await }
        });

        tokio::time::sleep(self.timings.stagger).await;

        tracing::debug!(%probe_id, state = "consumer_waiting", "consumer started");
        let consumer_started = Instant::now();
        let consumer_handle = tokio::spawn({
            let ctx = ConsumerContext {
                coordinator: coordinator.clone(),
                abandon: consumer_signal,
                wait: self.timings.value_wait_timeout,
            };
            async move { consumer.consume(ctx).await }
        });

        let ((producer_result, producer_elapsed), (consumer_result, consumer_elapsed)) = tokio::join!(
            join_actor(
                producer_handle,
                self.timings.producer_join_timeout,
                producer_started
            ),
            join_actor(
                consumer_handle,
                self.timings.consumer_join_timeout,
                consumer_started
            ),
        );
        tracing::debug!(%probe_id, state = "joined", "both actors joined");

        if matches!(producer_result, Err(ProbeError::JoinTimeout)) {
            abandon_producer.abandon();
        }
        if matches!(consumer_result, Err(ProbeError::JoinTimeout)) {
            abandon_consumer.abandon();
        }

        let control_value = coordinator.current().map(str::to_string);
        let decision = decide(
            &self.classifier,
            &producer_result,
            &consumer_result,
            control_value.as_deref(),
        );

        let producer =
            producer_outcome(&producer_result, producer_elapsed, control_value.as_deref());
        let consumer = consumer_outcome(&consumer_result, consumer_elapsed);
        log_outcome(probe_id, &producer);
        log_outcome(probe_id, &consumer);

        let (response_status, response_payload) = match &consumer_result {
            Ok(report) => (
                Some(report.response.status.as_u16()),
                Some(report.response.payload.clone()),
            ),
            Err(_) => (None, None),
        };

        let verdict = ProbeVerdict {
            probe_id,
            started_at,
            status: decision.status,
            diagnostic: decision.diagnostic,
            control_value,
            producer,
            consumer,
            classification: decision.classification,
            response_status,
            response_payload,
            frames: producer_result.as_ref().ok().map(|r| r.frames),
        };

        tracing::info!(
            %probe_id,
            state = "verdicted",
            status = ?verdict.status,
            classification = ?verdict.classification,
            conversation_id = verdict.control_value.as_deref().unwrap_or(""),
            diagnostic = %verdict.diagnostic,
            "probe finished"
        );
        verdict
    }
}

// ---------------------------------------------------------------------------
// Joining
// ---------------------------------------------------------------------------

/// Wait for a task with a bound. On timeout the handle is dropped, which
/// detaches the task rather than killing it.
async fn join_actor<T>(
    handle: JoinHandle<Result<T, ProbeError>>,
    timeout: Duration,
    started: Instant,
) -> (Result<T, ProbeError>, Duration) {
    let result = match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(ProbeError::TaskPanicked(join_err.to_string())),
        Err(_) => Err(ProbeError::JoinTimeout),
    };
    (result, started.elapsed())
}

/// `published` covers a producer that published and then failed.
fn producer_outcome(
    result: &Result<ProducerReport, ProbeError>,
    elapsed: Duration,
    published: Option<&str>,
) -> ActorOutcome {
    let status = match result {
        Ok(_) => ActorStatus::Success,
        Err(e) => ActorStatus::Failed(e.clone()),
    };
    let value = match result {
        Ok(ProducerReport {
            control_value: Some(value),
            ..
        }) => Some(value.clone()),
        _ => published.map(str::to_string),
    };
    ActorOutcome {
        role: ActorRole::Producer,
        status,
        value,
        elapsed,
    }
}

fn consumer_outcome(result: &Result<ConsumerReport, ProbeError>, elapsed: Duration) -> ActorOutcome {
    let (status, value) = match result {
        Ok(report) => (ActorStatus::Success, Some(report.conversation_id.clone())),
        Err(e @ ProbeError::DependencyNeverObserved) => (ActorStatus::Skipped(e.clone()), None),
        Err(e) => (ActorStatus::Failed(e.clone()), None),
    };
    ActorOutcome {
        role: ActorRole::Consumer,
        status,
        value,
        elapsed,
    }
}

fn log_outcome(probe_id: Uuid, outcome: &ActorOutcome) {
    let elapsed_ms = outcome.elapsed.as_millis() as u64;
    match &outcome.status {
        ActorStatus::Success => tracing::info!(
            %probe_id, role = ?outcome.role, elapsed_ms, "actor succeeded"
        ),
        ActorStatus::Skipped(reason) => tracing::info!(
            %probe_id, role = ?outcome.role, elapsed_ms, %reason, "actor skipped"
        ),
        ActorStatus::Failed(reason) => tracing::warn!(
            %probe_id, role = ?outcome.role, elapsed_ms, %reason, "actor failed"
        ),
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

pub(crate) struct Decision {
    pub status: ProbeStatus,
    pub diagnostic: String,
    pub classification: Option<Classification>,
}

impl Decision {
    fn new(status: ProbeStatus, diagnostic: impl Into<String>) -> Self {
        Self {
            status,
            diagnostic: diagnostic.into(),
            classification: None,
        }
    }
}

/// Fold both actor results into one verdict.
///
/// Order matters: unavailability masks everything, then producer defects,
/// then a missing dependency, then consumer failures, and only then the
/// classified resume response.
pub(crate) fn decide(
    classifier: &ResponseClassifier,
    producer: &Result<ProducerReport, ProbeError>,
    consumer: &Result<ConsumerReport, ProbeError>,
    published: Option<&str>,
) -> Decision {
    if let Err(e) = producer {
        if e.is_transport_unavailable() {
            return Decision::new(ProbeStatus::Skip, format!("chat stream: {e}"));
        }
    }
    if let Err(e) = consumer {
        if e.is_transport_unavailable() {
            return Decision::new(ProbeStatus::Skip, format!("resume call: {e}"));
        }
    }

    if let Err(e) = producer {
        if *e != ProbeError::JoinTimeout {
            return Decision::new(ProbeStatus::Fail, format!("producer failed: {e}"));
        }
    }

    if published.is_none() {
        return Decision::new(ProbeStatus::Skip, ProbeError::DependencyNeverObserved.to_string());
    }

    let report = match consumer {
        Ok(report) => report,
        Err(ProbeError::DependencyNeverObserved) => {
            return Decision::new(
                ProbeStatus::Skip,
                format!(
                    "{} (published after the consumer stopped waiting)",
                    ProbeError::DependencyNeverObserved
                ),
            );
        }
        Err(e) => return Decision::new(ProbeStatus::Fail, format!("consumer failed: {e}")),
    };

    if let Err(e) = producer {
        return Decision::new(ProbeStatus::Fail, format!("producer failed: {e}"));
    }

    let status_code = report.response.status;
    let classification =
        classifier.classify(status_code, &report.response.payload, &report.conversation_id);

    let (status, diagnostic) = match classification {
        Classification::Valid => (
            ProbeStatus::Pass,
            format!(
                "resume accepted while the stream was in flight (HTTP {})",
                status_code.as_u16()
            ),
        ),
        Classification::ExpectedUnsupported => (
            ProbeStatus::Pass,
            "resume reached the service mid-stream; this agent configuration does not \
             support resuming (conversation not found)"
                .to_string(),
        ),
        Classification::Invalid => (
            ProbeStatus::Fail,
            format!(
                "resume response invalid (HTTP {}): {}",
                status_code.as_u16(),
                report.response.payload.to_display_string()
            ),
        ),
    };

    Decision {
        status,
        diagnostic,
        classification: Some(classification),
    }
}
