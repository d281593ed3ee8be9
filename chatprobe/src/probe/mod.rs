// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Concurrent resume probe
//
// Responsibilities:
// - Run a long-lived producer and a dependent consumer concurrently
// - Bound every wait (stagger, value wait, both joins)
// - Convert every task failure into an actor outcome at the task boundary
// - Fold both outcomes and the classified response into one verdict

mod abandon;
mod runner;
mod tasks;
mod types;

pub use abandon::{AbandonHandle, AbandonSignal};
pub use runner::ProbeRunner;
pub use tasks::{
    ChatStreamProducer, Consumer, ConsumerContext, Producer, ProducerContext, ResumeConsumer,
};
pub use types::{
    check_available, ActorOutcome, ActorRole, ActorStatus, ConsumerReport, ProbeError,
    ProbeStatus, ProbeTimings, ProbeVerdict, ProducerReport,
};

use crate::classifier::ResponseClassifier;
use crate::client::{AgentClient, ChatRequest};
use crate::config::Config;
use crate::stream::StreamDecoder;
use std::sync::Arc;

/// Wire the default chat-stream producer and resume consumer from `config`
/// and run one probe against `client`.
pub async fn run_chat_probe(config: &Config, client: Arc<dyn AgentClient>) -> ProbeVerdict {
    let agent = &config.agent;
    tracing::info!(
        agent_id = %agent.id,
        config_hash = %config.config_hash,
        "starting resume-during-stream probe"
    );

    let request = ChatRequest::streaming(
        agent.id.clone(),
        agent.version.clone(),
        agent.query.clone(),
        agent.executor_version.clone(),
    );
    let producer = ChatStreamProducer::new(
        client.clone(),
        request,
        StreamDecoder::new(config.control.key.clone()),
    );
    let consumer = ResumeConsumer::new(client, agent.id.clone(), config.timings.resume_timeout);

    let classifier =
        ResponseClassifier::new(config.control.key.clone(), config.control.not_found_marker.clone());
    let runner = ProbeRunner::new(config.timings.probe_timings(), classifier);

    runner.run(Arc::new(producer), Arc::new(consumer)).await
}
