// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

pub mod classifier;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod probe;
pub mod stream;
