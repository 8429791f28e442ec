//! Shared fixtures for unit tests

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bus::MessageBus;
use crate::error::Result;
use crate::instance::{SagaData, SagaId};
use crate::message::{Endpoint, SagaMessage};

/// Minimal saga data used across the unit tests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestData {
    pub account: String,
    pub notes: Vec<String>,
}

impl SagaData for TestData {}

/// One bus primitive invocation, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusCall {
    pub operation: &'static str,
    pub message_type: &'static str,
}

/// Bus double that records every primitive invocation
pub struct RecordingBus {
    endpoint: Endpoint,
    test_mode: bool,
    calls: Mutex<Vec<BusCall>>,
    removed: Mutex<Vec<SagaId>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::from("test-endpoint"),
            test_mode: false,
            calls: Mutex::new(Vec::new()),
            removed: Mutex::new(Vec::new()),
        }
    }

    pub fn in_test_mode() -> Self {
        Self {
            test_mode: true,
            ..Self::new()
        }
    }

    fn record(&self, operation: &'static str, message_type: &'static str) {
        self.calls.lock().unwrap().push(BusCall {
            operation,
            message_type,
        });
    }

    pub fn calls(&self) -> Vec<BusCall> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, operation: &'static str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    pub fn published_count(&self) -> usize {
        self.count("publish")
    }

    pub fn sent_count(&self) -> usize {
        self.count("send")
    }

    pub fn timeout_count(&self) -> usize {
        self.count("request_timeout")
    }

    pub fn removed_timeouts(&self) -> Vec<SagaId> {
        self.removed.lock().unwrap().clone()
    }
}

impl Default for RecordingBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus for RecordingBus {
    fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }

    fn publish(&self, message: Box<dyn SagaMessage>) -> Result<()> {
        self.record("publish", message.message_type());
        Ok(())
    }

    fn send(&self, message: Box<dyn SagaMessage>) -> Result<()> {
        self.record("send", message.message_type());
        Ok(())
    }

    fn send_to_endpoint(&self, _endpoint: &Endpoint, message: Box<dyn SagaMessage>) -> Result<()> {
        self.record("send_to_endpoint", message.message_type());
        Ok(())
    }

    fn reply(&self, message: Box<dyn SagaMessage>) -> Result<()> {
        self.record("reply", message.message_type());
        Ok(())
    }

    fn request_timeout(
        &self,
        _delay: Duration,
        _saga: SagaId,
        message: Box<dyn SagaMessage>,
    ) -> Result<()> {
        self.record("request_timeout", message.message_type());
        Ok(())
    }

    fn remove_requested_timeouts(&self, saga: SagaId) -> Result<()> {
        self.removed.lock().unwrap().push(saga);
        Ok(())
    }

    fn test_mode(&self) -> bool {
        self.test_mode
    }
}
