//! Test doubles for the chat platform and the irrigation API.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::irrigation::StatusSource;
use crate::platform::{FormatMode, MessageSender};

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub text: String,
    pub mode: FormatMode,
}

/// Records every delivered message; chats in `failing` always error.
#[derive(Default)]
pub struct RecordingSender {
    failing: HashSet<i64>,
    attempts: Mutex<Vec<i64>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(chat_ids: &[i64]) -> Self {
        Self {
            failing: chat_ids.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> Vec<i64> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, chat_id: i64) -> Vec<SentMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.chat_id == chat_id)
            .collect()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_message(&self, chat_id: i64, text: &str, mode: FormatMode) -> Result<()> {
        self.attempts.lock().unwrap().push(chat_id);
        if self.failing.contains(&chat_id) {
            anyhow::bail!("chat {} unreachable", chat_id);
        }
        self.sent.lock().unwrap().push(SentMessage {
            chat_id,
            text: text.to_string(),
            mode,
        });
        Ok(())
    }
}

/// Returns a canned response (or an error when `None`) and counts calls.
pub struct StubStatusSource {
    response: Option<Value>,
    calls: AtomicUsize,
}

impl StubStatusSource {
    pub fn returning(response: Value) -> Self {
        Self {
            response: Some(response),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for StubStatusSource {
    async fn fetch_status(&self) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Some(value) => Ok(value.clone()),
            None => anyhow::bail!("connection refused"),
        }
    }
}
