#![allow(dead_code)]

use infoview_core::{Disposable, Event};
use infoview_server::{Connection, TransportError};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A connection that records outbound values and delivers inbound ones on `poll`.
pub struct QueuedConnection {
    pub sent: Vec<Value>,
    inbox: VecDeque<Value>,
    json_message: Event<Value>,
    error: Event<TransportError>,
    alive: bool,
}

impl QueuedConnection {
    pub fn new() -> Self {
        Self {
            sent: Vec::new(),
            inbox: VecDeque::new(),
            json_message: Event::new(),
            error: Event::new(),
            alive: true,
        }
    }

    pub fn queue(&mut self, value: Value) {
        self.inbox.push_back(value);
    }

    pub fn fail(&self, err: TransportError) {
        self.error.fire(err);
    }

    pub fn kill(&mut self) {
        self.alive = false;
    }
}

impl Connection for QueuedConnection {
    fn send(&mut self, message: &Value) -> Result<(), TransportError> {
        if !self.alive {
            return Err(TransportError::Disposed);
        }
        self.sent.push(message.clone());
        Ok(())
    }

    fn json_message(&self) -> &Event<Value> {
        &self.json_message
    }

    fn error(&self) -> &Event<TransportError> {
        &self.error
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn poll(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(value) = self.inbox.pop_front() {
            self.json_message.fire(value);
            delivered += 1;
        }
        delivered
    }
}

impl Disposable for QueuedConnection {
    fn dispose(&mut self) {
        self.alive = false;
        self.inbox.clear();
        self.json_message.dispose();
        self.error.dispose();
    }
}

/// A connection that answers every sent value by firing it straight back.
pub struct EchoConnection {
    json_message: Event<Value>,
    error: Event<TransportError>,
}

impl EchoConnection {
    pub fn new() -> Self {
        Self {
            json_message: Event::new(),
            error: Event::new(),
        }
    }
}

impl Connection for EchoConnection {
    fn send(&mut self, message: &Value) -> Result<(), TransportError> {
        self.json_message.fire(message.clone());
        Ok(())
    }

    fn json_message(&self) -> &Event<Value> {
        &self.json_message
    }

    fn error(&self) -> &Event<TransportError> {
        &self.error
    }

    fn is_alive(&self) -> bool {
        !self.json_message.is_disposed()
    }
}

impl Disposable for EchoConnection {
    fn dispose(&mut self) {
        self.json_message.dispose();
        self.error.dispose();
    }
}

/// Collect every value fired on `event`.
pub fn record<T: Clone + Send + 'static>(event: &Event<T>) -> Arc<Mutex<Vec<T>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    event.subscribe(move |value: &T| {
        seen_clone.lock().unwrap().push(value.clone());
    });
    seen
}
