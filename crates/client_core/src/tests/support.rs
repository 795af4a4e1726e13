//! Scripted in-memory event service for tests.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::transport::{Collection, EventService, ServiceReply, ServiceRequest};

#[derive(Clone)]
enum Scripted {
    Reply(ServiceReply),
    Fail(String),
}

#[derive(Default)]
pub(crate) struct FakeEventService {
    defaults: Mutex<HashMap<&'static str, Scripted>>,
    queued: Mutex<HashMap<&'static str, VecDeque<Scripted>>>,
    requests: Mutex<Vec<ServiceRequest>>,
    gates: Mutex<HashMap<&'static str, Arc<Semaphore>>>,
}

impl FakeEventService {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every later `name` request gets `reply` unless a queued reply is pending.
    pub(crate) fn reply(&self, name: &'static str, reply: ServiceReply) {
        self.defaults
            .lock()
            .expect("defaults")
            .insert(name, Scripted::Reply(reply));
    }

    pub(crate) fn reply_once(&self, name: &'static str, reply: ServiceReply) {
        self.queued
            .lock()
            .expect("queued")
            .entry(name)
            .or_default()
            .push_back(Scripted::Reply(reply));
    }

    pub(crate) fn fail(&self, name: &'static str, message: &str) {
        self.defaults
            .lock()
            .expect("defaults")
            .insert(name, Scripted::Fail(message.to_string()));
    }

    pub(crate) fn collection(&self, collection: Collection, body: Value) {
        self.reply(list_name(collection), ServiceReply::ok(body));
    }

    /// `name` requests are recorded immediately but wait for a permit from
    /// `gate` before replying. Permits are handed out in arrival order.
    pub(crate) fn gate(&self, name: &'static str, gate: Arc<Semaphore>) {
        self.gates.lock().expect("gates").insert(name, gate);
    }

    pub(crate) fn gate_lists(&self, gate: Arc<Semaphore>) {
        for collection in Collection::ALL {
            self.gate(list_name(collection), Arc::clone(&gate));
        }
    }

    pub(crate) fn requests(&self) -> Vec<ServiceRequest> {
        self.requests.lock().expect("requests").clone()
    }

    pub(crate) fn count(&self, name: &str) -> usize {
        self.requests
            .lock()
            .expect("requests")
            .iter()
            .filter(|request| request.name() == name)
            .count()
    }

    fn scripted(&self, name: &'static str) -> Scripted {
        if let Some(next) = self
            .queued
            .lock()
            .expect("queued")
            .get_mut(name)
            .and_then(VecDeque::pop_front)
        {
            return next;
        }
        if let Some(default) = self.defaults.lock().expect("defaults").get(name) {
            return default.clone();
        }
        Scripted::Reply(default_reply(name))
    }
}

#[async_trait]
impl EventService for FakeEventService {
    async fn send(&self, request: ServiceRequest) -> Result<ServiceReply> {
        let name = request.name();
        self.requests.lock().expect("requests").push(request.clone());

        let gate = self.gates.lock().expect("gates").get(name).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate open").forget();
        }

        match self.scripted(name) {
            Scripted::Reply(reply) => Ok(reply),
            Scripted::Fail(message) => Err(anyhow!(message)),
        }
    }
}

pub(crate) fn list_name(collection: Collection) -> &'static str {
    ServiceRequest::ListCollection(collection).name()
}

fn default_reply(name: &str) -> ServiceReply {
    match name {
        "list_organized" | "list_invited" | "list_accepted" | "search" | "list_attendees" => {
            ServiceReply::ok(json!([]))
        }
        "get_event" => ServiceReply::new(404, Some(json!({"error": "not found"}))),
        _ => ServiceReply::ok(json!({})),
    }
}

pub(crate) fn event_json(id: i64, title: &str, attendees: &[(&str, &str)]) -> Value {
    let attendees: Vec<Value> = attendees
        .iter()
        .map(|(email, status)| json!({"email": email, "status": status}))
        .collect();
    json!({
        "id": id,
        "title": title,
        "date": "2024-06-01",
        "time": "18:00",
        "location": "Hall",
        "description": "",
        "organizer": "host@x",
        "attendees": attendees,
    })
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub(crate) async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
