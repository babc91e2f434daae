//! A scripted shell: a virtual clock for timers and a queue of HTTP requests
//! the test answers by hand.

#![allow(dead_code)]

use crux_core::testing::{AppTester, Update};
use crux_core::Request;
use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use serde_json::{json, Value};

use embassy_admin::capabilities::{HttpError, HttpMethod, TimerId, TimerOperation, TimerOutput};
use embassy_admin::model::{Collection, EmbassyId};
use embassy_admin::{App, Effect, Event, Model, ViewModel};

struct Scheduled {
    id: TimerId,
    due_ms: u64,
    millis: u64,
    seq: u64,
    request: Request<TimerOperation>,
}

pub struct PendingHttp {
    pub op: HttpRequest,
    request: Request<HttpRequest>,
}

impl PendingHttp {
    pub fn method(&self) -> HttpMethod {
        self.op.method.parse().expect("known HTTP method")
    }

    pub fn url(&self) -> &str {
        &self.op.url
    }

    /// Header names arrive lowercased from `crux_http`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.op
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn path(&self) -> &str {
        let url = self.url();
        let path = url.split('?').next().unwrap_or(url);
        path.strip_prefix(BASE).unwrap_or(path)
    }

    pub fn json_body(&self) -> Value {
        if self.op.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.op.body).unwrap()
    }
}

pub const BASE: &str = "https://api.embassy-admin.example/v1/";

pub struct Shell {
    pub app: AppTester<App, Effect>,
    pub model: Model,
    pub now_ms: u64,
    timers: Vec<Scheduled>,
    seq: u64,
    pub http: Vec<PendingHttp>,
    /// Every timer the core asked to cancel, in order.
    pub cancelled: Vec<TimerId>,
    /// Every timer that fired, in order.
    pub fired: Vec<TimerId>,
    pub renders: usize,
}

impl Shell {
    pub fn new() -> Self {
        Self {
            app: AppTester::default(),
            model: Model::default(),
            now_ms: 0,
            timers: Vec::new(),
            seq: 0,
            http: Vec::new(),
            cancelled: Vec::new(),
            fired: Vec::new(),
            renders: 0,
        }
    }

    /// Signed in to `emb-1` with two boards, one staff member and no
    /// publications loaded.
    pub fn signed_in() -> Self {
        let mut shell = Self::new();
        shell.send(Event::SignedIn {
            token: "token-123".into(),
            embassy_id: EmbassyId::new("emb-1"),
        });

        shell.respond_to(HttpMethod::Get, "boards", ok(boards_json(&[("b1", "Visa notices"), ("b2", "Trade fair")])));
        shell.respond_to(
            HttpMethod::Get,
            "staff",
            ok(json!([{ "id": "s1", "name": "A. Consul" }])),
        );
        shell.respond_to(HttpMethod::Get, "publications", ok(json!({ "items": [], "total": 0 })));
        shell.respond_to(HttpMethod::Post, "graphql", ok(stats_json(2)));
        assert!(shell.http.is_empty());
        shell
    }

    pub fn send(&mut self, event: Event) {
        let update = self.app.update(event, &mut self.model);
        self.process(update);
    }

    pub fn view(&self) -> ViewModel {
        self.app.view(&self.model)
    }

    fn process(&mut self, update: Update<Effect, Event>) {
        for effect in update.effects {
            match effect {
                Effect::Render(_) => self.renders += 1,
                Effect::Http(request) => {
                    let op = request.operation.clone();
                    self.http.push(PendingHttp { op, request });
                }
                Effect::Timer(request) => match request.operation.clone() {
                    TimerOperation::Start { id, millis } => {
                        self.seq += 1;
                        self.timers.push(Scheduled {
                            id,
                            due_ms: self.now_ms + millis,
                            millis,
                            seq: self.seq,
                            request,
                        });
                    }
                    TimerOperation::Cancel { id } => {
                        self.cancelled.push(id);
                        if let Some(index) = self.timers.iter().position(|t| t.id == id) {
                            let mut timer = self.timers.remove(index);
                            let update = self
                                .app
                                .resolve(&mut timer.request, TimerOutput::Cleared(id))
                                .expect("resolve cleared timer");
                            self.process(update);
                        }
                    }
                },
            }
        }
        for event in update.events {
            self.send(event);
        }
    }

    /// Moves the clock forward, firing due timers in due order. Timers due
    /// at the same instant fire shortest-duration first.
    pub fn advance(&mut self, ms: u64) {
        let until = self.now_ms + ms;
        loop {
            let next = self
                .timers
                .iter()
                .enumerate()
                .filter(|(_, t)| t.due_ms <= until)
                .min_by_key(|(_, t)| (t.due_ms, t.millis, t.seq))
                .map(|(index, _)| index);
            let Some(index) = next else { break };

            let mut timer = self.timers.remove(index);
            self.now_ms = timer.due_ms;
            self.fired.push(timer.id);
            let update = self
                .app
                .resolve(&mut timer.request, TimerOutput::Fired(timer.id))
                .expect("resolve fired timer");
            self.process(update);
        }
        self.now_ms = until;
    }

    pub fn scheduled_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn pending(&self, method: HttpMethod, path: &str) -> Vec<&PendingHttp> {
        self.http
            .iter()
            .filter(|p| p.method() == method && p.path() == path)
            .collect()
    }

    /// Answers the oldest pending request matching `method` and `path`.
    pub fn respond_to(&mut self, method: HttpMethod, path: &str, result: HttpResult) {
        let index = self
            .http
            .iter()
            .position(|p| p.method() == method && p.path() == path)
            .unwrap_or_else(|| panic!("no pending {method} {path}"));
        self.respond_at(index, result);
    }

    pub fn respond_at(&mut self, index: usize, result: HttpResult) {
        let mut pending = self.http.remove(index);
        let update = self
            .app
            .resolve(&mut pending.request, result)
            .expect("resolve http");
        self.process(update);
    }
}

pub fn ok(body: Value) -> HttpResult {
    status(200, body)
}

pub fn status(code: u16, body: Value) -> HttpResult {
    HttpResult::Ok(
        HttpResponse::status(code)
            .header("content-type", "application/json")
            .json(body)
            .build(),
    )
}

pub fn no_content() -> HttpResult {
    HttpResult::Ok(HttpResponse::status(204).build())
}

pub fn connection_refused() -> HttpResult {
    HttpResult::Err(HttpError::Io("connection refused".into()))
}

pub fn boards_json(boards: &[(&str, &str)]) -> Value {
    Value::Array(
        boards
            .iter()
            .map(|(id, title)| json!({ "id": id, "title": title, "status": "active" }))
            .collect(),
    )
}

pub fn stats_json(total_boards: u64) -> Value {
    json!({
        "data": {
            "embassyStats": {
                "totalBoards": total_boards,
                "activeBoards": total_boards,
                "totalStaff": 1,
                "totalPublications": 0,
                "publishedPublications": 0
            }
        }
    })
}

pub fn collection_path(collection: Collection, id: &str) -> String {
    format!("{}/{id}", collection.path())
}
