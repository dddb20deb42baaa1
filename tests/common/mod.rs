//! Shared utilities for server integration tests.

#![allow(dead_code)]

use apphost::prelude::*;
use axum::Form;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// App that records every hook call as `<id>.<hook>`.
pub struct RecordingApp {
    id: &'static str,
    log: EventLog,
    fail_init: bool,
    fail_clean: bool,
    echo: bool,
    entered: Arc<Notify>,
}

impl RecordingApp {
    pub fn new(id: &'static str, log: &EventLog) -> Self {
        Self {
            id,
            log: Arc::clone(log),
            fail_init: false,
            fail_clean: false,
            echo: false,
            entered: Arc::new(Notify::new()),
        }
    }

    /// Also print every event to stdout as `event: <id>.<hook>`.
    pub fn echoing(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Notified each time a request enters the slow handler.
    pub fn entered(&self) -> Arc<Notify> {
        Arc::clone(&self.entered)
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_clean(mut self) -> Self {
        self.fail_clean = true;
        self
    }

    fn record(&self, hook: &str) {
        let event = format!("{}.{}", self.id, hook);
        if self.echo {
            println!("event: {event}");
        }
        self.log.lock().unwrap().push(event);
    }
}

#[async_trait]
impl App for RecordingApp {
    async fn init(&self) -> anyhow::Result<()> {
        self.record("init");
        if self.fail_init {
            anyhow::bail!("{} init failed", self.id);
        }
        Ok(())
    }

    fn register_route(&self, engine: &mut Engine) {
        self.record("route");

        let id = self.id;
        let entered = self.entered();
        engine
            .route(
                &format!("/{id}/ok"),
                get(move || async move { ApiResponse::success(id) }),
            )
            .route(
                &format!("/{id}/boom"),
                post(|Form(_form): Form<BTreeMap<String, String>>| async {
                    Err::<(), _>(RequestError::internal("database unavailable"))
                }),
            )
            .route(
                &format!("/{id}/missing"),
                get(|| async { Err::<(), _>(HttpError::not_found("no such user")) }),
            )
            .route(
                &format!("/{id}/slow/{{ms}}"),
                get(move |Path(ms): Path<u64>| async move {
                    entered.notify_one();
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    "done"
                }),
            );
    }

    async fn clean(&self) -> anyhow::Result<()> {
        self.record("clean");
        if self.fail_clean {
            anyhow::bail!("{} clean failed", self.id);
        }
        Ok(())
    }
}

/// Listener that records what it saw, without touching the response.
#[derive(Default)]
pub struct RecordingListener {
    pub seen: Mutex<Vec<(String, BTreeMap<String, String>)>>,
}

#[async_trait]
impl ErrorListener for RecordingListener {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_error(&self, error: &RequestError, ctx: &mut ErrorContext) -> anyhow::Result<()> {
        self.seen
            .lock()
            .unwrap()
            .push((error.to_string(), ctx.request().form.clone()));
        Ok(())
    }
}

/// Write `<dir>/test.toml` binding an ephemeral local port.
pub fn write_config(dir: &std::path::Path, extra: &str) {
    let content = format!(
        "[server]\nhost = \"127.0.0.1\"\nport = 0\n{extra}\n\n[logger]\nlevel = \"debug\"\nformatter = \"text\"\n"
    );
    std::fs::write(dir.join("test.toml"), content).unwrap();
}

pub fn loader(dir: &std::path::Path) -> SettingsLoader {
    SettingsLoader::new()
        .config_dir(dir)
        .environment("test")
        .vars(Vec::<(String, String)>::new())
}

pub fn builder(dir: &std::path::Path) -> ServerBuilder {
    Server::builder()
        .settings_loader(loader(dir))
        .handle_signals(false)
        .install_global_logger(false)
}

/// Serve on a background task and wait until the server is accepting.
pub async fn spawn_server(
    server: &Arc<Server>,
) -> (SocketAddr, JoinHandle<Result<(), LifecycleError>>) {
    let handle = {
        let server = Arc::clone(server);
        tokio::spawn(async move { server.serve().await })
    };

    let mut state = server.subscribe_state();
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s == ServerState::Running),
    )
    .await
    .expect("server did not reach Running")
    .unwrap();

    (server.local_addr().unwrap(), handle)
}

/// Reports received by a fake reporting service.
pub type Received = Arc<Mutex<Vec<serde_json::Value>>>;

/// Start a fake reporting service and return its DSN.
pub async fn start_report_collector() -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));

    let app = Router::new().route(
        "/api/errors",
        post({
            let received = Arc::clone(&received);
            move |Json(report): Json<serde_json::Value>| {
                let received = Arc::clone(&received);
                async move {
                    received.lock().unwrap().push(report);
                    StatusCode::ACCEPTED
                }
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (format!("http://{addr}/api/errors"), received)
}

/// Poll `check` until it holds or a second has passed.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
