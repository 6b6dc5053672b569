#![allow(dead_code, missing_docs)]

//! Common test utilities shared across integration tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use eidkit_core::{
    Action, Collaborators, Config, EidClient, EidError, ErrorCorrectionLevel, Host, Message,
    MessageBus, ModuleMatrix, Phase, PollUrlPolicy, QrEncoder, Visibility,
};
use tokio::sync::broadcast;

/// Routes the crate's `log` records to the test output. Set `RUST_LOG` to see them.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A page that records what the client asks of it.
pub struct FakeHost {
    secure: bool,
    mobile: bool,
    hide_on_navigate: bool,
    visibility: broadcast::Sender<Visibility>,
    navigations: Mutex<Vec<String>>,
    qr_codes: Mutex<Vec<String>>,
}

impl FakeHost {
    /// A secure desktop page.
    pub fn desktop() -> Self {
        Self {
            secure: true,
            mobile: false,
            hide_on_navigate: false,
            visibility: broadcast::channel(4).0,
            navigations: Mutex::new(Vec::new()),
            qr_codes: Mutex::new(Vec::new()),
        }
    }

    /// A secure mobile page. When `app_installed`, navigating to the deep link hides the page.
    pub fn mobile(app_installed: bool) -> Self {
        Self {
            mobile: true,
            hide_on_navigate: app_installed,
            ..Self::desktop()
        }
    }

    pub fn insecure() -> Self {
        Self {
            secure: false,
            ..Self::desktop()
        }
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn qr_codes(&self) -> Vec<String> {
        self.qr_codes.lock().unwrap().clone()
    }
}

impl Host for FakeHost {
    fn is_secure_context(&self) -> bool {
        self.secure
    }

    fn is_mobile_device(&self) -> bool {
        self.mobile
    }

    fn navigate(&self, url: &str) {
        self.navigations.lock().unwrap().push(url.to_string());
        if self.hide_on_navigate {
            let _ = self.visibility.send(Visibility::Hidden);
        }
    }

    fn visibility(&self) -> broadcast::Receiver<Visibility> {
        self.visibility.subscribe()
    }

    fn display_qr_code(&self, svg: &str) {
        self.qr_codes.lock().unwrap().push(svg.to_string());
    }
}

/// Encodes every text into a fixed 3x3 checkerboard and remembers the text.
#[derive(Default)]
pub struct RecordingEncoder {
    encoded: Mutex<Vec<String>>,
}

impl RecordingEncoder {
    pub fn encoded(&self) -> Vec<String> {
        self.encoded.lock().unwrap().clone()
    }
}

impl QrEncoder for RecordingEncoder {
    fn encode(
        &self,
        text: &str,
        _level: ErrorCorrectionLevel,
    ) -> Result<ModuleMatrix, EidError> {
        self.encoded.lock().unwrap().push(text.to_string());
        ModuleMatrix::new(3, (0..9).map(|i| i % 2 == 0).collect())
    }
}

pub struct Harness {
    pub client: Arc<EidClient>,
    pub bus: MessageBus,
    pub host: Arc<FakeHost>,
    pub encoder: Arc<RecordingEncoder>,
}

/// A started client on a fresh bus.
pub fn start_client(config: Config, host: FakeHost) -> Harness {
    start_client_with_policy(config, host, PollUrlPolicy::HttpsOnly)
}

/// A started client that may poll the plain HTTP URLs of a local mock server.
pub fn start_client_for_local_server(config: Config, host: FakeHost) -> Harness {
    start_client_with_policy(config, host, PollUrlPolicy::AllowPlainHttp)
}

fn start_client_with_policy(config: Config, host: FakeHost, policy: PollUrlPolicy) -> Harness {
    init_logging();
    let bus = MessageBus::new();
    let host = Arc::new(host);
    let encoder = Arc::new(RecordingEncoder::default());
    let client = EidClient::new(
        config,
        bus.clone(),
        Collaborators::new(host.clone(), encoder.clone()).with_poll_url_policy(policy),
    );
    client.start();
    Harness {
        client: Arc::new(client),
        bus,
        host,
        encoder,
    }
}

/// Waits for the next request the client posts for the extension.
pub async fn next_request(peer: &mut broadcast::Receiver<Message>) -> Message {
    loop {
        let message = peer.recv().await.unwrap();
        if message.tag().is_ok_and(|tag| tag.phase == Phase::Request) {
            return message;
        }
    }
}

/// Replies as the extension would.
pub fn reply(bus: &MessageBus, action: Action, phase: Phase) {
    bus.post(Message::new(action.tag(phase)));
}

/// Asserts that `expected` (within timer granularity) passed since `started` on the paused clock.
pub fn assert_elapsed(started: tokio::time::Instant, expected: Duration) {
    let elapsed = started.elapsed();
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "expected {expected:?} to elapse, got {elapsed:?}"
    );
}
