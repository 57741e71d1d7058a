#![allow(dead_code)]

use async_trait::async_trait;
use hrilagpt::llm::{ Gateway, GatewayError, HistoryTurn };
use parking_lot::Mutex;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

type TextFn = dyn Fn(&str) -> Result<String, GatewayError> + Send + Sync;

/// In-process gateway with scripted answers. When `gate` is set, text and
/// image calls wait for it before answering.
pub struct ScriptedGateway {
    text: Box<TextFn>,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
    histories: Mutex<Vec<Vec<HistoryTurn>>>,
    spoken: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn echo() -> Self {
        Self::answering(|prompt| Ok(format!("echo: {}", prompt)))
    }

    pub fn answering(
        text: impl Fn(&str) -> Result<String, GatewayError> + Send + Sync + 'static
    ) -> Self {
        Self {
            text: Box::new(text),
            gate: None,
            calls: AtomicUsize::new(0),
            histories: Mutex::new(Vec::new()),
            spoken: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &'static str) -> Self {
        Self::answering(move |_| Err(provider(message)))
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn histories(&self) -> Vec<Vec<HistoryTurn>> {
        self.histories.lock().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    async fn wait(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    async fn generate_text(
        &self,
        _model: &str,
        history: &[HistoryTurn],
        prompt: &str
    ) -> Result<String, GatewayError> {
        self.histories.lock().push(history.to_vec());
        self.wait().await;
        (self.text)(prompt)
    }

    async fn generate_image(&self, _prompt: &str) -> Result<String, GatewayError> {
        self.wait().await;
        Ok("data:image/png;base64,iVBORw0KGgo=".to_string())
    }

    async fn generate_speech(&self, text: &str) -> Result<String, GatewayError> {
        self.spoken.lock().push(text.to_string());
        Ok("data:audio/pcm;base64,AAD/fw==".to_string())
    }
}

/// An untyped provider failure carrying only its message.
pub fn provider(message: &str) -> GatewayError {
    GatewayError::Provider { status: 500, message: message.to_string() }
}

/// Yields until `check` holds.
pub async fn wait_until(check: impl Fn() -> bool) {
    for _ in 0..1000 {
        if check() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}

/// Awaits `fut`, failing the test instead of hanging when it never resolves.
pub async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time
        ::timeout(Duration::from_secs(5), fut).await
        .expect("timed out waiting on a gated call")
}
