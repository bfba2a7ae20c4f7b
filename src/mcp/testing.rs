//! In-memory doubles for the session traits, shared by the unit tests.

use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

use super::credentials::{AuthMethod, ConnectionDescriptor};
use super::error::GatewayError;
use super::session::{
    ChannelEvent, ExecChannel, FileTransfer, RemoteSession, SessionFactory, TransferReader,
    TransferWriter,
};

pub(crate) fn descriptor() -> ConnectionDescriptor {
    ConnectionDescriptor::new("test.host", 22, "tester", AuthMethod::Password("pw".into()))
        .expect("valid descriptor")
}

/// Canned behaviour of one command.
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    stdout: String,
    stderr: String,
    exit_code: u32,
    delay: Duration,
}

impl Script {
    pub(crate) fn ok(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn failing(exit_code: u32, stderr: &str) -> Self {
        Self {
            stderr: stderr.to_string(),
            exit_code,
            ..Default::default()
        }
    }

    pub(crate) fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_string();
        self
    }

    pub(crate) fn with_exit(mut self, exit_code: u32) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// Delay before the first event is delivered.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn events(&self) -> Vec<ChannelEvent> {
        let mut events = Vec::new();
        if !self.stdout.is_empty() {
            events.push(ChannelEvent::Stdout(self.stdout.as_bytes().to_vec()));
        }
        events.push(ChannelEvent::ExitStatus(self.exit_code));
        events.push(ChannelEvent::Eof);
        // stderr tail lands between EOF and close
        if !self.stderr.is_empty() {
            events.push(ChannelEvent::Stderr(self.stderr.as_bytes().to_vec()));
        }
        events.push(ChannelEvent::Close);
        events
    }
}

/// Exec channel fed from an mpsc queue.
pub(crate) struct FakeExecChannel {
    delay: Option<Duration>,
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl FakeExecChannel {
    /// A channel driven by the returned sender.
    pub(crate) fn pair() -> (mpsc::UnboundedSender<ChannelEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { delay: None, rx })
    }

    pub(crate) fn from_events(events: Vec<ChannelEvent>, delay: Duration) -> Self {
        let (tx, mut channel) = Self::pair();
        for event in events {
            let _ = tx.send(event);
        }
        channel.delay = (!delay.is_zero()).then_some(delay);
        channel
    }
}

#[async_trait]
impl ExecChannel for FakeExecChannel {
    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if let Some(delay) = self.delay.take() {
            tokio::time::sleep(delay).await;
        }
        self.rx.recv().await
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

/// How a faulty remote file misbehaves once its readable prefix is used up.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ReadFault {
    /// The read fails as if the channel was torn down.
    Reset,
    /// The read never completes.
    Stall,
}

struct FaultyReader {
    fault: ReadFault,
}

impl AsyncRead for FaultyReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.fault {
            ReadFault::Reset => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "channel reset",
            ))),
            ReadFault::Stall => Poll::Pending,
        }
    }
}

type FaultyFiles = Arc<Mutex<HashMap<String, (Vec<u8>, ReadFault)>>>;

/// Remote session backed by scripts and an in-memory file system.
#[derive(Default)]
pub(crate) struct FakeSession {
    scripts: Mutex<HashMap<String, Script>>,
    executed: Mutex<Vec<String>>,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    faulty_files: FaultyFiles,
    exec_failure: Mutex<Option<String>>,
    exec_open_delay: Duration,
    closed: AtomicBool,
    close_calls: AtomicUsize,
    transfer_closes: Arc<AtomicUsize>,
}

impl FakeSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_script(self, command: &str, script: Script) -> Self {
        self.set_script(command, script);
        self
    }

    pub(crate) fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        self
    }

    /// A file that yields `prefix` and then fails the way `fault` says.
    pub(crate) fn with_faulty_file(self, path: &str, prefix: &[u8], fault: ReadFault) -> Self {
        self.faulty_files
            .lock()
            .unwrap()
            .insert(path.to_string(), (prefix.to_vec(), fault));
        self
    }

    /// Make opening an exec channel take this long.
    pub(crate) fn with_exec_open_delay(mut self, delay: Duration) -> Self {
        self.exec_open_delay = delay;
        self
    }

    pub(crate) fn set_script(&self, command: &str, script: Script) {
        self.scripts
            .lock()
            .unwrap()
            .insert(command.to_string(), script);
    }

    pub(crate) fn fail_exec(&self, message: &str) {
        *self.exec_failure.lock().unwrap() = Some(message.to_string());
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub(crate) fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    /// Simulate the transport dropping.
    pub(crate) fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// How many transfer sub-sessions have been closed.
    pub(crate) fn transfer_closes(&self) -> usize {
        self.transfer_closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn open_exec(&self, command: &str) -> Result<Box<dyn ExecChannel>, String> {
        if !self.exec_open_delay.is_zero() {
            tokio::time::sleep(self.exec_open_delay).await;
        }
        if self.is_closed() {
            return Err("Failed to open channel: session closed".to_string());
        }
        if let Some(message) = self.exec_failure.lock().unwrap().clone() {
            return Err(message);
        }

        self.executed.lock().unwrap().push(command.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(command)
            .cloned()
            .unwrap_or_default();

        Ok(Box::new(FakeExecChannel::from_events(
            script.events(),
            script.delay,
        )))
    }

    async fn open_transfer(&self) -> Result<Box<dyn FileTransfer>, String> {
        if self.is_closed() {
            return Err("Failed to open channel: session closed".to_string());
        }
        Ok(Box::new(FakeTransfer {
            files: self.files.clone(),
            faulty_files: self.faulty_files.clone(),
            closes: self.transfer_closes.clone(),
        }))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), String> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// File transfer over a shared in-memory map.
struct FakeTransfer {
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    faulty_files: FaultyFiles,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl FileTransfer for FakeTransfer {
    async fn open_read(&self, path: &str) -> Result<TransferReader, String> {
        let faulty = self.faulty_files.lock().unwrap().get(path).cloned();
        if let Some((prefix, fault)) = faulty {
            return Ok(Box::pin(
                io::Cursor::new(prefix).chain(FaultyReader { fault }),
            ));
        }

        let content = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| format!("No such file: {}", path))?;
        Ok(Box::pin(io::Cursor::new(content)))
    }

    async fn open_write(&self, path: &str) -> Result<TransferWriter, String> {
        if path.starts_with("/readonly/") {
            return Err(format!("Permission denied: {}", path));
        }
        Ok(Box::pin(FakeWriter {
            path: path.to_string(),
            buffer: Vec::new(),
            files: self.files.clone(),
        }))
    }

    async fn close(&self) -> Result<(), String> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Buffers writes and commits them to the map on shutdown.
struct FakeWriter {
    path: String,
    buffer: Vec<u8>,
    files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl AsyncWrite for FakeWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let content = std::mem::take(&mut self.buffer);
        let path = self.path.clone();
        self.files.lock().unwrap().insert(path, content);
        Poll::Ready(Ok(()))
    }
}

type SessionBuilder = Box<dyn Fn() -> FakeSession + Send + Sync>;

/// Session factory that counts `open` calls.
pub(crate) struct FakeFactory {
    opens: AtomicUsize,
    failures_remaining: AtomicUsize,
    delay: Duration,
    build: SessionBuilder,
    opened: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeFactory {
    pub(crate) fn new() -> Self {
        Self::with_sessions(FakeSession::new)
    }

    pub(crate) fn with_sessions(build: impl Fn() -> FakeSession + Send + Sync + 'static) -> Self {
        Self {
            opens: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
            delay: Duration::ZERO,
            build: Box::new(build),
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Make each `open` take this long, widening race windows.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the first `count` opens with a connection error.
    pub(crate) fn failing_first(self, count: usize) -> Self {
        self.failures_remaining.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn opened(&self) -> Vec<Arc<FakeSession>> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(
        &self,
        _descriptor: &ConnectionDescriptor,
    ) -> Result<Arc<dyn RemoteSession>, GatewayError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(GatewayError::connection("Failed to connect: Connection refused"));
        }

        let session = Arc::new((self.build)());
        self.opened.lock().unwrap().push(session.clone());
        Ok(session as Arc<dyn RemoteSession>)
    }
}
