use crate::uci::{format_command, format_uci_move, parse_uci_message, UciMessage};
use crate::{
    find_engine_path, AnalysisRequest, AnalysisResult, EngineCommand, GoParams, MoveEvaluation,
    PvTable,
};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const MESSAGE_BUFFER: usize = 256;

/// Configuration for one engine process.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Explicit executable path. When set it must exist; no other engine is
    /// tried. When unset, [`crate::find_engine_path`] searches the usual places.
    pub path: Option<PathBuf>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub skill_level: Option<u8>,
    /// Bound on each `uciok`/`readyok` wait.
    pub handshake_timeout: Duration,
    /// How long `stop` and `quit` may take before the process is killed.
    pub stop_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: None,
            threads: Some(2),
            hash_mb: Some(128),
            skill_level: Some(20),
            handshake_timeout: Duration::from_secs(5),
            stop_grace: Duration::from_secs(1),
        }
    }
}

impl EngineConfig {
    /// `setoption` pairs sent once after `uciok`, clamped to engine limits.
    fn options(&self) -> Vec<(&'static str, String)> {
        let mut options = Vec::new();
        if let Some(threads) = self.threads {
            options.push(("Threads", threads.clamp(1, 512).to_string()));
        }
        if let Some(hash_mb) = self.hash_mb {
            options.push(("Hash", hash_mb.clamp(1, 33_554_432).to_string()));
        }
        if let Some(level) = self.skill_level {
            options.push(("Skill Level", level.min(20).to_string()));
        }
        options
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Ready,
    Analyzing,
    Dead,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("engine unavailable: {0}")]
    Unavailable(String),
    #[error("engine protocol error: {0}")]
    Protocol(String),
    #[error("engine process exited unexpectedly")]
    Crashed,
    #[error("session is {found:?}, expected {expected:?}")]
    InvalidState {
        expected: SessionState,
        found: SessionState,
    },
    #[error("position has no legal moves")]
    NoLegalMoves,
}

enum Wait {
    Message(UciMessage),
    Closed,
    TimedOut,
}

type EngineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One engine process speaking UCI. Serves a single analysis at a time;
/// `analyze` takes `&mut self`, so sharing requires external ownership hand-off.
pub struct EngineSession {
    id: u64,
    state: SessionState,
    config: EngineConfig,
    process: Option<Child>,
    stdin: EngineWriter,
    messages: mpsc::Receiver<UciMessage>,
    reader: JoinHandle<()>,
    engine_name: Option<String>,
    last_fen: Option<String>,
}

impl EngineSession {
    /// Spawn the engine executable. The session starts in [`SessionState::Starting`];
    /// call [`EngineSession::initialize`] before analyzing.
    #[tracing::instrument(level = "info", skip(config))]
    pub fn start(id: u64, config: EngineConfig) -> Result<Self, SessionError> {
        let path = find_engine_path(config.path.as_deref()).ok_or_else(|| {
            tracing::error!(session = id, "Engine executable not found");
            match &config.path {
                Some(path) => SessionError::Unavailable(format!(
                    "configured engine {} does not exist",
                    path.display()
                )),
                None => SessionError::Unavailable("engine executable not found".to_string()),
            }
        })?;
        tracing::info!(session = id, "Spawning engine at {:?}", path);

        let mut process = tokio::process::Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!(session = id, "Failed to spawn engine: {}", e);
                SessionError::Unavailable(format!("failed to spawn {}: {}", path.display(), e))
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| SessionError::Unavailable("engine has no stdin".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| SessionError::Unavailable("engine has no stdout".to_string()))?;

        let mut session = Self::attach(id, config, stdout, stdin);
        session.process = Some(process);
        Ok(session)
    }

    /// Build a session over an existing byte stream pair instead of a child process.
    pub fn attach<R, W>(id: u64, config: EngineConfig, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER);
        let reader = tokio::spawn(read_engine_output(id, reader, tx));
        Self {
            id,
            state: SessionState::Starting,
            config,
            process: None,
            stdin: Box::new(writer),
            messages: rx,
            reader,
            engine_name: None,
            last_fen: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Name reported by the engine via `id name`.
    pub fn engine_name(&self) -> Option<&str> {
        self.engine_name.as_deref()
    }

    /// OS process id, when backed by a child process that is still running.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(|p| p.id())
    }

    /// `uci` → `uciok`, engine options, `isready` → `readyok`.
    #[tracing::instrument(level = "debug", skip(self), fields(session = self.id))]
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::Starting)?;
        match self.handshake().await {
            Ok(()) => {
                self.state = SessionState::Ready;
                tracing::info!(
                    session = self.id,
                    engine = self.engine_name.as_deref().unwrap_or("unknown"),
                    "Engine ready"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session = self.id, "Engine initialization failed: {}", e);
                self.kill().await;
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<(), SessionError> {
        self.send(EngineCommand::Uci)
            .await
            .map_err(|e| SessionError::Unavailable(format!("failed to write to engine: {}", e)))?;

        let deadline = Instant::now() + self.config.handshake_timeout;
        loop {
            match self.next_message(Some(deadline)).await {
                Wait::Message(UciMessage::UciOk) => break,
                Wait::Message(UciMessage::Id { name, value }) if name == "name" => {
                    self.engine_name = Some(value);
                }
                Wait::Message(_) => {}
                Wait::Closed => {
                    return Err(SessionError::Unavailable(
                        "engine exited during handshake".to_string(),
                    ))
                }
                Wait::TimedOut => {
                    return Err(SessionError::Protocol("timed out waiting for uciok".to_string()))
                }
            }
        }

        for (name, value) in self.config.options() {
            tracing::debug!(session = self.id, "Setting {} to {}", name, value);
            self.send(EngineCommand::SetOption {
                name: name.to_string(),
                value: Some(value),
            })
            .await
            .map_err(|e| SessionError::Unavailable(format!("failed to write to engine: {}", e)))?;
        }

        self.sync_ready().await.map_err(|e| match e {
            SessionError::Crashed => {
                SessionError::Unavailable("engine exited during handshake".to_string())
            }
            other => other,
        })
    }

    /// Run one search and reconcile its output.
    ///
    /// Finishes on `bestmove`. When the request has a time limit and it passes
    /// without `bestmove`, `stop` is sent once and the session keeps waiting;
    /// bounding that wait is the caller's job.
    pub async fn analyze(&mut self, request: &AnalysisRequest) -> Result<AnalysisResult, SessionError> {
        self.analyze_with_progress(request, None).await
    }

    /// Like [`EngineSession::analyze`], and also sends the current ranking to
    /// `progress` each time an `info` line changes it.
    ///
    /// Updates are best effort: a full or closed channel drops them without
    /// affecting the search.
    #[tracing::instrument(
        level = "debug",
        skip(self, request, progress),
        fields(session = self.id, depth = request.depth(), multipv = request.multi_pv())
    )]
    pub async fn analyze_with_progress(
        &mut self,
        request: &AnalysisRequest,
        progress: Option<&mpsc::Sender<Vec<MoveEvaluation>>>,
    ) -> Result<AnalysisResult, SessionError> {
        self.expect_state(SessionState::Ready)?;
        self.state = SessionState::Analyzing;

        let outcome = self.run_search(request, progress).await;
        match &outcome {
            Ok(_) | Err(SessionError::NoLegalMoves) => self.state = SessionState::Ready,
            Err(e) => {
                tracing::warn!(session = self.id, fen = request.fen(), "Analysis failed: {}", e);
                self.kill().await;
            }
        }
        outcome
    }

    async fn run_search(
        &mut self,
        request: &AnalysisRequest,
        progress: Option<&mpsc::Sender<Vec<MoveEvaluation>>>,
    ) -> Result<AnalysisResult, SessionError> {
        if self.last_fen.as_deref() != Some(request.fen()) {
            self.send(EngineCommand::UciNewGame)
                .await
                .map_err(|_| SessionError::Crashed)?;
            self.last_fen = Some(request.fen().to_string());
        }
        self.send(EngineCommand::SetOption {
            name: "MultiPV".to_string(),
            value: Some(request.multi_pv().to_string()),
        })
        .await
        .map_err(|_| SessionError::Crashed)?;
        // Anything still buffered from earlier conversations arrives before readyok.
        self.sync_ready().await?;

        let movetime = (request.time_limit_ms() > 0).then_some(request.time_limit_ms());
        self.send(EngineCommand::SetPosition {
            fen: request.fen().to_string(),
        })
        .await
        .map_err(|_| SessionError::Crashed)?;
        self.send(EngineCommand::Go(GoParams {
            depth: Some(request.depth()),
            movetime,
            infinite: false,
        }))
        .await
        .map_err(|_| SessionError::Crashed)?;
        tracing::info!(session = self.id, fen = request.fen(), "Search started");

        let mut table = PvTable::new(request.multi_pv());
        let mut soft_deadline = movetime.map(|ms| Instant::now() + Duration::from_millis(ms));
        loop {
            match self.next_message(soft_deadline).await {
                Wait::Message(UciMessage::Info(info)) => {
                    if !table.apply(&info) {
                        continue;
                    }
                    if let Some(tx) = progress {
                        if let Err(e) = tx.try_send(table.snapshot(request.side_to_move())) {
                            tracing::trace!(session = self.id, "Progress update dropped: {}", e);
                        }
                    }
                }
                Wait::Message(UciMessage::BestMove { mv: Some(mv), .. }) => {
                    let best = format_uci_move(&mv);
                    let evaluations = table.finalize(&best, request.side_to_move());
                    let result = AnalysisResult::new(request.clone(), evaluations);
                    tracing::debug!(
                        session = self.id,
                        best_move = %result.best_move,
                        lines = result.evaluations.len(),
                        "Search finished"
                    );
                    return Ok(result);
                }
                Wait::Message(UciMessage::BestMove { mv: None, .. }) => {
                    return Err(SessionError::NoLegalMoves);
                }
                Wait::Message(other) => {
                    tracing::trace!(session = self.id, "Ignoring message during search: {:?}", other);
                }
                Wait::Closed => return Err(SessionError::Crashed),
                Wait::TimedOut => {
                    tracing::debug!(session = self.id, "Time limit reached without bestmove, sending stop");
                    self.send(EngineCommand::Stop)
                        .await
                        .map_err(|_| SessionError::Crashed)?;
                    soft_deadline = None;
                }
            }
        }
    }

    /// Ask the engine to stop searching. If it does not answer with `bestmove`
    /// within the grace period the process is killed. Safe in any state.
    pub async fn stop(&mut self) {
        match self.state {
            SessionState::Dead => {}
            SessionState::Analyzing => {
                if self.send(EngineCommand::Stop).await.is_err() {
                    self.kill().await;
                    return;
                }
                let deadline = Instant::now() + self.config.stop_grace;
                loop {
                    match self.next_message(Some(deadline)).await {
                        Wait::Message(UciMessage::BestMove { .. }) => {
                            self.state = SessionState::Ready;
                            return;
                        }
                        Wait::Message(_) => {}
                        Wait::Closed | Wait::TimedOut => {
                            tracing::warn!(session = self.id, "Engine did not stop in time, killing");
                            self.kill().await;
                            return;
                        }
                    }
                }
            }
            SessionState::Starting | SessionState::Ready => {
                let _ = self.send(EngineCommand::Stop).await;
            }
        }
    }

    /// Forcibly terminate the engine. Safe in any state.
    pub async fn kill(&mut self) {
        if let Some(process) = self.process.as_mut() {
            if let Err(e) = process.kill().await {
                tracing::debug!(session = self.id, "Kill after exit: {}", e);
            }
        }
        let _ = self.stdin.shutdown().await;
        self.reader.abort();
        self.state = SessionState::Dead;
    }

    /// Send `quit`, give the engine the grace period to exit, then kill it.
    pub async fn shutdown(mut self) {
        if self.state != SessionState::Dead {
            let _ = self.send(EngineCommand::Quit).await;
        }
        if let Some(process) = self.process.as_mut() {
            if tokio::time::timeout(self.config.stop_grace, process.wait())
                .await
                .is_err()
            {
                tracing::debug!(session = self.id, "Engine ignored quit, killing");
            }
        }
        self.kill().await;
        tracing::debug!(session = self.id, "Session shut down");
    }

    /// Ready for another analysis and the process has not exited.
    pub fn is_healthy(&mut self) -> bool {
        if self.state != SessionState::Ready || self.reader.is_finished() {
            return false;
        }
        match self.process.as_mut() {
            Some(process) => matches!(process.try_wait(), Ok(None)),
            None => true,
        }
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                expected,
                found: self.state,
            })
        }
    }

    async fn send(&mut self, cmd: EngineCommand) -> std::io::Result<()> {
        let line = format_command(&cmd);
        tracing::trace!(session = self.id, "UCI >> {}", line);
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await
    }

    async fn sync_ready(&mut self) -> Result<(), SessionError> {
        self.send(EngineCommand::IsReady)
            .await
            .map_err(|_| SessionError::Crashed)?;
        let deadline = Instant::now() + self.config.handshake_timeout;
        loop {
            match self.next_message(Some(deadline)).await {
                Wait::Message(UciMessage::ReadyOk) => return Ok(()),
                Wait::Message(_) => {}
                Wait::Closed => return Err(SessionError::Crashed),
                Wait::TimedOut => {
                    return Err(SessionError::Protocol("timed out waiting for readyok".to_string()))
                }
            }
        }
    }

    async fn next_message(&mut self, deadline: Option<Instant>) -> Wait {
        let received = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, self.messages.recv()).await {
                Ok(received) => received,
                Err(_) => return Wait::TimedOut,
            },
            None => self.messages.recv().await,
        };
        match received {
            Some(msg) => Wait::Message(msg),
            None => Wait::Closed,
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Forward parsed engine output until EOF. Dropping the sender is how the
/// session learns the engine is gone.
async fn read_engine_output<R: AsyncRead + Unpin>(id: u64, stdout: R, tx: mpsc::Sender<UciMessage>) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                tracing::debug!(session = id, "Engine stdout EOF");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                tracing::trace!(session = id, "UCI << {}", trimmed);
                match parse_uci_message(trimmed) {
                    Ok(msg) => {
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::trace!(session = id, "Skipping engine line: {}", e),
                }
            }
            Err(e) => {
                tracing::warn!(session = id, "Error reading engine stdout: {}", e);
                break;
            }
        }
    }
}
