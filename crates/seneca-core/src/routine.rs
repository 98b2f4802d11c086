//! Routine scripts: discovery, processes and supervision
//!
//! Routines are scripts that write result buffers while they run. The
//! supervisor starts them, watches for exit and reports the outcome on the
//! patch bus:
//!
//! - success: `'<name>' completed successfully.`
//! - failure: `'<name>' error: '<output>'.`
//!
//! together with an `adjust_routine_class` call so the routine list shows
//! its state.

use crate::bus::PatchBus;
use crate::config::SenecaConfig;
use crate::error::RoutineError;
use async_trait::async_trait;
use dashmap::DashMap;
use seneca_patch::{client, Patch};
use seneca_record::stable_id;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Environment variable telling a routine where to write its buffer
pub const PLOT_DATA_ENV: &str = "SENECA_PLOT_DATA";

/// A routine script known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineInfo {
    /// Stable DOM id, `f` followed by a digest of the name
    pub id: String,
    /// File name
    pub name: String,
    /// Full path
    pub path: PathBuf,
}

impl RoutineInfo {
    /// Routine `name` inside `dir`
    #[must_use]
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            id: stable_id("f", name),
            name: name.to_string(),
            path: dir.join(name),
        }
    }
}

/// Source of routine scripts
pub trait RoutineRegistry: Send + Sync {
    /// Known routines, sorted by name
    ///
    /// # Errors
    /// Returns [`RoutineError::Io`] if the registry cannot be read
    fn list(&self) -> Result<Vec<RoutineInfo>, RoutineError>;

    /// Look up a routine by id or file name
    ///
    /// # Errors
    /// Returns [`RoutineError::NotFound`] for unknown routines
    fn find(&self, id_or_name: &str) -> Result<RoutineInfo, RoutineError> {
        self.list()?
            .into_iter()
            .find(|r| r.id == id_or_name || r.name == id_or_name)
            .ok_or_else(|| RoutineError::NotFound(id_or_name.to_string()))
    }
}

/// File extension of routine scripts
pub const ROUTINE_EXTENSION: &str = "py";

/// Routines stored as script files in one directory
#[derive(Debug, Clone)]
pub struct DirRegistry {
    dir: PathBuf,
}

impl DirRegistry {
    /// Registry over `dir`, listing `.py` files
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Routine directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RoutineRegistry for DirRegistry {
    fn list(&self) -> Result<Vec<RoutineInfo>, RoutineError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ROUTINE_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names.iter().map(|n| RoutineInfo::new(&self.dir, n)).collect())
    }
}

/// How a routine process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutineExit {
    /// Clean exit
    Success,
    /// Non-zero exit or an error in the output
    Failed {
        /// Combined stdout and stderr
        output: String,
    },
}

impl RoutineExit {
    /// Classify a finished process
    #[must_use]
    pub fn from_output(success: bool, output: String) -> Self {
        if success && !output.contains("Error") {
            Self::Success
        } else {
            Self::Failed { output }
        }
    }
}

/// A running routine
#[async_trait]
pub trait RoutineProcess: Send {
    /// Launch the process
    async fn start(&mut self) -> Result<(), RoutineError>;

    /// Terminate the process
    async fn stop(&mut self) -> Result<(), RoutineError>;

    /// Suspend the process
    fn pause(&mut self) -> Result<(), RoutineError>;

    /// Continue a suspended process
    fn resume(&mut self) -> Result<(), RoutineError>;

    /// `Some` once the process has exited
    async fn poll(&mut self) -> Result<Option<RoutineExit>, RoutineError>;
}

/// Routine run as a child process of the server
pub struct LocalRoutine {
    info: RoutineInfo,
    interpreter: String,
    plot_data_dir: PathBuf,
    child: Option<Child>,
    output: Vec<JoinHandle<String>>,
}

impl LocalRoutine {
    /// Process for `info`, run with `interpreter`
    #[must_use]
    pub fn new(info: RoutineInfo, interpreter: impl Into<String>, plot_data_dir: impl Into<PathBuf>) -> Self {
        Self {
            info,
            interpreter: interpreter.into(),
            plot_data_dir: plot_data_dir.into(),
            child: None,
            output: Vec::new(),
        }
    }

    fn pid(&self) -> Result<u32, RoutineError> {
        self.child
            .as_ref()
            .and_then(Child::id)
            .ok_or_else(|| RoutineError::NotRunning(self.info.name.clone()))
    }

    #[cfg(unix)]
    fn signal(&self, signal: nix::sys::signal::Signal) -> Result<(), RoutineError> {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let pid = i32::try_from(self.pid()?).map_err(|e| RoutineError::Signal {
            name: self.info.name.clone(),
            reason: e.to_string(),
        })?;
        kill(Pid::from_raw(pid), signal).map_err(|e| RoutineError::Signal {
            name: self.info.name.clone(),
            reason: e.to_string(),
        })
    }

    async fn collect_output(&mut self) -> String {
        let mut output = String::new();
        for handle in self.output.drain(..) {
            match handle.await {
                Ok(text) => output.push_str(&text),
                Err(e) => warn!(error = %e, "routine output reader failed"),
            }
        }
        output
    }
}

fn read_pipe<R>(pipe: Option<R>) -> Option<JoinHandle<String>>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let mut pipe = pipe?;
    Some(tokio::spawn(async move {
        let mut bytes = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut bytes).await {
            debug!(error = %e, "routine pipe closed early");
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }))
}

#[async_trait]
impl RoutineProcess for LocalRoutine {
    async fn start(&mut self) -> Result<(), RoutineError> {
        if self.child.is_some() {
            return Err(RoutineError::AlreadyRunning(self.info.name.clone()));
        }
        let mut child = Command::new(&self.interpreter)
            .arg(&self.info.path)
            .env(PLOT_DATA_ENV, &self.plot_data_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RoutineError::Spawn {
                name: self.info.name.clone(),
                source,
            })?;
        self.output = [read_pipe(child.stdout.take()), read_pipe(child.stderr.take())]
            .into_iter()
            .flatten()
            .collect();
        debug!(routine = %self.info.name, pid = ?child.id(), "routine spawned");
        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), RoutineError> {
        let Some(mut child) = self.child.take() else {
            return Err(RoutineError::NotRunning(self.info.name.clone()));
        };
        child.kill().await?;
        self.output.clear();
        Ok(())
    }

    #[cfg(unix)]
    fn pause(&mut self) -> Result<(), RoutineError> {
        self.signal(nix::sys::signal::Signal::SIGSTOP)
    }

    #[cfg(unix)]
    fn resume(&mut self) -> Result<(), RoutineError> {
        self.signal(nix::sys::signal::Signal::SIGCONT)
    }

    #[cfg(not(unix))]
    fn pause(&mut self) -> Result<(), RoutineError> {
        Err(RoutineError::Signal {
            name: self.info.name.clone(),
            reason: "process suspension is not supported on this platform".to_string(),
        })
    }

    #[cfg(not(unix))]
    fn resume(&mut self) -> Result<(), RoutineError> {
        self.pause()
    }

    async fn poll(&mut self) -> Result<Option<RoutineExit>, RoutineError> {
        let Some(child) = self.child.as_mut() else {
            return Err(RoutineError::NotRunning(self.info.name.clone()));
        };
        let Some(status) = child.try_wait()? else {
            return Ok(None);
        };
        self.child = None;
        let output = self.collect_output().await;
        Ok(Some(RoutineExit::from_output(status.success(), output)))
    }
}

/// Builds the process for a routine
pub type Launcher = Arc<dyn Fn(&RoutineInfo) -> Box<dyn RoutineProcess> + Send + Sync>;

/// Run state shown for a routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutineState {
    /// Not running
    Idle,
    /// Process running
    Running,
    /// Process suspended
    Paused,
}

/// Routine with its run state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineStatus {
    /// Routine
    #[serde(flatten)]
    pub info: RoutineInfo,
    /// Current state
    pub state: RoutineState,
}

struct ActiveRoutine {
    info: RoutineInfo,
    process: Box<dyn RoutineProcess>,
    paused: bool,
}

type ActiveMap = DashMap<String, Arc<Mutex<ActiveRoutine>>>;

/// Starts routines and reports how they end
#[derive(Clone)]
pub struct RoutineSupervisor {
    registry: Arc<dyn RoutineRegistry>,
    launcher: Launcher,
    bus: PatchBus,
    active: Arc<ActiveMap>,
    poll_interval: Duration,
}

impl RoutineSupervisor {
    /// Supervisor launching processes with `launcher`
    #[must_use]
    pub fn new(registry: Arc<dyn RoutineRegistry>, launcher: Launcher, bus: PatchBus) -> Self {
        Self {
            registry,
            launcher,
            bus,
            active: Arc::new(DashMap::new()),
            poll_interval: Duration::from_millis(200),
        }
    }

    /// Supervisor running routines from `config.upload_dir` as local processes
    #[must_use]
    pub fn local(config: &SenecaConfig, bus: PatchBus) -> Self {
        let interpreter = config.interpreter.clone();
        let plot_data_dir = config.plot_data_dir.clone();
        let launcher: Launcher = Arc::new(move |info: &RoutineInfo| {
            Box::new(LocalRoutine::new(info.clone(), interpreter.clone(), plot_data_dir.clone()))
                as Box<dyn RoutineProcess>
        });
        Self::new(Arc::new(DirRegistry::new(&config.upload_dir)), launcher, bus)
    }

    /// Set how often running routines are checked for exit
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Patch bus used for reports
    #[must_use]
    pub fn bus(&self) -> &PatchBus {
        &self.bus
    }

    /// Known routines and their run state
    ///
    /// # Errors
    /// Propagates registry errors
    pub async fn list(&self) -> Result<Vec<RoutineStatus>, RoutineError> {
        let mut statuses = Vec::new();
        for info in self.registry.list()? {
            let state = match self.entry(&info.id) {
                Some(entry) => {
                    if entry.lock().await.paused {
                        RoutineState::Paused
                    } else {
                        RoutineState::Running
                    }
                }
                None => RoutineState::Idle,
            };
            statuses.push(RoutineStatus { info, state });
        }
        Ok(statuses)
    }

    fn entry(&self, id: &str) -> Option<Arc<Mutex<ActiveRoutine>>> {
        self.active.get(id).map(|e| Arc::clone(e.value()))
    }

    fn active_entry(&self, id_or_name: &str) -> Result<Arc<Mutex<ActiveRoutine>>, RoutineError> {
        let info = self.registry.find(id_or_name)?;
        self.entry(&info.id)
            .ok_or(RoutineError::NotRunning(info.name))
    }

    fn adjust_class(&self, id: &str, class: Option<&str>) {
        self.bus.publish(Patch::invoke(
            client::ADJUST_ROUTINE_CLASS,
            vec![json!(id), json!(class)],
        ));
    }

    /// Start a routine, or resume it when paused
    ///
    /// # Errors
    /// Returns [`RoutineError::NotFound`], [`RoutineError::AlreadyRunning`]
    /// or the process start error
    pub async fn run(&self, id_or_name: &str) -> Result<RoutineInfo, RoutineError> {
        let info = self.registry.find(id_or_name)?;
        if let Some(entry) = self.entry(&info.id) {
            if entry.lock().await.paused {
                self.resume(&info.id).await?;
                return Ok(info);
            }
            return Err(RoutineError::AlreadyRunning(info.name));
        }

        let mut process = (self.launcher)(&info);
        process.start().await?;
        let entry = Arc::new(Mutex::new(ActiveRoutine {
            info: info.clone(),
            process,
            paused: false,
        }));
        self.active.insert(info.id.clone(), Arc::clone(&entry));
        self.adjust_class(&info.id, Some("running"));
        info!(routine = %info.name, "routine started");

        tokio::spawn(self.clone().watch(info.id.clone(), entry));
        Ok(info)
    }

    /// Poll `entry` until its process exits, then report
    async fn watch(self, id: String, entry: Arc<Mutex<ActiveRoutine>>) {
        loop {
            tokio::time::sleep(self.poll_interval).await;
            let still_active = self
                .active
                .get(&id)
                .is_some_and(|current| Arc::ptr_eq(current.value(), &entry));
            if !still_active {
                return;
            }

            let mut routine = entry.lock().await;
            let outcome = match routine.process.poll().await {
                Ok(None) => continue,
                Ok(Some(exit)) => exit,
                Err(e) => RoutineExit::Failed {
                    output: e.to_string(),
                },
            };
            self.active
                .remove_if(&id, |_, current| Arc::ptr_eq(current, &entry));
            self.report(&routine.info, &outcome);
            return;
        }
    }

    fn report(&self, info: &RoutineInfo, exit: &RoutineExit) {
        match exit {
            RoutineExit::Success => {
                info!(routine = %info.name, "routine completed");
                self.adjust_class(&info.id, None);
                self.bus
                    .status(&format!("'{}' completed successfully.", info.name));
            }
            RoutineExit::Failed { output } => {
                warn!(routine = %info.name, "routine failed");
                self.adjust_class(&info.id, Some("error"));
                self.bus
                    .status(&format!("'{}' error: '{}'.", info.name, output.trim_end()));
            }
        }
    }

    /// Terminate a running routine
    ///
    /// # Errors
    /// Returns [`RoutineError::NotRunning`] if it is not running
    pub async fn stop(&self, id_or_name: &str) -> Result<(), RoutineError> {
        let entry = self.active_entry(id_or_name)?;
        let mut routine = entry.lock().await;
        self.active
            .remove_if(&routine.info.id, |_, current| Arc::ptr_eq(current, &entry));
        routine.process.stop().await?;
        self.adjust_class(&routine.info.id, None);
        self.bus
            .status(&format!("'{}' terminated successfully.", routine.info.name));
        info!(routine = %routine.info.name, "routine terminated");
        Ok(())
    }

    /// Suspend a running routine
    ///
    /// # Errors
    /// Returns [`RoutineError::NotRunning`] if it is not running
    pub async fn pause(&self, id_or_name: &str) -> Result<(), RoutineError> {
        let entry = self.active_entry(id_or_name)?;
        let mut routine = entry.lock().await;
        if routine.paused {
            return Ok(());
        }
        routine.process.pause()?;
        routine.paused = true;
        self.adjust_class(&routine.info.id, Some("paused"));
        self.bus.status(&format!("'{}' paused.", routine.info.name));
        Ok(())
    }

    /// Continue a paused routine
    ///
    /// # Errors
    /// Returns [`RoutineError::NotRunning`] if it is not running
    pub async fn resume(&self, id_or_name: &str) -> Result<(), RoutineError> {
        let entry = self.active_entry(id_or_name)?;
        let mut routine = entry.lock().await;
        if !routine.paused {
            return Ok(());
        }
        routine.process.resume()?;
        routine.paused = false;
        self.adjust_class(&routine.info.id, Some("running"));
        self.bus.status(&format!("'{}' resumed.", routine.info.name));
        Ok(())
    }
}
