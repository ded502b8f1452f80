use std::{
    io, mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{self, RecvTimeoutError, TryRecvError},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread,
};
use tracing::{debug, error, info, warn};

use crate::clock::tick_interval;
use crate::comm::{encode, to_hex};
use crate::comm_config::LinkSettings;
use crate::data_structures::{ScaleConfig, SessionState};
use crate::error::{LinkError, SessionError};
use crate::link::{LinkOpener, SerialLink, SerialPortOpener};
use crate::sampler::{sample, SceneSource};

// -------------------- Runtime State --------------------

enum RuntimeCmd {
    Stop,
}

// Link + running flag behind one mutex: held for check-and-write or
// flip-and-close only, never across the tick sleep.
pub(crate) struct LinkSlot {
    link: Option<Box<dyn SerialLink>>,
    running: bool,
    failure: Option<String>,
}

impl LinkSlot {
    fn open(link: Box<dyn SerialLink>) -> Self {
        Self {
            link: Some(link),
            running: true,
            failure: None,
        }
    }

    // dropping the link closes the port; a second call finds nothing to close
    fn shut(&mut self) {
        self.running = false;
        self.link = None;
    }
}

struct RuntimeHandle {
    port_name: String,
    slot: Arc<Mutex<LinkSlot>>,
    tx: mpsc::Sender<RuntimeCmd>,
    join: thread::JoinHandle<()>,
}

impl RuntimeHandle {
    fn is_running(&self) -> bool {
        lock(&self.slot).running
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn stop_handle(h: RuntimeHandle) {
    lock(&h.slot).shut();
    let _ = h.tx.send(RuntimeCmd::Stop);
    if h.join.join().is_err() {
        error!("streaming worker for {} panicked", h.port_name);
    }
}

// -------------------- One tick --------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Sent(u32), // checksum of the written frame
    Unchanged,
    NoTarget,
    Closed,
}

// fresh per start, so the first tick of a run always writes
pub(crate) struct Transmitter {
    scale: ScaleConfig,
    last_checksum: Option<u32>,
}

impl Transmitter {
    pub(crate) fn new(scale: ScaleConfig) -> Self {
        Self {
            scale,
            last_checksum: None,
        }
    }

    #[cfg(test)]
    fn last_checksum(&self) -> Option<u32> {
        self.last_checksum
    }

    pub(crate) fn tick(
        &mut self,
        scene: &dyn SceneSource,
        slot: &Mutex<LinkSlot>,
    ) -> io::Result<TickOutcome> {
        let Some(transform) = scene.transform() else {
            return Ok(TickOutcome::NoTarget);
        };
        let frame = encode(&sample(&transform, &self.scale));
        let bytes = frame.as_bytes();

        let mut slot = lock(slot);
        if !slot.running {
            return Ok(TickOutcome::Closed);
        }
        let Some(link) = slot.link.as_mut() else {
            return Ok(TickOutcome::Closed);
        };
        if self.last_checksum == Some(frame.checksum) {
            return Ok(TickOutcome::Unchanged);
        }
        link.write_frame(bytes)?;
        debug!("[TX] {}", to_hex(bytes));
        self.last_checksum = Some(frame.checksum);
        Ok(TickOutcome::Sent(frame.checksum))
    }
}

// -------------------- Worker --------------------

// Closes the link however the worker leaves (stop, write error, panic).
struct ExitGuard<'a>(&'a Mutex<LinkSlot>);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        lock(self.0).shut();
    }
}

fn run_worker(
    port_name: String,
    scene: Arc<dyn SceneSource>,
    slot: Arc<Mutex<LinkSlot>>,
    mut transmitter: Transmitter,
    rx: mpsc::Receiver<RuntimeCmd>,
) {
    let _exit = ExitGuard(&slot);

    loop {
        match rx.try_recv() {
            Ok(RuntimeCmd::Stop) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        match transmitter.tick(scene.as_ref(), &slot) {
            Ok(TickOutcome::Closed) => break,
            Ok(TickOutcome::Sent(crc)) => debug!("frame {crc:08X} -> {}", port_name),
            Ok(TickOutcome::Unchanged | TickOutcome::NoTarget) => {}
            Err(source) => {
                let err = LinkError::Write {
                    port: port_name.clone(),
                    source,
                };
                error!("{err}; stopping");
                let mut s = lock(&slot);
                s.failure = Some(err.to_string());
                s.shut();
                break;
            }
        }

        // doubles as the cancellation point: Stop wakes us immediately
        match rx.recv_timeout(tick_interval(scene.frame_rate())) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(RuntimeCmd::Stop) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    debug!("worker for {} exited", port_name);
}

// -------------------- Session --------------------

enum Runtime {
    Idle,
    // port open / settle delay in progress, lock released meanwhile
    Starting { id: u64, port_name: String },
    Live(RuntimeHandle),
}

// a stop during the settle delay cancels the pending start
pub struct StreamingSession<O: LinkOpener = SerialPortOpener> {
    opener: O,
    settings: LinkSettings,
    inner: Mutex<Runtime>,
    next_start: AtomicU64,
}

impl StreamingSession<SerialPortOpener> {
    pub fn serial(settings: LinkSettings) -> Self {
        Self::new(SerialPortOpener, settings)
    }
}

impl<O: LinkOpener> StreamingSession<O> {
    pub fn new(opener: O, settings: LinkSettings) -> Self {
        Self {
            opener,
            settings,
            inner: Mutex::new(Runtime::Idle),
            next_start: AtomicU64::new(0),
        }
    }

    pub fn start(
        &self,
        port_name: &str,
        scene: Arc<dyn SceneSource>,
        scale: ScaleConfig,
    ) -> Result<(), SessionError> {
        let id = self.next_start.fetch_add(1, Ordering::Relaxed);
        let dead = {
            let mut inner = lock(&self.inner);
            match &*inner {
                Runtime::Starting { port_name, .. } => {
                    debug!("already starting on {}, start ignored", port_name);
                    return Ok(());
                }
                Runtime::Live(h) if h.is_running() => {
                    debug!("already running on {}, start ignored", h.port_name);
                    return Ok(());
                }
                _ => {}
            }

            scale
                .validate()
                .map_err(|(channel, value)| SessionError::InvalidScale { channel, value })?;
            if scene.transform().is_none() {
                warn!("no object selected");
                return Err(SessionError::NoTarget);
            }

            mem::replace(
                &mut *inner,
                Runtime::Starting {
                    id,
                    port_name: port_name.to_string(),
                },
            )
        };
        // worker stopped itself after an I/O error; reap it before starting over
        if let Runtime::Live(old) = dead {
            stop_handle(old);
        }

        let link = match self.opener.open(port_name, &self.settings) {
            Ok(link) => link,
            Err(e) => {
                self.abandon(id);
                return Err(e.into());
            }
        };
        if !self.settings.settle.is_zero() {
            info!("waiting {:?} for {} to boot", self.settings.settle, port_name);
            thread::sleep(self.settings.settle);
        }

        let mut inner = lock(&self.inner);
        if !matches!(&*inner, Runtime::Starting { id: current, .. } if *current == id) {
            // stopped (and maybe restarted) while we slept; `link` drops here
            info!("start on {} cancelled", port_name);
            return Ok(());
        }

        let slot = Arc::new(Mutex::new(LinkSlot::open(link)));
        let (tx, rx) = mpsc::channel::<RuntimeCmd>();
        let worker_slot = slot.clone();
        let worker_port = port_name.to_string();
        let transmitter = Transmitter::new(scale);
        let join = match thread::Builder::new()
            .name(format!("stream {port_name}"))
            .spawn(move || run_worker(worker_port, scene, worker_slot, transmitter, rx))
        {
            Ok(join) => join,
            Err(e) => {
                *inner = Runtime::Idle;
                return Err(SessionError::Spawn(e));
            }
        };

        *inner = Runtime::Live(RuntimeHandle {
            port_name: port_name.to_string(),
            slot,
            tx,
            join,
        });
        info!("running on {}", port_name);
        Ok(())
    }

    fn abandon(&self, id: u64) {
        let mut inner = lock(&self.inner);
        if matches!(&*inner, Runtime::Starting { id: current, .. } if *current == id) {
            *inner = Runtime::Idle;
        }
    }

    pub fn stop(&self) {
        let old = mem::replace(&mut *lock(&self.inner), Runtime::Idle);
        match old {
            Runtime::Idle => {}
            Runtime::Starting { port_name, .. } => info!("cancelling start on {}", port_name),
            Runtime::Live(h) => {
                let port_name = h.port_name.clone();
                stop_handle(h);
                info!("stopped {}", port_name);
            }
        }
    }

    // a pending start counts as running so the control surface offers "stop"
    pub fn state(&self) -> SessionState {
        match &*lock(&self.inner) {
            Runtime::Starting { .. } => SessionState::Running,
            Runtime::Live(h) if h.is_running() => SessionState::Running,
            _ => SessionState::Idle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    pub fn port_name(&self) -> Option<String> {
        match &*lock(&self.inner) {
            Runtime::Starting { port_name, .. } => Some(port_name.clone()),
            Runtime::Live(h) if h.is_running() => Some(h.port_name.clone()),
            _ => None,
        }
    }

    // why the worker stopped on its own; cleared by the next start or stop
    pub fn last_failure(&self) -> Option<String> {
        match &*lock(&self.inner) {
            Runtime::Live(h) => lock(&h.slot).failure.clone(),
            _ => None,
        }
    }
}

impl<O: LinkOpener> Drop for StreamingSession<O> {
    fn drop(&mut self) {
        self.stop();
    }
}
