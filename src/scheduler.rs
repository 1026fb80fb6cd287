//! Timer-driven simulation on a dedicated driver thread.
//!
//! The driver thread is the only writer of walk state and error history. Callers send control
//! commands over a bounded channel and wait for an acknowledgement; readers take immutable
//! [`Snapshot`]s that are republished after every complete tick or command.
//!
//! The timer is a single `Option<Instant>` deadline owned by the driver, so there is never more
//! than one armed timer: `start` while armed is a no-op, and `pause`/`reset`/`retarget`/
//! `replace_graph` clear the deadline before touching state.

use crate::graph::UndirectedGraph;
use crate::simulation::{check_tick_interval, Simulation, SimulationConfig, Snapshot, Topology};
use crate::{Error, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

const CONTROL_QUEUE_CAPACITY: usize = 64;

#[derive(Debug)]
enum Command {
    Start,
    Pause,
    Reset,
    Retarget(String),
    SetTickInterval(u64),
    ReplaceGraph(Arc<Topology>),
    Shutdown,
}

#[derive(Debug)]
struct Request {
    command: Command,
    reply: Sender<Result<()>>,
}

struct Driver {
    sim: Simulation,
    interval: Duration,
    deadline: Option<Instant>,
    published: Arc<RwLock<Arc<Snapshot>>>,
}

impl Driver {
    fn run(mut self, rx: Receiver<Request>) {
        loop {
            let request = match self.deadline {
                Some(deadline) => match rx.recv_deadline(deadline) {
                    Ok(request) => Some(request),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(request) => Some(request),
                    Err(_) => break,
                },
            };

            match request {
                None => self.fire(),
                Some(Request { command, reply }) => {
                    let stop = matches!(command, Command::Shutdown);
                    let result = self.handle(command);
                    self.publish();
                    let _ = reply.send(result);
                    if stop {
                        break;
                    }
                }
            }
        }
        debug!("simulation driver stopped");
    }

    fn fire(&mut self) {
        self.sim.tick();
        self.deadline = Some(Instant::now() + self.interval);
        self.publish();
    }

    fn handle(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Start => {
                if self.deadline.is_none() {
                    self.deadline = Some(Instant::now() + self.interval);
                    debug!(interval_ms = self.interval.as_millis() as u64, "simulation started");
                }
            }
            Command::Pause => {
                if self.deadline.take().is_some() {
                    debug!(steps = self.sim.state().total_steps, "simulation paused");
                }
            }
            Command::Reset => {
                self.deadline = None;
                self.sim.reset();
                debug!(start = self.sim.start_id(), "simulation reset");
            }
            Command::Retarget(start) => {
                if self.sim.topology().graph().index_of(&start).is_none() {
                    return Err(Error::UnknownNode(start));
                }
                self.deadline = None;
                self.sim.retarget(&start)?;
                debug!(start = %start, "simulation retargeted");
            }
            Command::SetTickInterval(ms) => {
                check_tick_interval(ms)?;
                self.interval = Duration::from_millis(ms);
            }
            Command::ReplaceGraph(topology) => {
                self.deadline = None;
                let version = topology.version();
                self.sim.replace_topology(topology);
                debug!(version, start = self.sim.start_id(), "graph replaced");
            }
            Command::Shutdown => {
                self.deadline = None;
                debug!(steps = self.sim.state().total_steps, "simulation shutting down");
            }
        }
        Ok(())
    }

    fn publish(&self) {
        let snapshot = self.sim.snapshot(self.deadline.is_some(), self.interval.as_millis() as u64);
        *self.published.write() = Arc::new(snapshot);
    }
}

/// Handle to a simulation running on its own driver thread.
///
/// Control calls block until the driver has applied them, so the next [`snapshot`] already
/// reflects the command. Dropping the handle stops the driver.
///
/// [`snapshot`]: SimulationScheduler::snapshot
pub struct SimulationScheduler {
    config: SimulationConfig,
    tx: Sender<Request>,
    published: Arc<RwLock<Arc<Snapshot>>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl SimulationScheduler {
    /// Spawn a stopped simulation over `graph`, starting at `start`.
    pub fn new(graph: UndirectedGraph, start: &str, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let topology = Arc::new(Topology::new(graph, config.stationary()));
        Self::with_topology(topology, start, config)
    }

    pub fn with_topology(topology: Arc<Topology>, start: &str, config: SimulationConfig) -> Result<Self> {
        let sim = Simulation::new(topology, start, &config)?;
        let published = Arc::new(RwLock::new(Arc::new(sim.snapshot(false, config.tick_interval_ms))));

        let (tx, rx) = bounded::<Request>(CONTROL_QUEUE_CAPACITY);
        let driver = Driver {
            sim,
            interval: Duration::from_millis(config.tick_interval_ms),
            deadline: None,
            published: Arc::clone(&published),
        };
        let join = thread::Builder::new()
            .name("walkconv-driver".to_string())
            .spawn(move || driver.run(rx))
            .map_err(Error::Spawn)?;

        Ok(Self { config, tx, published, join: Mutex::new(Some(join)) })
    }

    /// Arm the tick timer. No-op while running.
    pub fn start(&self) -> Result<()> {
        self.send(Command::Start)
    }

    /// Cancel the tick timer, keeping walk state. No-op while stopped.
    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    /// Stop, then restart the walk from its start node with cleared counts and history.
    pub fn reset(&self) -> Result<()> {
        self.send(Command::Reset)
    }

    /// Stop, then restart the walk from `start`.
    pub fn retarget(&self, start: &str) -> Result<()> {
        self.send(Command::Retarget(start.to_string()))
    }

    /// Change the tick interval. An already armed tick keeps its deadline.
    pub fn set_tick_interval_ms(&self, ms: u64) -> Result<()> {
        self.send(Command::SetTickInterval(ms))
    }

    /// Solve \(\pi\) for `graph` on the calling thread, then swap graph and \(\pi\) in together.
    ///
    /// The simulation is stopped and reset.
    pub fn replace_graph(&self, graph: UndirectedGraph) -> Result<()> {
        let topology = Arc::new(Topology::new(graph, self.config.stationary()));
        self.send(Command::ReplaceGraph(topology))
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.published.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.snapshot().running
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Stop the driver thread. Later control calls return [`Error::Disconnected`].
    pub fn shutdown(&self) {
        let _ = self.send(Command::Shutdown);
        if let Some(handle) = self.join.lock().take() {
            let _ = handle.join();
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.tx.send(Request { command, reply: reply_tx }).map_err(|_| Error::Disconnected)?;
        reply_rx.recv().map_err(|_| Error::Disconnected)?
    }
}

impl Drop for SimulationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
