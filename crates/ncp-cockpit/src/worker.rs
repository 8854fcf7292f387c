use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use ncp_core::{
    load_persisted_inventory, CommandDispatcher, CommandResult, Credentials, DeviceRecord,
    DeviceType, InventorySync, JsonFileStore, NcpConfig,
};
use ncp_sot::HttpSourceFactory;
use ncp_ssh::SshConnector;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// What the cockpit needs from the outside world.
pub trait Backend: Send + Sync + 'static {
    fn execute(&self, line: &str) -> CommandResult;
    fn sync(&self, source: &str, url: &str, token: &str) -> bool;
    fn inventory(&self) -> Vec<DeviceRecord>;
}

pub struct LiveBackend {
    dispatcher: CommandDispatcher<SshConnector, SshConnector>,
    sync: InventorySync<HttpSourceFactory, JsonFileStore>,
}

impl LiveBackend {
    pub fn new(config: &NcpConfig) -> Result<Self> {
        let connector =
            SshConnector::new(config.ssh.clone()).context("Failed to load parser templates")?;
        let dispatcher =
            CommandDispatcher::new(connector.clone(), connector, Credentials::from_env())
                .with_device_type(config.ssh.device_type.clone().map(DeviceType::new));
        let sync = InventorySync::new(
            HttpSourceFactory::new(config.sot.clone()),
            JsonFileStore::new(config.inventory_path()),
        );
        Ok(Self { dispatcher, sync })
    }
}

impl Backend for LiveBackend {
    fn execute(&self, line: &str) -> CommandResult {
        self.dispatcher.execute(line)
    }

    fn sync(&self, source: &str, url: &str, token: &str) -> bool {
        self.sync.sync(source, url, token)
    }

    fn inventory(&self) -> Vec<DeviceRecord> {
        load_persisted_inventory(self.sync.store())
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Executed {
        generation: u64,
        line: String,
        result: CommandResult,
    },
    Synced {
        generation: u64,
        ok: bool,
        inventory: Vec<DeviceRecord>,
        finished_at: DateTime<Local>,
    },
}

/// Runs backend calls off the UI thread. Commands go through one long-lived
/// thread, so at most one device session is open at a time; lines queued
/// behind a running command are skipped in favour of the newest. Results
/// from superseded jobs are dropped when they arrive.
pub struct Worker {
    backend: Arc<dyn Backend>,
    jobs: Sender<(u64, String)>,
    tx: Sender<Outcome>,
    rx: Receiver<Outcome>,
    command_generation: u64,
    sync_generation: u64,
    command_pending: bool,
    sync_pending: bool,
}

impl Worker {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (tx, rx) = mpsc::channel();
        let (jobs, queue) = mpsc::channel();
        {
            let backend = backend.clone();
            let tx = tx.clone();
            thread::spawn(move || command_loop(backend.as_ref(), queue, tx));
        }
        Self {
            backend,
            jobs,
            tx,
            rx,
            command_generation: 0,
            sync_generation: 0,
            command_pending: false,
            sync_pending: false,
        }
    }

    pub fn inventory(&self) -> Vec<DeviceRecord> {
        self.backend.inventory()
    }

    pub fn command_pending(&self) -> bool {
        self.command_pending
    }

    pub fn sync_pending(&self) -> bool {
        self.sync_pending
    }

    pub fn submit_command(&mut self, line: &str) -> u64 {
        self.command_generation += 1;
        self.command_pending = true;
        let generation = self.command_generation;
        debug!(generation, line, "command submitted");
        if self.jobs.send((generation, line.to_string())).is_err() {
            warn!(generation, "command thread is gone");
            self.command_pending = false;
        }
        generation
    }

    pub fn submit_sync(&mut self, source: &str, url: &str, token: &str) -> u64 {
        self.sync_generation += 1;
        self.sync_pending = true;
        let generation = self.sync_generation;
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        let (source, url, token) = (source.to_string(), url.to_string(), token.to_string());
        debug!(generation, source = %source, "sync submitted");
        thread::spawn(move || {
            let ok = backend.sync(&source, &url, &token);
            let inventory = backend.inventory();
            let _ = tx.send(Outcome::Synced {
                generation,
                ok,
                inventory,
                finished_at: Local::now(),
            });
        });
        generation
    }

    /// Drains finished jobs, keeping only current ones.
    pub fn poll(&mut self) -> Vec<Outcome> {
        let mut current = Vec::new();
        while let Ok(outcome) = self.rx.try_recv() {
            if self.accept(&outcome) {
                current.push(outcome);
            } else {
                debug!("dropping superseded result");
            }
        }
        current
    }

    fn accept(&mut self, outcome: &Outcome) -> bool {
        match outcome {
            Outcome::Executed { generation, .. } if *generation == self.command_generation => {
                self.command_pending = false;
                true
            }
            Outcome::Synced { generation, .. } if *generation == self.sync_generation => {
                self.sync_pending = false;
                true
            }
            _ => false,
        }
    }
}

fn command_loop(backend: &dyn Backend, queue: Receiver<(u64, String)>, tx: Sender<Outcome>) {
    while let Ok(mut job) = queue.recv() {
        while let Ok(newer) = queue.try_recv() {
            debug!(generation = job.0, "skipping superseded command");
            job = newer;
        }
        let (generation, line) = job;
        let result = backend.execute(&line);
        let sent = tx.send(Outcome::Executed {
            generation,
            line,
            result,
        });
        if sent.is_err() {
            break;
        }
    }
}
