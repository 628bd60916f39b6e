//! The main server loop.
//!
//! One thread drives the tick cadence: build the task batch for every active
//! session, schedule it on the worker pool, wait at the barrier, then drain
//! outbound payloads to the network adapter. Tick overruns are logged and the
//! next dt is clamped so a stall never turns into a simulation leap.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{info, warn};

use crate::config;
use crate::net::{load_maps, NetworkServer};
use crate::pool::{SessionPool, SessionTask};

/// Runtime options resolved from CLI, environment, and defaults.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub tcp_port: u16,
    pub udp_port: u16,
    /// Bind 0.0.0.0 instead of loopback.
    pub public: bool,
    pub assets_dir: PathBuf,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            tcp_port: config::DEFAULT_TCP_PORT,
            udp_port: config::DEFAULT_UDP_PORT,
            public: false,
            assets_dir: PathBuf::from("assets"),
        }
    }
}

pub struct GameServer {
    network: NetworkServer,
    pool: SessionPool,
    shutdown: Arc<AtomicBool>,
}

impl GameServer {
    /// Bind sockets, load configuration, start workers. Configuration
    /// failures abort startup.
    pub fn start(options: ServerOptions, shutdown: Arc<AtomicBool>) -> anyhow::Result<Self> {
        let maps = load_maps(&options.assets_dir)
            .with_context(|| format!("loading wave maps from {}", options.assets_dir.display()))?;
        info!(maps = maps.len(), "wave maps loaded");

        let network = NetworkServer::start(
            options.tcp_port,
            options.udp_port,
            options.public,
            maps,
            Arc::clone(&shutdown),
        )?;
        let pool = SessionPool::new(config::SESSION_WORKERS);

        Ok(Self {
            network,
            pool,
            shutdown,
        })
    }

    /// Run the tick loop until the shutdown flag trips, then wind down.
    pub fn run(self) -> anyhow::Result<()> {
        let tick_interval = Duration::from_secs_f32(config::TICK_INTERVAL);
        let mut last_tick = Instant::now();
        let mut timeout_check = Instant::now();

        info!(
            tick_rate = config::TICK_RATE,
            workers = self.pool.worker_count(),
            "server running"
        );

        while !self.shutdown.load(Ordering::Acquire) {
            let tick_start = Instant::now();
            let raw_dt = tick_start.duration_since(last_tick).as_secs_f32();
            last_tick = tick_start;
            // A stalled tick replays at most MAX_TICK_DT of simulated time.
            let dt = raw_dt.min(config::MAX_TICK_DT);

            // Batch every active session for the workers.
            let tasks: Vec<SessionTask> = {
                let sessions = self.network.shared.sessions.lock().unwrap();
                sessions
                    .values()
                    .map(|handle| SessionTask {
                        session: Arc::clone(&handle.session),
                        dt,
                    })
                    .collect()
            };
            self.pool.schedule_batch(tasks);
            self.pool.wait_for_completion();

            // Serial drain after the barrier.
            self.network.flush_outgoing();

            if timeout_check.elapsed().as_secs_f32() >= 1.0 {
                timeout_check = Instant::now();
                self.network.shared.reap_timed_out_clients();
            }

            let elapsed = tick_start.elapsed();
            if elapsed > tick_interval {
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_interval.as_millis() as u64,
                    "tick overran its budget"
                );
            } else {
                std::thread::sleep(tick_interval - elapsed);
            }
        }

        info!("shutdown requested, stopping");
        let malformed = self
            .network
            .shared
            .malformed_packets
            .load(Ordering::Relaxed);
        if malformed > 0 {
            info!(malformed, "malformed packets dropped this run");
        }
        self.network.shutdown();
        drop(self.pool);
        Ok(())
    }
}
