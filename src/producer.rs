// ABOUTME: Reads stdin, carves frames, publishes them, paces itself, accepts clients, drives shutdown
// ABOUTME: Runs on the thread that started the process; every client gets its own worker thread

use std::io::Read;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::auth::AuthConfig;
use crate::clock::{now_secs, Ewma};
use crate::config::Config;
use crate::error::StartupError;
use crate::frame::{FrameAccumulator, FrameEvent};
use crate::hub::FrameHub;
use crate::session;

/// Multiplier and clamp bounds for the adaptive pacing sleep, named per
/// the tuning parameters rather than left as magic numbers.
const PACING_SLEEP_MULTIPLIER: f64 = 4.0;
const PACING_SLEEP_MIN_US: f64 = 1000.0;
const PACING_SLEEP_MAX_US: f64 = 50_000.0;

/// Runs the producer loop to completion: reads stdin until EOF or
/// shutdown, carving and publishing frames, pacing itself against the
/// slowest connected client, and accepting new TCP connections right
/// after each publication. Returns once every worker has been joined.
pub fn run(config: &Config, hub: Arc<FrameHub>, auth: Arc<AuthConfig>) -> Result<(), StartupError> {
    let listener = TcpListener::bind(config.listen_addr).map_err(|source| StartupError::Bind {
        addr: config.listen_addr,
        source,
    })?;
    listener
        .set_nonblocking(true)
        .map_err(StartupError::Nonblocking)?;
    info!(addr = %config.listen_addr, "listening");

    let client_timeout = Duration::from_secs(config.client_timeout_secs);
    let mut accumulator = FrameAccumulator::new(config.separator.clone());
    let mut input_ewma = Ewma::new();
    let mut last_frame_time = now_secs();
    let mut read_buf = vec![0u8; crate::frame::INPUT_READ_CHUNK];
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    let mut stdin = std::io::stdin();

    while hub.is_running() {
        let n = match stdin.read(&mut read_buf) {
            Ok(0) => {
                info!("input: end of stream");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => break,
            Err(e) => {
                error!("input read failed: {e}");
                return Err(StartupError::StdinRead(e));
            }
        };

        match accumulator.feed(&read_buf[..n]) {
            FrameEvent::Overflow => {
                error!("input: accumulator exceeded capacity, discarding buffer");
            }
            FrameEvent::Pending => {}
            FrameEvent::Ready(frame) => {
                hub.publish(&frame);

                let now = now_secs();
                let interval = input_ewma.update(now - last_frame_time);
                last_frame_time = now;
                debug!(fps = 1.0 / interval.max(f64::EPSILON), "current fps");

                pace(&hub, interval);

                handles.retain(|h| !h.is_finished());
                if config.max_clients == 0 || hub.num_clients() < config.max_clients {
                    accept_one(&listener, &hub, &auth, client_timeout, &mut handles);
                }
            }
        }
    }

    hub.shutdown();
    for handle in handles {
        let _ = handle.join();
    }
    info!("bye!");
    Ok(())
}

/// Sleeps if the input is outrunning the slowest-acceptable client,
/// bounded so transient jitter can't collapse latency to zero or stall
/// it unboundedly.
fn pace(hub: &FrameHub, input_interval: f64) {
    let Some(min_client_interval) = hub.snapshot_min_interval() else {
        return;
    };
    let adjust_us = (min_client_interval - input_interval) * 1_000_000.0;
    if adjust_us > 0.0 {
        let sleep_us =
            (adjust_us * PACING_SLEEP_MULTIPLIER).clamp(PACING_SLEEP_MIN_US, PACING_SLEEP_MAX_US);
        thread::sleep(Duration::from_micros(sleep_us as u64));
    }
}

fn accept_one(
    listener: &TcpListener,
    hub: &Arc<FrameHub>,
    auth: &Arc<AuthConfig>,
    client_timeout: Duration,
    handles: &mut Vec<JoinHandle<()>>,
) {
    match listener.accept() {
        Ok((stream, peer)) => {
            info!(%peer, "client connected");
            // Registered here, at accept time, so `max_clients` bounds
            // accepted connections rather than only fully-authenticated
            // ones — matching the original's count-at-`pthread_create` gate.
            let (id, stats) = hub.register();
            let hub = hub.clone();
            let auth = auth.clone();
            let handle = thread::spawn(move || {
                session::serve_client(stream, peer, hub, auth, client_timeout, id, stats);
            });
            handles.push(handle);
        }
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
        Err(e) => warn!("accept() failed: {e}"),
    }
}
