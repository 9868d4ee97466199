//! Simulate command implementation.

use super::open_log;
use eventlink_core::{Clock, Command, CoreResult, EventLog, SystemClock};
use eventlink_uplink::{
    DeliveryLoop, DeliveryStats, DeviceConfig, LoopbackTransport, NoopIndicator, PayloadCodec,
    Scheduler, Task, Transport, UplinkMode,
};
use rand::Rng;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, info};

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct Options {
    /// Events to produce.
    pub events: u32,
    /// Maximum delivery cycles.
    pub cycles: u64,
    /// Frame loss probability.
    pub loss: f64,
    /// Interval divisor.
    pub speed: u32,
    /// Seed for the loss pattern.
    pub seed: Option<u64>,
}

/// Outcome of a simulation run.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    /// Events the producer added.
    pub events_added: u32,
    /// Delivery cycles run.
    pub cycles: u64,
    /// Delivery totals.
    pub delivery: DeliveryStats,
    /// Frames that crossed the loopback, time requests included.
    pub frames_delivered: usize,
    /// Frames the loopback dropped.
    pub frames_lost: u64,
    /// Time requests that were sent.
    pub time_requests: u64,
    /// Events still waiting in the log.
    pub remaining_events: usize,
    /// Wall-clock run time.
    pub elapsed_ms: u128,
}

/// Runs the simulate command.
pub fn run(
    path: &Path,
    config: &DeviceConfig,
    options: &Options,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.uplink_mode != UplinkMode::Loopback {
        info!(mode = ?config.uplink_mode, "simulating over the loopback uplink instead");
    }
    let log = Arc::new(open_log(path, config, true)?);
    let report = simulate(log, config, options)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_text_output(&report);
        }
    }

    Ok(())
}

/// Produces events on one thread while the scheduler drives delivery and
/// clock sync requests on this one.
pub fn simulate(
    log: Arc<EventLog>,
    config: &DeviceConfig,
    options: &Options,
) -> Result<SimulationReport, Box<dyn std::error::Error>> {
    let speed = options.speed.max(1);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let transport = Arc::new(match options.seed {
        Some(seed) => LoopbackTransport::with_seed(options.loss, seed),
        None => LoopbackTransport::new(options.loss),
    });
    let delivery = DeliveryLoop::new(
        config.clone(),
        Arc::clone(&log),
        Arc::clone(&transport),
        Arc::new(NoopIndicator),
        Arc::clone(&clock),
    );
    let codec = PayloadCodec::new(clock);

    let mut scheduler = Scheduler::new();
    let delivery_config = config.clone();
    scheduler.every(Task::DeliverEvents, move || {
        delivery_config.delivery_delay(rand::thread_rng().gen()) / speed
    });
    let sync_interval = config.clock_sync_interval / speed;
    scheduler.every(Task::SyncClock, move || sync_interval);

    let producer = {
        let log = Arc::clone(&log);
        let events = options.events;
        let pause = config.send_interval / speed / 2;
        thread::spawn(move || -> CoreResult<u32> {
            let mut rng = rand::thread_rng();
            for _ in 0..events {
                let uid: u32 = rng.gen();
                log.add_event(Command::TagDetected, Some(&uid.to_le_bytes()))?;
                thread::sleep(pause);
            }
            Ok(events)
        })
    };

    info!(
        events = options.events,
        loss = options.loss,
        speed, "simulation started"
    );
    let start = Instant::now();
    let mut cycles = 0u64;
    let mut time_requests = 0u64;
    let mut sync_id = 0u16;
    while cycles < options.cycles {
        match scheduler.next() {
            Some(Task::DeliverEvents) => {
                let outcome = delivery.run_cycle();
                debug!(?outcome, "cycle finished");
                cycles += 1;
                if producer.is_finished() && !log.has_events() {
                    break;
                }
            }
            Some(Task::SyncClock) => {
                sync_id = (sync_id + 1) % 31;
                if let Ok(true) = transport.send(&codec.time_request(sync_id)) {
                    time_requests += 1;
                }
            }
            None => break,
        }
    }

    let events_added = producer
        .join()
        .map_err(|_| "event producer thread panicked")??;

    Ok(SimulationReport {
        events_added,
        cycles,
        delivery: delivery.stats(),
        frames_delivered: transport.delivered().len(),
        frames_lost: transport.dropped(),
        time_requests,
        remaining_events: log.events()?.len(),
        elapsed_ms: start.elapsed().as_millis(),
    })
}

fn print_text_output(report: &SimulationReport) {
    let stats = &report.delivery;
    println!("EventLink Delivery Simulation");
    println!("=============================");
    println!();
    println!("Events added:      {}", report.events_added);
    println!("Cycles:            {}", report.cycles);
    println!("Elapsed:           {} ms", report.elapsed_ms);
    println!();
    println!("Delivery:");
    println!("  Delivered:       {}", stats.delivered);
    println!("  Discarded:       {}", stats.discarded);
    println!("  Failed sends:    {}", stats.failed_sends);
    println!("  Sequence gaps:   {}", stats.sequence_gaps);
    println!("  Remaining:       {}", report.remaining_events);
    println!();
    println!("Uplink:");
    println!("  Frames through:  {}", report.frames_delivered);
    println!("  Frames lost:     {}", report.frames_lost);
    println!("  Time requests:   {}", report.time_requests);
}
