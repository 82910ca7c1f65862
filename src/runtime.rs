// 50 Hz control loop
// Each cycle: drain input symbols, route them to the dispatcher, run both
// wheel controllers, then publish actuation and motion status.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{
    BT_BAUDRATE, LOOP_HZ, PinMap, RobotConfig, SIM_EDGES_PER_SEC_AT_FULL_PWM, TOLERANCE_TICKS,
    TOPIC_CMD_SYMBOL, TOPIC_RT_WHEELS, TOPIC_STATE_MOTION, WATCHDOG_CYCLES, loop_period,
};
use crate::dispatcher::{DispatchEvent, MotionDispatcher};
use crate::link;
use crate::messages::{MotionStatus, SymbolMessage, Wheel, WheelActuation};
use crate::motor::sim::{SimBridge, SimMotors, spawn_edge_source};
use crate::motor::{EncoderCounter, HBridge};
use crate::symbols::InputRouter;

/// Pending symbols from all input sources
const SYMBOL_QUEUE: usize = 64;

#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// JSON or packed `.bin` robot config; defaults when absent
    pub config_path: Option<PathBuf>,
    pub bluetooth_port: Option<String>,
    pub baudrate: u32,
    pub watchdog_cycles: u32,
    pub zenoh: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            config_path: None,
            bluetooth_port: None,
            baudrate: BT_BAUDRATE,
            watchdog_cycles: WATCHDOG_CYCLES,
            zenoh: true,
        }
    }
}

pub struct Runtime<B: HBridge> {
    router: InputRouter,
    dispatcher: MotionDispatcher<B>,
    last_event: DispatchEvent,
}

impl<B: HBridge> Runtime<B> {
    pub fn new(router: InputRouter, dispatcher: MotionDispatcher<B>) -> Self {
        Self {
            router,
            dispatcher,
            last_event: DispatchEvent::Idle,
        }
    }

    /// Process one incoming symbol
    fn on_symbol(&mut self, symbol: u8) {
        if let Some(command) = self.router.route(symbol) {
            info!("Symbol 0x{:02X} -> {:?}", symbol, command);
            self.dispatcher.dispatch(command);
        }
    }

    /// Run one control cycle
    fn step(&mut self) -> DispatchEvent {
        let event = self.dispatcher.tick();
        if let DispatchEvent::WatchdogTripped(command) = event {
            warn!("Watchdog stopped {:?}", command);
        }
        self.last_event = event;
        event
    }

    pub fn actuation(&self) -> WheelActuation {
        self.dispatcher.driver().actuation()
    }

    pub fn status(&self) -> MotionStatus {
        self.dispatcher.status()
    }

    pub fn last_event(&self) -> DispatchEvent {
        self.last_event
    }
}

pub async fn run(options: RuntimeOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pins = PinMap::default();
    pins.validate()?;

    let config = match &options.config_path {
        Some(path) => {
            info!("Loading robot config from {}", path.display());
            RobotConfig::load(path)?
        }
        None => {
            let config = RobotConfig::default();
            config.validate()?;
            config
        }
    };
    info!("Robot config: {:?}", config);

    // Simulated plant: bridge outputs + one edge source per encoder
    let encoders = Arc::new(EncoderCounter::new());
    let motors = SimMotors::new();
    let edge_sources: Vec<_> = Wheel::ALL
        .iter()
        .map(|&wheel| {
            spawn_edge_source(
                motors.clone(),
                encoders.clone(),
                wheel,
                SIM_EDGES_PER_SEC_AT_FULL_PWM,
            )
        })
        .collect();

    let dispatcher = MotionDispatcher::with_tolerance(
        config,
        encoders.clone(),
        SimBridge::new(motors.clone()),
        TOLERANCE_TICKS,
    )
    .with_watchdog(options.watchdog_cycles);
    let mut runtime = Runtime::new(InputRouter::default(), dispatcher);

    let (symbol_tx, mut symbol_rx) = mpsc::channel::<u8>(SYMBOL_QUEUE);
    if let Some(port) = &options.bluetooth_port {
        let link = link::open_bluetooth(port, options.baudrate)?;
        link::spawn_reader(link, symbol_tx.clone());
    }

    let session = if options.zenoh {
        info!("Opening Zenoh session...");
        Some(zenoh::open(zenoh::Config::default()).await?)
    } else {
        None
    };
    let subscriber = match &session {
        Some(session) => Some(session.declare_subscriber(TOPIC_CMD_SYMBOL).await?),
        None => None,
    };
    let pub_wheels = match &session {
        Some(session) => Some(session.declare_publisher(TOPIC_RT_WHEELS).await?),
        None => None,
    };
    let pub_status = match &session {
        Some(session) => Some(session.declare_publisher(TOPIC_STATE_MOTION).await?),
        None => None,
    };

    let mut tick = interval(loop_period());
    info!(
        "Runtime started: {}Hz loop, {} tick tolerance, watchdog after {} cycles",
        LOOP_HZ, TOLERANCE_TICKS, options.watchdog_cycles
    );
    if session.is_some() {
        info!("Subscribed to: {}", TOPIC_CMD_SYMBOL);
        info!("Publishing to: {}, {}", TOPIC_RT_WHEELS, TOPIC_STATE_MOTION);
    }

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }

        // 1. Drain all pending symbols (non-blocking), in arrival order
        if let Some(subscriber) = &subscriber {
            while let Ok(Some(sample)) = subscriber.try_recv() {
                let payload = sample.payload().to_bytes();
                match serde_json::from_slice::<SymbolMessage>(&payload) {
                    Ok(msg) => {
                        // Queue behind Bluetooth bytes already waiting
                        if symbol_tx.try_send(msg.symbol).is_err() {
                            warn!("Symbol queue full, dropping 0x{:02X}", msg.symbol);
                        }
                    }
                    Err(e) => {
                        warn!("Failed to parse symbol: {}", e);
                    }
                }
            }
        }
        while let Ok(symbol) = symbol_rx.try_recv() {
            runtime.on_symbol(symbol);
        }

        // 2. Control cycle (includes watchdog)
        runtime.step();

        // 3. Publish actuation and status
        if let (Some(pub_wheels), Some(pub_status)) = (&pub_wheels, &pub_status) {
            // A failed put is logged and the loop keeps controlling the motors
            let actuation_json = serde_json::to_string(&runtime.actuation())?;
            check_publish(TOPIC_RT_WHEELS, pub_wheels.put(actuation_json).await);

            let status_json = serde_json::to_string(&runtime.status())?;
            check_publish(TOPIC_STATE_MOTION, pub_status.put(status_json).await);
        }
    }

    for source in edge_sources {
        source.abort();
    }
    Ok(())
}

/// Warn about a failed publish; returns whether it went out
fn check_publish<E: std::fmt::Display>(topic: &str, result: Result<(), E>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to publish on {}: {}", topic, e);
            false
        }
    }
}
