// Simulated two-motor plant
//
// Stands in for the H-bridge and the encoder interrupts when no hardware is
// attached. The bridge records direction and duty in atomics; an edge source
// per wheel turns the commanded speed into Gray-code quadrature edges and
// feeds them to the encoder counter, the same way the pin interrupts would.
// Edges are tagged with the encoder epoch read before the speed, so anything
// sampled ahead of a reset is refused by the counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;

use super::driver::{Direction, HBridge};
use super::encoder::{Channel, Edge, EncoderCounter};
use crate::config::MAX_PWM;
use crate::messages::Wheel;

/// Edge source update period
const EDGE_PERIOD: Duration = Duration::from_millis(1);

/// Channel levels (a, b) in forward order
const GRAY: [(bool, bool); 4] = [(false, false), (true, false), (true, true), (false, true)];

/// Output stage state shared between the bridge and the edge sources
#[derive(Debug, Default)]
pub struct SimMotors {
    direction: [AtomicU8; 2],
    duty: [AtomicU8; 2],
}

impl SimMotors {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn direction(&self, wheel: Wheel) -> Direction {
        match self.direction[wheel.index()].load(Ordering::Acquire) {
            1 => Direction::Forward,
            2 => Direction::Reverse,
            _ => Direction::Brake,
        }
    }

    pub fn duty(&self, wheel: Wheel) -> u8 {
        self.duty[wheel.index()].load(Ordering::Acquire)
    }

    /// Signed speed as seen at the motor terminals
    pub fn speed(&self, wheel: Wheel) -> i32 {
        let duty = self.duty(wheel) as i32;
        match self.direction(wheel) {
            Direction::Forward => duty,
            Direction::Reverse => -duty,
            Direction::Brake => 0,
        }
    }

    /// Levels on the (dir 1, dir 2) outputs
    pub fn levels(&self, wheel: Wheel) -> (bool, bool) {
        self.direction(wheel).levels()
    }
}

/// `HBridge` writing into `SimMotors`
#[derive(Debug, Clone)]
pub struct SimBridge {
    motors: Arc<SimMotors>,
}

impl SimBridge {
    pub fn new(motors: Arc<SimMotors>) -> Self {
        Self { motors }
    }
}

impl HBridge for SimBridge {
    fn set_direction(&mut self, wheel: Wheel, direction: Direction) {
        let code = match direction {
            Direction::Brake => 0,
            Direction::Forward => 1,
            Direction::Reverse => 2,
        };
        self.motors.direction[wheel.index()].store(code, Ordering::Release);
    }

    fn set_pwm(&mut self, wheel: Wheel, duty: u8) {
        self.motors.duty[wheel.index()].store(duty, Ordering::Release);
    }
}

/// Encoder disc model for one wheel
#[derive(Debug, Clone)]
pub struct QuadratureSim {
    phase: usize,
    residual: f64,
    edges_per_sec_at_full: f64,
}

impl QuadratureSim {
    pub fn new(edges_per_sec_at_full: u32) -> Self {
        Self {
            phase: 0,
            residual: 0.0,
            edges_per_sec_at_full: edges_per_sec_at_full as f64,
        }
    }

    /// Rotate for `dt` at `speed`, emitting one edge per quadrature step.
    /// A braked wheel drops any partial step.
    pub fn advance(&mut self, speed: i32, dt: Duration, mut emit: impl FnMut(Edge)) {
        if speed == 0 {
            self.residual = 0.0;
            return;
        }
        let fraction = speed.clamp(-MAX_PWM, MAX_PWM) as f64 / MAX_PWM as f64;
        self.residual += fraction * self.edges_per_sec_at_full * dt.as_secs_f64();

        while self.residual >= 1.0 {
            self.residual -= 1.0;
            emit(self.step((self.phase + 1) % 4));
        }
        while self.residual <= -1.0 {
            self.residual += 1.0;
            emit(self.step((self.phase + 3) % 4));
        }
    }

    fn step(&mut self, next: usize) -> Edge {
        let (a0, _) = GRAY[self.phase];
        let (a, b) = GRAY[next];
        self.phase = next;
        let channel = if a != a0 { Channel::A } else { Channel::B };
        Edge { channel, a, b }
    }
}

/// Spawn the simulated interrupt source for one wheel
pub fn spawn_edge_source(
    motors: Arc<SimMotors>,
    encoders: Arc<EncoderCounter>,
    wheel: Wheel,
    edges_per_sec_at_full: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut disc = QuadratureSim::new(edges_per_sec_at_full);
        let mut tick = interval(EDGE_PERIOD);
        loop {
            tick.tick().await;
            // Epoch before speed: seeing the new epoch implies seeing the brake
            let epoch = encoders.epoch(wheel);
            disc.advance(motors.speed(wheel), EDGE_PERIOD, |edge| {
                encoders.on_edge_at(wheel, epoch, edge);
            });
        }
    })
}
