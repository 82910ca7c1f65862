// Motor driver for the two-wheel base
//
// Translates signed speeds into H-bridge direction levels and PWM duty.
// Runs inside the control cycle, so it never fails: out of range speeds are
// clamped and the bridge itself is infallible.

use tracing::{debug, info};

use crate::config::MAX_PWM;
use crate::messages::{Wheel, WheelActuation, WheelCommand};

/// Direction state of one H-bridge channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
    /// Both direction outputs high; motor terminals shorted
    Brake,
}

impl Direction {
    /// Levels of the (dir 1, dir 2) outputs
    pub fn levels(self) -> (bool, bool) {
        match self {
            Direction::Forward => (true, false),
            Direction::Reverse => (false, true),
            Direction::Brake => (true, true),
        }
    }
}

/// Output stage for both motors
pub trait HBridge {
    fn set_direction(&mut self, wheel: Wheel, direction: Direction);
    fn set_pwm(&mut self, wheel: Wheel, duty: u8);
}

/// Signed speed -> bridge outputs for both wheels
pub struct MotorDriver<B: HBridge> {
    bridge: B,
    commanded: [i16; 2],
}

impl<B: HBridge> MotorDriver<B> {
    pub fn new(bridge: B) -> Self {
        let mut driver = Self {
            bridge,
            commanded: [0; 2],
        };
        driver.stop();
        driver
    }

    /// Drive one wheel. Zero brakes rather than coasting.
    pub fn drive(&mut self, wheel: Wheel, speed: i32) -> WheelCommand {
        let command = WheelCommand::new(wheel, speed);
        let direction = match command.speed {
            s if s > 0 => Direction::Forward,
            s if s < 0 => Direction::Reverse,
            _ => Direction::Brake,
        };
        let duty = command.speed.unsigned_abs().min(MAX_PWM as u16) as u8;

        // Drop PWM before flipping direction so the bridge never sees a
        // reversal at full duty
        if direction != self.direction(wheel) {
            self.bridge.set_pwm(wheel, 0);
        }
        self.bridge.set_direction(wheel, direction);
        self.bridge.set_pwm(wheel, duty);

        self.commanded[wheel.index()] = command.speed;
        command
    }

    /// Brake both wheels immediately
    pub fn stop(&mut self) {
        debug!("Braking both motors");
        for wheel in Wheel::ALL {
            self.drive(wheel, 0);
        }
    }

    /// Last speed written for a wheel
    pub fn commanded(&self, wheel: Wheel) -> i16 {
        self.commanded[wheel.index()]
    }

    pub fn actuation(&self) -> WheelActuation {
        WheelActuation {
            left: self.commanded(Wheel::Left),
            right: self.commanded(Wheel::Right),
        }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    fn direction(&self, wheel: Wheel) -> Direction {
        match self.commanded[wheel.index()] {
            s if s > 0 => Direction::Forward,
            s if s < 0 => Direction::Reverse,
            _ => Direction::Brake,
        }
    }
}

impl<B: HBridge> Drop for MotorDriver<B> {
    fn drop(&mut self) {
        // Never leave the motors powered
        info!("Stopping all motors");
        self.stop();
    }
}
