// Per-wheel proportional position controller
//
// Drives a wheel's tick count toward a target. The base speed carries the
// sign of the initial error, so the proportional term only trims speed and
// never reverses the wheel. Overshoot counts as arrival.

use tracing::debug;

use super::driver::{HBridge, MotorDriver};
use super::encoder::EncoderCounter;
use crate::config::MAX_PWM;
use crate::messages::{ControlState, Wheel};

/// Output of one control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlStep {
    pub speed: i32,
    pub state: ControlState,
}

#[derive(Debug, Clone)]
pub struct SpeedController {
    wheel: Wheel,
    gain: f32,
    tolerance: i32,
    target: i32,
    base_speed: i32,
    state: ControlState,
}

impl SpeedController {
    /// `tolerance` is forced to at least one tick
    pub fn new(wheel: Wheel, gain: f32, tolerance: i32) -> Self {
        Self {
            wheel,
            gain,
            tolerance: tolerance.max(1),
            target: 0,
            base_speed: 0,
            state: ControlState::Idle,
        }
    }

    /// Begin a move to `target` ticks. The caller has zeroed the encoder.
    pub fn start(&mut self, target: i32, base_magnitude: i32) {
        let magnitude = base_magnitude.clamp(0, MAX_PWM);
        self.target = target;
        self.base_speed = if target < 0 { -magnitude } else { magnitude };
        self.state = ControlState::Running;
        debug!(
            "{:?} wheel: target={} base_speed={}",
            self.wheel, self.target, self.base_speed
        );
    }

    /// Abandon the current move without reporting completion
    pub fn cancel(&mut self) {
        self.target = 0;
        self.base_speed = 0;
        self.state = ControlState::Idle;
    }

    /// Return to idle after completion was observed
    pub fn acknowledge(&mut self) {
        if self.state == ControlState::Done {
            self.state = ControlState::Idle;
        }
    }

    /// Compute the speed for the current tick count
    pub fn compute(&mut self, current: i32) -> ControlStep {
        if self.state != ControlState::Running {
            return ControlStep {
                speed: 0,
                state: self.state,
            };
        }

        let error = self.target.saturating_sub(current);
        let overshoot = error != 0 && (error < 0) != (self.base_speed < 0);
        if error.unsigned_abs() <= self.tolerance as u32 || overshoot {
            debug!(
                "{:?} wheel done at {} (target {})",
                self.wheel, current, self.target
            );
            self.state = ControlState::Done;
            return ControlStep {
                speed: 0,
                state: ControlState::Done,
            };
        }

        let trim = self.gain * error as f32;
        let speed = (self.base_speed as f32 + trim)
            .round()
            .clamp(-MAX_PWM as f32, MAX_PWM as f32) as i32;

        ControlStep {
            speed,
            state: ControlState::Running,
        }
    }

    /// One control cycle: snapshot, compute, actuate
    pub fn update<B: HBridge>(
        &mut self,
        encoders: &EncoderCounter,
        driver: &mut MotorDriver<B>,
    ) -> ControlStep {
        let step = self.compute(encoders.snapshot(self.wheel));
        driver.drive(self.wheel, step.speed);
        step
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn target(&self) -> i32 {
        self.target
    }

    pub fn base_speed(&self) -> i32 {
        self.base_speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_outputs_zero() {
        let mut controller = SpeedController::new(Wheel::Left, 0.5, 2);
        let step = controller.compute(0);
        assert_eq!(step.speed, 0);
        assert_eq!(step.state, ControlState::Idle);
    }

    #[test]
    fn test_base_speed_follows_target_sign() {
        let mut controller = SpeedController::new(Wheel::Left, 0.1, 2);
        controller.start(-500, 150);
        assert_eq!(controller.base_speed(), -150);
        let step = controller.compute(0);
        assert_eq!(step.speed, -200);

        controller.start(500, 150);
        assert_eq!(controller.base_speed(), 150);
        assert_eq!(controller.compute(0).speed, 200);
    }

    #[test]
    fn test_speed_saturates() {
        let mut controller = SpeedController::new(Wheel::Right, 0.5, 2);
        controller.start(1000, 150);
        assert_eq!(controller.compute(0).speed, 255);
        controller.start(-1000, 150);
        assert_eq!(controller.compute(0).speed, -255);
    }

    #[test]
    fn test_convergence_with_unit_ticks() {
        let (target, tolerance) = (1000, 2);
        let mut controller = SpeedController::new(Wheel::Left, 0.5, tolerance);
        controller.start(target, 150);

        let mut ticks = 0;
        let mut cycles = 0;
        loop {
            let step = controller.compute(ticks);
            if step.state == ControlState::Done {
                break;
            }
            assert!(step.speed > 0, "proportional term reversed the wheel");
            ticks += step.speed.signum();
            cycles += 1;
            assert!(cycles <= target as usize, "no convergence after {} cycles", cycles);
        }

        assert!((target - ticks).abs() <= tolerance);
        assert!(ticks - target <= tolerance + 1);

        // Done stays done with zero output
        let step = controller.compute(ticks);
        assert_eq!(step.speed, 0);
        assert_eq!(step.state, ControlState::Done);
    }

    #[test]
    fn test_overshoot_is_not_corrected() {
        let mut controller = SpeedController::new(Wheel::Left, 0.4, 2);
        controller.start(100, 150);
        assert_eq!(controller.compute(110).state, ControlState::Done);
        assert_eq!(controller.compute(50).speed, 0);
    }

    #[test]
    fn test_zero_target_completes_immediately() {
        let mut controller = SpeedController::new(Wheel::Left, 0.4, 2);
        controller.start(0, 150);
        assert_eq!(controller.compute(0).state, ControlState::Done);
    }

    #[test]
    fn test_tolerance_minimum() {
        let mut controller = SpeedController::new(Wheel::Left, 0.4, 0);
        controller.start(10, 100);
        assert_eq!(controller.compute(9).state, ControlState::Done);
    }

    #[test]
    fn test_extreme_error_saturates() {
        let mut controller = SpeedController::new(Wheel::Right, 0.4, 2);
        controller.start(i32::MIN, 150);
        // Error saturates at i32::MIN
        let step = controller.compute(i32::MAX);
        assert_eq!(step.speed, -255);
        assert_eq!(step.state, ControlState::Running);

        controller.start(i32::MAX, 150);
        assert_eq!(controller.compute(i32::MIN).speed, 255);
    }

    #[test]
    fn test_cancel_and_acknowledge() {
        let mut controller = SpeedController::new(Wheel::Left, 0.4, 2);
        controller.start(100, 100);
        controller.cancel();
        assert_eq!(controller.state(), ControlState::Idle);
        assert_eq!(controller.compute(0).speed, 0);

        controller.start(1, 100);
        assert_eq!(controller.compute(0).state, ControlState::Done);
        controller.acknowledge();
        assert_eq!(controller.state(), ControlState::Idle);
    }
}
