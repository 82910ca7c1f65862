// Motion command dispatch for the two-wheel base
//
// Owns the motor driver and both wheel controllers. `dispatch` and `tick`
// run in the same task, so a new command replaces the old one synchronously.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{RobotConfig, TOLERANCE_TICKS};
use crate::messages::{ControlState, MotionCommand, MotionStatus, Wheel};
use crate::motor::{
    EncoderCounter, HBridge, MotorDriver, SpeedController, WheelTargets, command_targets,
};
use crate::symbols::DisplayGlyph;

/// Outcome of one control cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    Idle,
    Running,
    /// Both wheels reached their targets
    Completed(MotionCommand),
    /// Command took longer than the watchdog allows; robot stopped
    WatchdogTripped(MotionCommand),
}

pub struct MotionDispatcher<B: HBridge> {
    config: RobotConfig,
    encoders: Arc<EncoderCounter>,
    driver: MotorDriver<B>,
    controllers: [SpeedController; 2],
    active: Option<MotionCommand>,
    cycles: u32,
    watchdog_cycles: Option<u32>,
}

impl<B: HBridge> MotionDispatcher<B> {
    pub fn new(config: RobotConfig, encoders: Arc<EncoderCounter>, bridge: B) -> Self {
        Self::with_tolerance(config, encoders, bridge, TOLERANCE_TICKS)
    }

    pub fn with_tolerance(
        config: RobotConfig,
        encoders: Arc<EncoderCounter>,
        bridge: B,
        tolerance: i32,
    ) -> Self {
        let controllers = Wheel::ALL
            .map(|wheel| SpeedController::new(wheel, config.proportional_k, tolerance));
        Self {
            config,
            encoders,
            driver: MotorDriver::new(bridge),
            controllers,
            active: None,
            cycles: 0,
            watchdog_cycles: None,
        }
    }

    /// Stop any command still running after `cycles` control cycles
    pub fn with_watchdog(mut self, cycles: u32) -> Self {
        self.watchdog_cycles = Some(cycles);
        self
    }

    /// Start `command`, cancelling whatever is in flight
    pub fn dispatch(&mut self, command: MotionCommand) {
        if command == MotionCommand::Stop {
            self.stop();
            return;
        }

        if let Some(previous) = self.active {
            info!("Preempting {:?} with {:?}", previous, command);
        } else {
            info!("Starting {:?}", command);
        }

        // Motors off before the counts are cleared; the reset starts a new
        // encoder epoch so edges sampled while still moving are refused
        self.driver.stop();
        for controller in &mut self.controllers {
            controller.cancel();
        }
        self.encoders.reset_all();

        let targets = command_targets(&command, &self.config);
        for (controller, target) in self.controllers.iter_mut().zip(targets.as_array()) {
            controller.start(target, self.config.base_speed);
        }
        self.active = Some(command);
        self.cycles = 0;
    }

    /// Halt both wheels now without waiting for the next cycle
    fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            info!("Stop: abandoning {:?}", active);
        } else {
            debug!("Stop while idle");
        }
        for controller in &mut self.controllers {
            controller.cancel();
        }
        self.driver.stop();
    }

    /// One control cycle for both wheels
    pub fn tick(&mut self) -> DispatchEvent {
        let Some(command) = self.active else {
            return DispatchEvent::Idle;
        };

        if let Some(limit) = self.watchdog_cycles {
            if self.cycles >= limit {
                warn!("{:?} not complete after {} cycles, stopping robot", command, self.cycles);
                self.stop();
                return DispatchEvent::WatchdogTripped(command);
            }
        }
        self.cycles += 1;

        let mut done = true;
        for controller in &mut self.controllers {
            let step = controller.update(&self.encoders, &mut self.driver);
            done &= step.state == ControlState::Done;
        }

        if done {
            info!(
                "{:?} complete in {} cycles (left={}, right={})",
                command,
                self.cycles,
                self.encoders.snapshot(Wheel::Left),
                self.encoders.snapshot(Wheel::Right)
            );
            for controller in &mut self.controllers {
                controller.acknowledge();
            }
            self.active = None;
            return DispatchEvent::Completed(command);
        }

        DispatchEvent::Running
    }

    pub fn active(&self) -> Option<MotionCommand> {
        self.active
    }

    /// Targets of the running command, zero when idle
    pub fn targets(&self) -> WheelTargets {
        if self.active.is_none() {
            return WheelTargets::zero();
        }
        WheelTargets::new(self.controllers[0].target(), self.controllers[1].target())
    }

    pub fn controller(&self, wheel: Wheel) -> &SpeedController {
        &self.controllers[wheel.index()]
    }

    pub fn driver(&self) -> &MotorDriver<B> {
        &self.driver
    }

    pub fn status(&self) -> MotionStatus {
        let (state, glyph, status_glyph) = match self.active {
            Some(command) => (ControlState::Running, command.glyph(), DisplayGlyph::Run),
            None => (ControlState::Idle, DisplayGlyph::Stop, DisplayGlyph::Stop),
        };
        MotionStatus {
            state,
            command: self.active,
            left_ticks: self.encoders.snapshot(Wheel::Left),
            right_ticks: self.encoders.snapshot(Wheel::Right),
            glyph,
            status_glyph,
        }
    }
}
