// Motor control for the two-wheel differential base
//
// Provides:
// - Quadrature encoder tick counting
// - H-bridge motor driver (direction + PWM)
// - Per-wheel proportional position controller
// - Differential drive tick targets
// - Simulated plant for running without hardware

pub mod controller;
mod driver;
pub mod encoder;
pub mod kinematics;
pub mod sim;

pub use controller::{ControlStep, SpeedController};
pub use driver::{Direction, HBridge, MotorDriver};
pub use encoder::{Channel, Edge, EncoderCounter};
pub use kinematics::{WheelTargets, command_targets, degrees_to_ticks};
