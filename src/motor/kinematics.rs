// Differential drive tick targets
// Converts motion commands into per-wheel encoder tick targets.

use crate::config::RobotConfig;
use crate::messages::MotionCommand;

/// Degrees in one full in-place rotation
const FULL_TURN_DEG: i64 = 360;

/// Signed tick targets for both wheels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelTargets {
    pub left: i32,
    pub right: i32,
}

impl WheelTargets {
    pub fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns targets as array [left, right]
    pub fn as_array(&self) -> [i32; 2] {
        [self.left, self.right]
    }
}

/// Wheel ticks for a pivot of `degrees`, rounded to the nearest tick.
///
/// `ticks_per_rotation` is the distance each wheel covers while the robot
/// spins a full turn in place.
pub fn degrees_to_ticks(degrees: u32, ticks_per_rotation: i32) -> i32 {
    let ticks = (degrees as i64 * ticks_per_rotation as i64 + FULL_TURN_DEG / 2) / FULL_TURN_DEG;
    ticks.clamp(0, i32::MAX as i64) as i32
}

fn straight_ticks(steps: u32, ticks_per_robot: i32) -> i32 {
    (steps as i64 * ticks_per_robot as i64).clamp(0, i32::MAX as i64) as i32
}

/// Tick targets for a command
///
/// Straight moves drive both wheels the same way; turns counter-rotate them
/// about the midpoint of the axle (zero turning radius). A left turn runs the
/// left wheel backward.
pub fn command_targets(command: &MotionCommand, config: &RobotConfig) -> WheelTargets {
    match *command {
        MotionCommand::Forward { steps } => {
            let t = straight_ticks(steps, config.ticks_per_robot);
            WheelTargets::new(t, t)
        }
        MotionCommand::Backward { steps } => {
            let t = straight_ticks(steps, config.ticks_per_robot);
            WheelTargets::new(-t, -t)
        }
        MotionCommand::TurnLeft { degrees } => {
            let t = degrees_to_ticks(degrees, config.ticks_per_rotation);
            WheelTargets::new(-t, t)
        }
        MotionCommand::TurnRight { degrees } => {
            let t = degrees_to_ticks(degrees, config.ticks_per_rotation);
            WheelTargets::new(t, -t)
        }
        MotionCommand::Stop => WheelTargets::zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_backward_targets() {
        let config = RobotConfig::default();
        let fwd = command_targets(&MotionCommand::Forward { steps: 1 }, &config);
        assert_eq!(fwd, WheelTargets::new(2000, 2000));

        let back = command_targets(&MotionCommand::Backward { steps: 2 }, &config);
        assert_eq!(back.as_array(), [-4000, -4000]);
    }

    #[test]
    fn test_turn_symmetry() {
        let config = RobotConfig::default();
        for degrees in [0, 1, 45, 90, 180, 270, 360, 720] {
            let left = command_targets(&MotionCommand::TurnLeft { degrees }, &config);
            let right = command_targets(&MotionCommand::TurnRight { degrees }, &config);

            // Pivot: wheels counter-rotate by the same amount
            assert_eq!(left.left, -left.right);
            assert_eq!(right.left, -right.right);
            // Mirror images of each other
            assert_eq!(left.left, -right.left);
            assert_eq!(left.right, -right.right);
        }
    }

    #[test]
    fn test_degrees_to_ticks() {
        assert_eq!(degrees_to_ticks(360, 400), 400);
        assert_eq!(degrees_to_ticks(90, 400), 100);
        assert_eq!(degrees_to_ticks(45, 400), 50);
        // 1 degree of 400 ticks rounds to 1
        assert_eq!(degrees_to_ticks(1, 400), 1);
        assert_eq!(degrees_to_ticks(0, 400), 0);
    }

    #[test]
    fn test_stop_has_no_targets() {
        let config = RobotConfig::default();
        assert_eq!(command_targets(&MotionCommand::Stop, &config), WheelTargets::zero());
    }

    #[test]
    fn test_large_steps_saturate() {
        let config = RobotConfig::default();
        let fwd = command_targets(&MotionCommand::Forward { steps: u32::MAX }, &config);
        assert_eq!(fwd.left, i32::MAX);
    }
}
