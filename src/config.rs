// Pins, timing, topics and the robot tuning record
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// Control loop frequency (20 ms period)
pub const LOOP_HZ: u64 = 50;

// Tick band within which a wheel counts as arrived
pub const TOLERANCE_TICKS: i32 = 2;

// Stop the robot if a command has not completed after this many cycles (30 s)
pub const WATCHDOG_CYCLES: u32 = 1500;

// Maximum PWM magnitude accepted by the motor driver
pub const MAX_PWM: i32 = 255;

// Zenoh topics
pub const TOPIC_CMD_SYMBOL: &str = "diffbot/cmd/symbol"; // keypad/remote symbols
pub const TOPIC_RT_WHEELS: &str = "diffbot/rt/wheels"; // actuation
pub const TOPIC_STATE_MOTION: &str = "diffbot/state/motion"; // motion status

// Bluetooth serial module (HC-05 style, factory baud rate)
pub const BT_PORT: &str = "/dev/rfcomm0";
pub const BT_BAUDRATE: u32 = 9600;

// Simulated plant: encoder edges per second at full PWM
pub const SIM_EDGES_PER_SEC_AT_FULL_PWM: u32 = 600;

/// Channels 0..=19 exist on the controller (D0-D13, A0-A5)
pub const CHANNEL_COUNT: u8 = 20;
/// Channels able to generate hardware PWM
pub const PWM_CHANNELS: [u8; 6] = [3, 5, 6, 9, 10, 11];
/// Channels wired to external interrupts
pub const INTERRUPT_CHANNELS: [u8; 2] = [2, 3];

/// Proportional gain is carried as thousandths in the packed record
pub const GAIN_SCALE: f32 = 1000.0;

/// Size of the packed `RobotConfig` record
pub const ROBOT_CONFIG_BLOB_LEN: usize = 16;

pub fn loop_period() -> Duration {
    Duration::from_millis(1000 / LOOP_HZ)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Channel {pin} assigned to both {first} and {second}")]
    DuplicatePin {
        pin: u8,
        first: &'static str,
        second: &'static str,
    },

    #[error("Channel {pin} for {signal} is outside 0..{max}")]
    PinOutOfRange {
        signal: &'static str,
        pin: u8,
        max: u8,
    },

    #[error("Channel {pin} for {signal} cannot generate PWM")]
    NotPwmCapable { signal: &'static str, pin: u8 },

    #[error("Channel {pin} for {signal} has no external interrupt")]
    NotInterruptCapable { signal: &'static str, pin: u8 },

    #[error("Invalid robot config: {field} {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("Config blob must be {expected} bytes, got {actual}")]
    BlobLength { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Two direction outputs and one PWM output of an H-bridge channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorPins {
    pub dir_1: u8,
    pub dir_2: u8,
    pub pwm: u8,
}

/// Physical channel of every logical signal on the robot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMap {
    pub motor_a: MotorPins,
    pub motor_b: MotorPins,
    pub encoder_a: u8,
    pub encoder_b: u8,
    pub lcd_sda: u8,
    pub lcd_scl: u8,
    pub bt_tx: u8,
    pub bt_rx: u8,
    pub keypad: [u8; 7],
}

const KEYPAD_SIGNALS: [&str; 7] = [
    "keypad 0", "keypad 1", "keypad 2", "keypad 3", "keypad 4", "keypad 5", "keypad 6",
];

impl Default for PinMap {
    fn default() -> Self {
        Self {
            motor_a: MotorPins {
                dir_1: 4,
                dir_2: 5,
                pwm: 6,
            },
            motor_b: MotorPins {
                dir_1: 7,
                dir_2: 8,
                pwm: 9,
            },
            encoder_a: 2,
            encoder_b: 3,
            lcd_sda: 18,
            lcd_scl: 19,
            bt_tx: 0,
            bt_rx: 1,
            keypad: [10, 11, 12, 14, 15, 16, 17],
        }
    }
}

impl PinMap {
    /// Every (signal name, channel) pair in declaration order
    pub fn signals(&self) -> Vec<(&'static str, u8)> {
        let mut out = vec![
            ("motor A dir 1", self.motor_a.dir_1),
            ("motor A dir 2", self.motor_a.dir_2),
            ("motor A pwm", self.motor_a.pwm),
            ("motor B dir 1", self.motor_b.dir_1),
            ("motor B dir 2", self.motor_b.dir_2),
            ("motor B pwm", self.motor_b.pwm),
            ("encoder A", self.encoder_a),
            ("encoder B", self.encoder_b),
            ("lcd sda", self.lcd_sda),
            ("lcd scl", self.lcd_scl),
            ("bt tx", self.bt_tx),
            ("bt rx", self.bt_rx),
        ];
        out.extend(KEYPAD_SIGNALS.iter().copied().zip(self.keypad));
        out
    }

    /// Check that channels are in range, distinct, and capable of their role
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut owner: [Option<&'static str>; CHANNEL_COUNT as usize] =
            [None; CHANNEL_COUNT as usize];

        for (signal, pin) in self.signals() {
            if pin >= CHANNEL_COUNT {
                return Err(ConfigError::PinOutOfRange {
                    signal,
                    pin,
                    max: CHANNEL_COUNT,
                });
            }
            if let Some(first) = owner[pin as usize] {
                return Err(ConfigError::DuplicatePin {
                    pin,
                    first,
                    second: signal,
                });
            }
            owner[pin as usize] = Some(signal);
        }

        for (signal, pin) in [("motor A pwm", self.motor_a.pwm), ("motor B pwm", self.motor_b.pwm)] {
            if !PWM_CHANNELS.contains(&pin) {
                return Err(ConfigError::NotPwmCapable { signal, pin });
            }
        }
        for (signal, pin) in [("encoder A", self.encoder_a), ("encoder B", self.encoder_b)] {
            if !INTERRUPT_CHANNELS.contains(&pin) {
                return Err(ConfigError::NotInterruptCapable { signal, pin });
            }
        }

        Ok(())
    }
}

/// Tuning record shared read-only by every controller.
///
/// Packed layout (little-endian, no padding), in this order:
/// `ticks_per_robot: i32`, `ticks_per_rotation: i32`, `base_speed: i32`,
/// `proportional_k: i32` (thousandths).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Ticks for one robot length of straight travel
    pub ticks_per_robot: i32,
    /// Ticks each wheel travels for a full in-place rotation of the robot
    pub ticks_per_rotation: i32,
    /// Nominal PWM magnitude at command start
    pub base_speed: i32,
    /// Gain applied to the remaining tick error
    pub proportional_k: f32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            ticks_per_robot: 2000,
            ticks_per_rotation: 400,
            base_speed: 150,
            proportional_k: 0.4,
        }
    }
}

impl RobotConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks_per_robot <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "ticks_per_robot",
                reason: format!("must be positive, got {}", self.ticks_per_robot),
            });
        }
        if self.ticks_per_rotation <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "ticks_per_rotation",
                reason: format!("must be positive, got {}", self.ticks_per_rotation),
            });
        }
        if !(1..=MAX_PWM).contains(&self.base_speed) {
            return Err(ConfigError::InvalidValue {
                field: "base_speed",
                reason: format!("must be in 1..={}, got {}", MAX_PWM, self.base_speed),
            });
        }
        if !self.proportional_k.is_finite() || self.proportional_k < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "proportional_k",
                reason: format!("must be finite and >= 0, got {}", self.proportional_k),
            });
        }
        Ok(())
    }

    /// Encode into the packed record
    pub fn to_bytes(&self) -> [u8; ROBOT_CONFIG_BLOB_LEN] {
        let gain = (self.proportional_k * GAIN_SCALE).round() as i32;
        let mut out = [0u8; ROBOT_CONFIG_BLOB_LEN];
        out[0..4].copy_from_slice(&self.ticks_per_robot.to_le_bytes());
        out[4..8].copy_from_slice(&self.ticks_per_rotation.to_le_bytes());
        out[8..12].copy_from_slice(&self.base_speed.to_le_bytes());
        out[12..16].copy_from_slice(&gain.to_le_bytes());
        out
    }

    /// Decode the packed record; the result is not validated
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() != ROBOT_CONFIG_BLOB_LEN {
            return Err(ConfigError::BlobLength {
                expected: ROBOT_CONFIG_BLOB_LEN,
                actual: bytes.len(),
            });
        }
        let field = |i: usize| i32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Ok(Self {
            ticks_per_robot: field(0),
            ticks_per_rotation: field(4),
            base_speed: field(8),
            proportional_k: field(12) as f32 / GAIN_SCALE,
        })
    }

    /// Load from `.bin` (packed record) or JSON, then validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.extension().is_some_and(|ext| ext == "bin") {
            Self::from_bytes(&std::fs::read(path)?)?
        } else {
            serde_json::from_str(&std::fs::read_to_string(path)?)?
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pin_map_is_valid() {
        assert!(PinMap::default().validate().is_ok());
        assert_eq!(PinMap::default().signals().len(), 19);
    }

    #[test]
    fn test_duplicate_pin_rejected() {
        let mut pins = PinMap::default();
        pins.lcd_scl = pins.lcd_sda;
        match pins.validate() {
            Err(ConfigError::DuplicatePin { pin, first, second }) => {
                assert_eq!(pin, 18);
                assert_eq!(first, "lcd sda");
                assert_eq!(second, "lcd scl");
            }
            other => panic!("expected duplicate pin error, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_pin_rejected() {
        let mut pins = PinMap::default();
        pins.keypad[6] = 20;
        assert!(matches!(
            pins.validate(),
            Err(ConfigError::PinOutOfRange { pin: 20, .. })
        ));
    }

    #[test]
    fn test_capabilities_checked() {
        // Swap PWM and a direction line: 4 has no PWM
        let mut pins = PinMap::default();
        pins.motor_a.pwm = 4;
        pins.motor_a.dir_1 = 6;
        assert!(matches!(
            pins.validate(),
            Err(ConfigError::NotPwmCapable { pin: 4, .. })
        ));

        let mut pins = PinMap::default();
        pins.encoder_a = 13;
        assert!(matches!(
            pins.validate(),
            Err(ConfigError::NotInterruptCapable { pin: 13, .. })
        ));
    }

    #[test]
    fn test_packed_layout_order() {
        let config = RobotConfig {
            ticks_per_robot: 2000,
            ticks_per_rotation: 400,
            base_speed: 150,
            proportional_k: 0.4,
        };
        let bytes = config.to_bytes();
        assert_eq!(&bytes[0..4], &2000i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &400i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &150i32.to_le_bytes());
        assert_eq!(&bytes[12..16], &400i32.to_le_bytes());

        let decoded = RobotConfig::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.ticks_per_robot, 2000);
        assert!((decoded.proportional_k - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_blob_length_checked() {
        assert!(matches!(
            RobotConfig::from_bytes(&[0u8; 15]),
            Err(ConfigError::BlobLength { actual: 15, .. })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = RobotConfig::default();
        config.base_speed = 300;
        assert!(config.validate().is_err());

        let mut config = RobotConfig::default();
        config.ticks_per_rotation = 0;
        assert!(config.validate().is_err());

        let mut config = RobotConfig::default();
        config.proportional_k = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_config() {
        let json = r#"{"ticks_per_robot":1000,"ticks_per_rotation":300,"base_speed":120,"proportional_k":0.25}"#;
        let config: RobotConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.ticks_per_rotation, 300);
    }

    #[test]
    fn test_load_packed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("robot.bin");
        let expected = RobotConfig {
            ticks_per_robot: 1800,
            ticks_per_rotation: 360,
            base_speed: 140,
            proportional_k: 0.4,
        };
        std::fs::write(&path, expected.to_bytes()).unwrap();

        let loaded = RobotConfig::load(&path).unwrap();
        assert_eq!(loaded.ticks_per_robot, 1800);
        assert_eq!(loaded.ticks_per_rotation, 360);
        assert_eq!(loaded.base_speed, 140);
        assert!((loaded.proportional_k - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("robot.json");
        std::fs::write(
            &path,
            r#"{"ticks_per_robot":2400,"ticks_per_rotation":500,"base_speed":200,"proportional_k":0.3}"#,
        )
        .unwrap();

        let loaded = RobotConfig::load(&path).unwrap();
        assert_eq!(loaded.ticks_per_robot, 2400);
        assert_eq!(loaded.base_speed, 200);
    }

    #[test]
    fn test_load_rejects_invalid_files() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{"ticks_per_robot":2000,"ticks_per_rotation":400,"base_speed":0,"proportional_k":0.4}"#,
        )
        .unwrap();
        assert!(matches!(
            RobotConfig::load(&path),
            Err(ConfigError::InvalidValue { field: "base_speed", .. })
        ));

        // Packed record with a negative tick count
        let path = dir.path().join("bad.bin");
        let mut bytes = RobotConfig::default().to_bytes();
        bytes[0..4].copy_from_slice(&(-5i32).to_le_bytes());
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            RobotConfig::load(&path),
            Err(ConfigError::InvalidValue { field: "ticks_per_robot", .. })
        ));

        let path = dir.path().join("short.bin");
        std::fs::write(&path, [0u8; 6]).unwrap();
        assert!(matches!(RobotConfig::load(&path), Err(ConfigError::BlobLength { .. })));

        let missing = dir.path().join("missing.json");
        assert!(matches!(RobotConfig::load(&missing), Err(ConfigError::Io(_))));
    }
}
