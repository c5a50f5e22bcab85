use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConfigError;

/// Quality preset of the dense reconstruction.
///
/// The value is passed to DensifyPointCloud and RefineMesh as
/// `--resolution-level`: 0 works on full-resolution images and every step
/// halves the image size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MvsMode(u8);

impl MvsMode {
    /// Highest accepted preset.
    pub const MAX: i32 = 3;

    /// Validates a numeric mode flag.
    pub fn new(mode: i32) -> Result<Self, ConfigError> {
        if !(0..=Self::MAX).contains(&mode) {
            return Err(ConfigError::ValidationError(format!(
                "mvs.mode must be between 0 and {}, got {}",
                Self::MAX,
                mode
            )));
        }
        Ok(Self(mode as u8))
    }

    /// Value of the `--resolution-level` argument.
    pub fn resolution_level(&self) -> u8 {
        self.0
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            0 => "full",
            1 => "half",
            2 => "quarter",
            _ => "eighth",
        }
    }
}

impl fmt::Display for MvsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_range() {
        for mode in 0..=3 {
            assert_eq!(MvsMode::new(mode).unwrap().resolution_level(), mode as u8);
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(MvsMode::new(4), Err(ConfigError::ValidationError(_))));
        assert!(matches!(MvsMode::new(-1), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(MvsMode::new(2).unwrap().to_string(), "2 (quarter)");
        assert_eq!(MvsMode::default().label(), "full");
    }
}
