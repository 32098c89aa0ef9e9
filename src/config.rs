//! Processing parameters of a pattern and the commands that change them.

use crate::pattern::{PatternData, PatternId};
use serde::{Deserialize, Serialize};

/// Parameters handed to the background extractor when nothing else is configured.
pub const DEFAULT_AUTO_BACKGROUND_PARAMETERS: [f64; 3] = [0.1, 50.0, 50.0];

/// Configuration of the automatic background subtraction.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct AutoBackgroundSettings {
    pub enabled: bool,
    /// Opaque parameter triple forwarded to the extractor.
    pub parameters: [f64; 3],
    /// x interval the background is extracted on, clamped to the data extent on every
    /// recalculation.
    pub roi: Option<[f64; 2]>,
}

impl Default for AutoBackgroundSettings {
    fn default() -> Self {
        AutoBackgroundSettings {
            enabled: false,
            parameters: DEFAULT_AUTO_BACKGROUND_PARAMETERS,
            roi: None,
        }
    }
}

/// Live processing parameters of one pattern.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct PatternSettings {
    pub offset: f64,
    /// Multiplicative factor, never negative.
    pub scale: f64,
    /// Gaussian smoothing width in samples, `0` disables smoothing.
    pub smoothing: f64,
    pub auto_background: AutoBackgroundSettings,
}

impl Default for PatternSettings {
    fn default() -> Self {
        PatternSettings {
            offset: 0.0,
            scale: 1.0,
            smoothing: 0.0,
            auto_background: AutoBackgroundSettings::default(),
        }
    }
}

impl PatternSettings {
    /// Stores `value` as scale, flooring negative requests to zero.
    pub fn set_scale(&mut self, value: f64) {
        self.scale = if value < 0.0 { 0.0 } else { value };
    }
}

/// A single change to a pattern, applied by [`crate::engine::PatternEngine::apply`].
///
/// Every command triggers a full recalculation of the pattern and of the patterns that use
/// it as reference background.
#[derive(Debug, Clone)]
pub enum ConfigCommand {
    /// Replaces the original data and resets scale and offset.
    SetOriginal(PatternData),
    SetOffset(f64),
    SetScale(f64),
    SetSmoothing(f64),
    SetReferenceBackground(Option<PatternId>),
    EnableAutoBackground {
        parameters: [f64; 3],
        roi: Option<[f64; 2]>,
    },
    DisableAutoBackground,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = PatternSettings::default();
        assert_eq!(settings.scale, 1.0);
        assert_eq!(settings.offset, 0.0);
        assert!(!settings.auto_background.enabled);
        assert_eq!(settings.auto_background.parameters, [0.1, 50.0, 50.0]);
    }

    #[test]
    fn test_negative_scale_is_floored() {
        let mut settings = PatternSettings::default();
        settings.set_scale(-5.0);
        assert_eq!(settings.scale, 0.0);
        settings.set_scale(2.5);
        assert_eq!(settings.scale, 2.5);
    }

    #[test]
    fn test_settings_survive_serialization() {
        let mut settings = PatternSettings::default();
        settings.offset = -3.25;
        settings.auto_background.enabled = true;
        settings.auto_background.roi = Some([1.0, 9.0]);
        let json = serde_json::to_string(&settings).unwrap();
        let restored: PatternSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, settings);
    }
}
