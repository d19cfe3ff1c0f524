//! JSON presets holding normalized control values
//!
//! ```json
//! { "name": "octave up", "pitch_shift": 0.75, "mix": 1.0 }
//! ```
//!
//! Every field is optional; missing controls keep whatever the surface
//! already holds. Values are normalized [0, 1] and clamped on apply.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use pf_dsp::{ControlSurface, ParamIndex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Preset {
    pub name: Option<String>,
    pub time_stretch: Option<f64>,
    pub pitch_shift: Option<f64>,
    pub spectral_smear: Option<f64>,
    pub transient_preserve: Option<f64>,
    pub phase_reset: Option<f64>,
    pub spectral_gate: Option<f64>,
    pub mix: Option<f64>,
    pub freeze: Option<f64>,
    pub transient_attack: Option<f64>,
    pub transient_release: Option<f64>,
}

impl Preset {
    pub fn from_json(json: &str) -> Result<Self> {
        let preset: Preset = serde_json::from_str(json).context("Malformed preset JSON")?;
        preset.validate()?;
        Ok(preset)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read preset {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Invalid preset {}", path.display()))
    }

    /// Capture the current targets of a surface
    pub fn capture(name: impl Into<String>, controls: &ControlSurface) -> Self {
        let mut preset = Preset {
            name: Some(name.into()),
            ..Preset::default()
        };
        for param in ParamIndex::ALL {
            *preset.slot_mut(param) = Some(controls.get(param));
        }
        preset
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize preset")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .with_context(|| format!("Failed to write preset {}", path.display()))
    }

    /// Values present in the preset, in parameter order
    pub fn values(&self) -> impl Iterator<Item = (ParamIndex, f64)> + '_ {
        ParamIndex::ALL
            .into_iter()
            .filter_map(|param| self.slot(param).map(|value| (param, value)))
    }

    /// Write every present value into the surface
    pub fn apply(&self, controls: &ControlSurface) {
        let mut values = controls.snapshot();
        for (param, value) in self.values() {
            values[param.index()] = value;
        }
        controls.apply(&values);
    }

    fn validate(&self) -> Result<()> {
        for (param, value) in self.values() {
            if !value.is_finite() {
                bail!("{} is not a finite value", param.name());
            }
        }
        Ok(())
    }

    fn slot(&self, param: ParamIndex) -> Option<f64> {
        match param {
            ParamIndex::TimeStretch => self.time_stretch,
            ParamIndex::PitchShift => self.pitch_shift,
            ParamIndex::SpectralSmear => self.spectral_smear,
            ParamIndex::TransientPreserve => self.transient_preserve,
            ParamIndex::PhaseReset => self.phase_reset,
            ParamIndex::SpectralGate => self.spectral_gate,
            ParamIndex::Mix => self.mix,
            ParamIndex::Freeze => self.freeze,
            ParamIndex::TransientAttack => self.transient_attack,
            ParamIndex::TransientRelease => self.transient_release,
        }
    }

    fn slot_mut(&mut self, param: ParamIndex) -> &mut Option<f64> {
        match param {
            ParamIndex::TimeStretch => &mut self.time_stretch,
            ParamIndex::PitchShift => &mut self.pitch_shift,
            ParamIndex::SpectralSmear => &mut self.spectral_smear,
            ParamIndex::TransientPreserve => &mut self.transient_preserve,
            ParamIndex::PhaseReset => &mut self.phase_reset,
            ParamIndex::SpectralGate => &mut self.spectral_gate,
            ParamIndex::Mix => &mut self.mix,
            ParamIndex::Freeze => &mut self.freeze,
            ParamIndex::TransientAttack => &mut self.transient_attack,
            ParamIndex::TransientRelease => &mut self.transient_release,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_preset_keeps_other_controls() {
        let preset = Preset::from_json(r#"{ "name": "up", "pitch_shift": 0.75 }"#).unwrap();
        assert_eq!(preset.name.as_deref(), Some("up"));
        assert_eq!(preset.values().count(), 1);

        let controls = ControlSurface::new();
        controls.set_param(ParamIndex::Mix, 0.4);
        preset.apply(&controls);

        assert_eq!(controls.get(ParamIndex::PitchShift), 0.75);
        assert_eq!(controls.get(ParamIndex::Mix), 0.4);
        assert_eq!(controls.get(ParamIndex::TimeStretch), 0.5);
    }

    #[test]
    fn test_out_of_range_values_clamp_on_apply() {
        let preset = Preset::from_json(r#"{ "mix": 3.0, "spectral_gate": -1.0 }"#).unwrap();
        let controls = ControlSurface::new();
        preset.apply(&controls);
        assert_eq!(controls.get(ParamIndex::Mix), 1.0);
        assert_eq!(controls.get(ParamIndex::SpectralGate), 0.0);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Preset::from_json(r#"{ "formant": 0.5 }"#).is_err());
        assert!(Preset::from_json("not json").is_err());
    }

    #[test]
    fn test_capture_round_trip() {
        let controls = ControlSurface::new();
        controls.set_param(ParamIndex::Freeze, 1.0);
        controls.set_param(ParamIndex::SpectralSmear, 0.3);

        let json = Preset::capture("frozen", &controls).to_json().unwrap();
        let preset = Preset::from_json(&json).unwrap();
        assert_eq!(preset.values().count(), ParamIndex::COUNT);

        let restored = ControlSurface::new();
        preset.apply(&restored);
        assert_eq!(restored.snapshot(), controls.snapshot());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preset.json");
        fs::write(&path, r#"{ "time_stretch": 0.75 }"#).unwrap();

        let preset = Preset::load(&path).unwrap();
        assert_eq!(preset.time_stretch, Some(0.75));

        let saved = dir.path().join("saved.json");
        Preset::capture("saved", &ControlSurface::new()).save(&saved).unwrap();
        assert_eq!(Preset::load(&saved).unwrap().name.as_deref(), Some("saved"));
        assert!(Preset::load(&dir.path().join("missing.json")).is_err());
    }
}
