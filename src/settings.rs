//! Mask settings shared by every image of a batch, and their JSON persistence.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::{self, PercentRect, PixelRect};

/// Target aspect ratio of the generative model. Selects the square padding policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    /// 9:16 portrait. Source images are centered in the square.
    #[default]
    #[serde(rename = "9:16")]
    NineSixteen,
    /// 4:5 portrait. Narrow sources are left-aligned in the square.
    #[serde(rename = "4:5")]
    FourFive,
}

impl AspectRatio {
    /// Canonical `W:H` label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NineSixteen => "9:16",
            Self::FourFive => "4:5",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "9:16" | "9-16" => Ok(Self::NineSixteen),
            "4:5" | "4-5" => Ok(Self::FourFive),
            other => Err(format!("unsupported aspect ratio '{other}' (expected 9:16 or 4:5)")),
        }
    }
}

/// Percentage-based mask rectangle plus presentation parameters.
///
/// Serialized as a flat JSON record:
/// `width, height, maskX, maskY, feather, opacity, aspectRatio`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskSettings {
    /// Extent, percent of image width.
    pub width: f64,
    /// Extent, percent of image height.
    pub height: f64,
    /// Left offset, percent of image width.
    pub mask_x: f64,
    /// Top offset, percent of image height.
    pub mask_y: f64,
    /// Blur radius in pixels applied to the mask edges.
    pub feather: f64,
    /// Blend strength of the generated layer, `0.0..=1.0`.
    pub opacity: f64,
    /// Padding policy for the generative model.
    pub aspect_ratio: AspectRatio,
}

impl Default for MaskSettings {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            mask_x: 0.0,
            mask_y: 0.0,
            feather: 15.0,
            opacity: 1.0,
            aspect_ratio: AspectRatio::NineSixteen,
        }
    }
}

impl MaskSettings {
    /// Whether a mask rectangle has been drawn (non-zero width and height).
    #[must_use]
    pub fn has_mask(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// The rectangle part of the settings.
    #[must_use]
    pub fn rect(&self) -> PercentRect {
        PercentRect {
            mask_x: self.mask_x,
            mask_y: self.mask_y,
            width: self.width,
            height: self.height,
        }
    }

    /// Replace the rectangle, keeping feather, opacity and aspect ratio.
    #[must_use]
    pub fn with_rect(self, rect: PercentRect) -> Self {
        Self {
            mask_x: rect.mask_x,
            mask_y: rect.mask_y,
            width: rect.width,
            height: rect.height,
            ..self
        }
    }

    /// Drop the rectangle (zero width and height), keeping everything else.
    #[must_use]
    pub fn cleared(self) -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            ..self
        }
    }

    /// The mask rectangle in pixels for a canvas of the given size.
    #[must_use]
    pub fn pixel_rect(&self, canvas_width: u32, canvas_height: u32) -> PixelRect {
        geometry::to_pixel_rect(self, canvas_width, canvas_height)
    }

    /// Check value ranges. Rectangles outside `[0, 100]` are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SettingsDecode`] for non-finite values, a negative
    /// feather, or an opacity outside `0.0..=1.0`.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("width", self.width),
            ("height", self.height),
            ("maskX", self.mask_x),
            ("maskY", self.mask_y),
            ("feather", self.feather),
            ("opacity", self.opacity),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::SettingsDecode(format!("{name} is not a finite number")));
        }
        if self.feather < 0.0 {
            return Err(Error::SettingsDecode(format!(
                "feather must be >= 0, got {}",
                self.feather
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(Error::SettingsDecode(format!(
                "opacity must be between 0 and 1, got {}",
                self.opacity
            )));
        }
        Ok(())
    }

    /// Parse and validate settings from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SettingsDecode`] on malformed JSON, an unknown aspect
    /// ratio, or values failing [`MaskSettings::validate`].
    pub fn from_json(text: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Pretty-printed JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaskNotDefined`] when there is no rectangle to save.
    pub fn to_json(&self) -> Result<String> {
        if !self.has_mask() {
            return Err(Error::MaskNotDefined);
        }
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise the errors
    /// of [`MaskSettings::from_json`].
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&text)?;
        log::debug!(
            "loaded mask settings from {}: {}x{}% at ({}%, {}%), ratio {}",
            path.display(),
            settings.width,
            settings.height,
            settings.mask_x,
            settings.mask_y,
            settings.aspect_ratio
        );
        Ok(settings)
    }

    /// Save settings as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MaskNotDefined`] with no rectangle, or [`Error::Io`]
    /// if writing fails.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Default file name, e.g. `mask_settings_9-16.json`.
    #[must_use]
    pub fn default_file_name(&self) -> String {
        format!(
            "mask_settings_{}.json",
            self.aspect_ratio.as_str().replace(':', "-")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drawn() -> MaskSettings {
        MaskSettings {
            width: 20.0,
            height: 10.0,
            mask_x: 30.0,
            mask_y: 40.0,
            ..MaskSettings::default()
        }
    }

    #[test]
    fn defaults_match_fresh_upload() {
        let s = MaskSettings::default();
        assert!(!s.has_mask());
        assert!((s.feather - 15.0).abs() < f64::EPSILON);
        assert!((s.opacity - 1.0).abs() < f64::EPSILON);
        assert_eq!(s.aspect_ratio, AspectRatio::NineSixteen);
    }

    #[test]
    fn json_uses_flat_camel_case_fields() {
        let json = drawn().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "width",
            "height",
            "maskX",
            "maskY",
            "feather",
            "opacity",
            "aspectRatio",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(obj.len(), 7);
        assert_eq!(obj["aspectRatio"], "9:16");
    }

    #[test]
    fn loads_settings_written_by_hand() {
        let text = r#"{
            "width": 12.5, "height": 8, "maskX": 80, "maskY": 3.5,
            "feather": 0, "opacity": 0.75, "aspectRatio": "4:5"
        }"#;
        let s = MaskSettings::from_json(text).unwrap();
        assert_eq!(s.aspect_ratio, AspectRatio::FourFive);
        assert!((s.mask_y - 3.5).abs() < f64::EPSILON);
        assert!((s.opacity - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_unknown_aspect_ratio() {
        let text = r#"{"width":1,"height":1,"maskX":0,"maskY":0,"feather":0,"opacity":1,"aspectRatio":"16:9"}"#;
        assert!(matches!(
            MaskSettings::from_json(text),
            Err(Error::SettingsDecode(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_presentation_values() {
        let bad_opacity = MaskSettings {
            opacity: 1.5,
            ..drawn()
        };
        assert!(bad_opacity.validate().is_err());

        let bad_feather = MaskSettings {
            feather: -1.0,
            ..drawn()
        };
        assert!(bad_feather.validate().is_err());

        let out_of_bounds_rect = MaskSettings {
            mask_x: 95.0,
            width: 30.0,
            ..drawn()
        };
        assert!(out_of_bounds_rect.validate().is_ok());
    }

    #[test]
    fn refuses_to_save_without_rectangle() {
        assert!(matches!(
            MaskSettings::default().to_json(),
            Err(Error::MaskNotDefined)
        ));
    }

    #[test]
    fn with_rect_and_cleared_keep_presentation_fields() {
        let base = MaskSettings {
            feather: 4.0,
            opacity: 0.5,
            aspect_ratio: AspectRatio::FourFive,
            ..MaskSettings::default()
        };
        let rect = PercentRect {
            mask_x: 1.0,
            mask_y: 2.0,
            width: 3.0,
            height: 4.0,
        };
        let s = base.with_rect(rect);
        assert_eq!(s.rect(), rect);
        assert!((s.feather - 4.0).abs() < f64::EPSILON);
        assert_eq!(s.aspect_ratio, AspectRatio::FourFive);

        let c = s.cleared();
        assert!(!c.has_mask());
        assert!((c.mask_x - 1.0).abs() < f64::EPSILON);
        assert!((c.opacity - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn default_file_name_encodes_ratio() {
        assert_eq!(drawn().default_file_name(), "mask_settings_9-16.json");
        let four_five = MaskSettings {
            aspect_ratio: AspectRatio::FourFive,
            ..drawn()
        };
        assert_eq!(four_five.default_file_name(), "mask_settings_4-5.json");
    }

    #[test]
    fn aspect_ratio_parses_labels() {
        assert_eq!("4:5".parse::<AspectRatio>(), Ok(AspectRatio::FourFive));
        assert_eq!("9-16".parse::<AspectRatio>(), Ok(AspectRatio::NineSixteen));
        assert!("1:1".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn save_and_load_through_file() {
        let dir = std::env::temp_dir().join(format!("batch-eraser-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(drawn().default_file_name());
        drawn().save(&path).unwrap();
        let loaded = MaskSettings::load(&path).unwrap();
        assert_eq!(loaded, drawn());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
