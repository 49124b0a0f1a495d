// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parsing and validation of scene options.

use thiserror::Error;

use crate::options::SceneOptions;

/// Error type for option parsing and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// A field holds a value the lifecycle cannot work with.
    #[error("invalid option `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Human-readable constraint that was violated.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl SceneOptions {
    /// Parse options from a JSON document and validate them.
    ///
    /// Missing fields take their defaults, so `{}` is a valid document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Build options from an already-parsed JSON value.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_value(value)?;
        options.validate()?;
        Ok(options)
    }

    /// Check the numeric constraints camera and renderer construction rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let camera = &self.camera;
        if !positive(camera.near) {
            return Err(ConfigError::invalid("camera.near", "must be > 0"));
        }
        if !positive(camera.far - camera.near) {
            return Err(ConfigError::invalid("camera.far", "must be > camera.near"));
        }
        if !positive(camera.fov_y_degrees) || camera.fov_y_degrees >= 180.0 {
            return Err(ConfigError::invalid(
                "camera.fov",
                format!("{} is outside (0, 180)", camera.fov_y_degrees),
            ));
        }
        if !positive(camera.frustum_size) {
            return Err(ConfigError::invalid("camera.frustumSize", "must be > 0"));
        }
        if !camera.auto_rotate_speed.is_finite() {
            return Err(ConfigError::invalid("camera.autoRotateSpeed", "must be finite"));
        }
        if !positive(self.renderer.max_pixel_ratio) {
            return Err(ConfigError::invalid("renderer.maxPixelRatio", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.visibility.threshold) {
            return Err(ConfigError::invalid(
                "visibility.threshold",
                "must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let options = SceneOptions::from_json_str("{}").unwrap();
        assert_eq!(options, SceneOptions::default());
    }

    #[test]
    fn camel_case_fields_are_recognized() {
        let options = SceneOptions::from_json_str(
            r#"{ "containerName": "hero-stars", "zIndex": 3, "camera": { "autoRotateSpeed": 0.01 } }"#,
        )
        .unwrap();
        assert_eq!(options.container_name.as_deref(), Some("hero-stars"));
        assert_eq!(options.z_index, 3);
        approx::assert_relative_eq!(options.camera.auto_rotate_speed, 0.01);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = SceneOptions::from_json_str(r#"{ "camra": {} }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Serde(_)));
    }

    #[test]
    fn far_plane_before_near_plane_is_invalid() {
        let err = SceneOptions::from_json_str(r#"{ "camera": { "near": 10.0, "far": 1.0 } }"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "camera.far",
                ..
            }
        ));
    }

    #[test]
    fn threshold_out_of_range_is_invalid() {
        let err = SceneOptions::from_json_str(r#"{ "visibility": { "threshold": 1.5 } }"#)
            .unwrap_err();
        assert!(err.to_string().contains("visibility.threshold"));
    }
}
