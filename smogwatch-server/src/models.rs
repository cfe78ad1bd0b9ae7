//! Domain types shared across the server

use serde::{Deserialize, Serialize};

/// Two-valued classification label.
///
/// Serialized as "smog" / "clear" both on the wire and in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmissionLabel {
    /// Visible smoke detected
    Smog,
    /// No visible smoke
    Clear,
}

impl EmissionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmissionLabel::Smog => "smog",
            EmissionLabel::Clear => "clear",
        }
    }

    /// Parse the database representation. Unknown values map to Clear so a
    /// corrupt row never aborts a listing query.
    pub fn from_db(value: &str) -> Self {
        match value {
            "smog" => EmissionLabel::Smog,
            _ => EmissionLabel::Clear,
        }
    }
}

/// Classifier output for one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: EmissionLabel,
    /// Raw model probability of the positive class, in [0,1]
    pub probability: f64,
    /// Model's self-reported certainty in its label, in [0,1]
    pub confidence: f64,
}

/// Structured result of the external vision analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionAnalysis {
    pub smoke_visible: bool,
    /// Smoke intensity estimate, 0-100
    pub severity_pct: u8,
    /// Analysis certainty, 0-100
    pub confidence_pct: u8,
    pub short_description: String,
    /// License plate if legible, otherwise "undefined"
    pub plate: String,
}

impl VisionAnalysis {
    pub fn label(&self) -> EmissionLabel {
        if self.smoke_visible {
            EmissionLabel::Smog
        } else {
            EmissionLabel::Clear
        }
    }

    /// Plate text when the service actually read one.
    pub fn detected_plate(&self) -> Option<&str> {
        let plate = self.plate.trim();
        if plate.is_empty() || plate.eq_ignore_ascii_case("undefined") {
            None
        } else {
            Some(plate)
        }
    }
}
