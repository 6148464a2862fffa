//! Declarative user-interface and metadata instruction lists
//!
//! These are single-pass instruction lists with no control flow and no
//! stack: each instruction maps 1:1 to one emitted declaration in the
//! rendered output. Widget zones are bound to real-heap cells by offset.

use serde::{Deserialize, Serialize};

/// One user-interface layout instruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UiInstruction {
    /// Open a vertical layout group
    OpenVerticalBox {
        /// Group label
        label: String,
    },
    /// Open a horizontal layout group
    OpenHorizontalBox {
        /// Group label
        label: String,
    },
    /// Open a tabbed layout group
    OpenTabBox {
        /// Group label
        label: String,
    },
    /// Close the innermost open group
    CloseBox,
    /// Momentary button bound to a real-heap cell
    AddButton {
        /// Widget label
        label: String,
        /// Real-heap zone offset
        offset: i32,
    },
    /// Toggle bound to a real-heap cell
    AddCheckButton {
        /// Widget label
        label: String,
        /// Real-heap zone offset
        offset: i32,
    },
    /// Horizontal slider
    AddHorizontalSlider {
        /// Widget label
        label: String,
        /// Real-heap zone offset
        offset: i32,
        /// Initial value
        init: f64,
        /// Minimum value
        min: f64,
        /// Maximum value
        max: f64,
        /// Step increment
        step: f64,
    },
    /// Vertical slider
    AddVerticalSlider {
        /// Widget label
        label: String,
        /// Real-heap zone offset
        offset: i32,
        /// Initial value
        init: f64,
        /// Minimum value
        min: f64,
        /// Maximum value
        max: f64,
        /// Step increment
        step: f64,
    },
    /// Numeric entry field
    AddNumEntry {
        /// Widget label
        label: String,
        /// Real-heap zone offset
        offset: i32,
        /// Initial value
        init: f64,
        /// Minimum value
        min: f64,
        /// Maximum value
        max: f64,
        /// Step increment
        step: f64,
    },
    /// Horizontal level display
    AddHorizontalBargraph {
        /// Widget label
        label: String,
        /// Real-heap zone offset
        offset: i32,
        /// Minimum value
        min: f64,
        /// Maximum value
        max: f64,
    },
    /// Vertical level display
    AddVerticalBargraph {
        /// Widget label
        label: String,
        /// Real-heap zone offset
        offset: i32,
        /// Minimum value
        min: f64,
        /// Maximum value
        max: f64,
    },
    /// Soundfile widget; no text lowering yet
    AddSoundFile {
        /// Widget label
        label: String,
    },
    /// Key/value declaration bound to a zone, or to the whole unit when
    /// `offset` is `None`
    Declare {
        /// Real-heap zone offset, `None` for the unit-level zone
        offset: Option<i32>,
        /// Declaration key
        key: String,
        /// Declaration value
        value: String,
    },
}

/// One metadata key/value declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaDeclaration {
    /// Declaration key
    pub key: String,
    /// Declaration value
    pub value: String,
}

impl MetaDeclaration {
    /// Create a declaration
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_zone_binding() {
        let unit = UiInstruction::Declare {
            offset: None,
            key: "options".to_string(),
            value: "[osc]".to_string(),
        };
        let zone = UiInstruction::Declare {
            offset: Some(4),
            key: "unit".to_string(),
            value: "Hz".to_string(),
        };
        assert_ne!(unit, zone);
    }
}
