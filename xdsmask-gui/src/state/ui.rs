//! UI state for overlays, forms and dialogs.

use xdsmask_core::{DetectorGeometry, GapGridConfig, ShapeKind};

/// Editable copy of the geometry; applied to the session on demand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryForm {
    pub geometry: DetectorGeometry,
    /// The user changed a field since the last sync.
    pub dirty: bool,
}

impl GeometryForm {
    /// Refresh from the authoritative geometry unless the user is editing.
    pub fn sync(&mut self, current: &DetectorGeometry) {
        if !self.dirty {
            self.geometry = current.clone();
        }
    }

    /// Drop pending edits.
    pub fn reset(&mut self, current: &DetectorGeometry) {
        self.geometry = current.clone();
        self.dirty = false;
    }
}

/// Overlay toggles and dialog visibility.
pub struct UiState {
    pub show_rings: bool,
    pub ring_count: u32,
    pub show_ice_rings: bool,
    pub show_gaps: bool,
    /// Cancel prompt offering both cancel scopes.
    pub show_cancel_prompt: bool,
    pub show_command: bool,
    pub geometry_form: GeometryForm,
    /// Gap grid being edited; sent to the session on change.
    pub gap_form: GapGridConfig,
    pub shape_kind: ShapeKind,
    /// Unit cell as typed, six numbers.
    pub cell_text: String,
    /// Macros as typed, whitespace separated.
    pub macros_text: String,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            show_rings: true,
            ring_count: 8,
            show_ice_rings: false,
            show_gaps: true,
            show_cancel_prompt: false,
            show_command: false,
            geometry_form: GeometryForm::default(),
            gap_form: GapGridConfig::default(),
            shape_kind: ShapeKind::default(),
            cell_text: String::new(),
            macros_text: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_sync_respects_edits() {
        let mut form = GeometryForm::default();
        let mut current = DetectorGeometry {
            distance_mm: 300.0,
            ..DetectorGeometry::default()
        };
        form.sync(&current);
        assert_eq!(form.geometry, current);

        form.geometry.wavelength_a = 0.9;
        form.dirty = true;
        current.distance_mm = 310.0;
        form.sync(&current);
        assert!((form.geometry.wavelength_a - 0.9).abs() < f64::EPSILON);

        form.reset(&current);
        assert!(!form.dirty);
        assert_eq!(form.geometry, current);
    }
}
