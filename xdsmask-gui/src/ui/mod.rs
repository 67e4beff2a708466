//! UI rendering modules.
//!
//! - `control_panel`: top bar and left sidebar with session controls
//! - `main_view`: central annotation canvas
//! - `dialogs`: cancel prompt and command window

mod control_panel;
mod dialogs;
mod main_view;
pub mod theme;
