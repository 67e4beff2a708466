//! JSON persistence of annotation state.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use xdsmask_core::MaskState;

use crate::error::{Error, Result};

/// Writes `state` as pretty-printed JSON.
///
/// # Errors
/// `Io` or `Json` on failure.
pub fn save_state(path: &Path, state: &MaskState) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, state)?;
    writer.flush()?;
    log::info!("saved {} masks to {}", state.masks.len(), path.display());
    Ok(())
}

/// Reads a state written by [`save_state`] and validates its geometry and gaps.
///
/// # Errors
/// `InputMissing` if the file is absent, `Json` if it is malformed, `Core`
/// if the stored geometry or gap grid is invalid.
pub fn load_state(path: &Path) -> Result<MaskState> {
    if !path.is_file() {
        return Err(Error::InputMissing(path.display().to_string()));
    }
    let reader = BufReader::new(File::open(path)?);
    let state: MaskState = serde_json::from_reader(reader)?;
    state.geometry.validate()?;
    state.gaps.validate()?;
    Ok(state)
}
