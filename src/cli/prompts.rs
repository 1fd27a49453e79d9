//! Interactive prompts using dialoguer

use anyhow::Result;
use dialoguer::Confirm;

use crate::pipeline::ModelPaths;

/// Prompt user to confirm proceeding with an action
pub fn confirm_step(message: &str) -> Result<bool> {
    let confirmed = Confirm::new()
        .with_prompt(message)
        .default(true)
        .interact()?;
    Ok(confirmed)
}

/// Ask before replacing fitted models; always true when nothing would be replaced
pub fn confirm_overwrite_models(paths: &ModelPaths) -> Result<bool> {
    if !paths.any_exist() {
        return Ok(true);
    }
    let message = format!(
        "Fitted models already exist in {}. Overwrite them?",
        crate::pipeline::loader::parent_dir(&paths.encoder).display()
    );
    confirm_step(&message)
}
