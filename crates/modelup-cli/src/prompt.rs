//! Interactive terminal prompts backed by dialoguer.

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, MultiSelect};
use modelup_core::{SelectionError, VersionSelector};
use std::io;

/// Terminal prompts. Ctrl-C and Esc both count as an interrupt.
pub struct DialoguerSelector {
    theme: ColorfulTheme,
}

impl DialoguerSelector {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl VersionSelector for DialoguerSelector {
    fn confirm(&self, message: &str) -> Result<bool, SelectionError> {
        Confirm::with_theme(&self.theme)
            .with_prompt(message)
            .default(false)
            .interact_opt()
            .map_err(prompt_error)?
            .ok_or(SelectionError::Interrupted)
    }

    fn choose_many(&self, message: &str, options: &[String]) -> Result<Vec<String>, SelectionError> {
        let picked = MultiSelect::with_theme(&self.theme)
            .with_prompt(message)
            .items(options)
            .interact_opt()
            .map_err(prompt_error)?
            .ok_or(SelectionError::Interrupted)?;

        Ok(picked.into_iter().map(|i| options[i].clone()).collect())
    }
}

fn prompt_error(err: dialoguer::Error) -> SelectionError {
    let dialoguer::Error::IO(err) = err;
    if err.kind() == io::ErrorKind::Interrupted {
        SelectionError::Interrupted
    } else {
        SelectionError::Io(err)
    }
}
