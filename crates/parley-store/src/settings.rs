use parley_shared::types::{Settings, SettingsPatch};

use crate::document::DocumentStore;
use crate::error::Result;

impl DocumentStore {
    /// Process-wide generation settings.
    pub fn settings(&self) -> &Settings {
        &self.document().settings
    }

    /// Merge `patch` into the process-wide settings and return the result.
    pub fn update_settings(&mut self, patch: SettingsPatch) -> Result<Settings> {
        let settings = self.commit(|doc| {
            doc.settings.merge(patch);
            Ok(doc.settings.clone())
        })?;
        tracing::info!(
            model = %settings.model,
            temperature = settings.temperature,
            max_tokens = settings.max_tokens,
            "settings updated"
        );
        Ok(settings)
    }
}
