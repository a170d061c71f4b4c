use parley_shared::types::Prompt;

use crate::document::DocumentStore;
use crate::error::Result;

impl DocumentStore {
    pub fn list_prompts(&self) -> &[Prompt] {
        &self.document().prompts
    }

    pub fn create_prompt(&mut self, title: &str, content: &str) -> Result<Prompt> {
        let prompt = self.commit(|doc| {
            let prompt = Prompt::new(title, content);
            doc.prompts.push(prompt.clone());
            Ok(prompt)
        })?;
        tracing::debug!(prompt = %prompt.id, "prompt created");
        Ok(prompt)
    }
}
