use crate::app::ports::BatchProcessorPort;
use crate::domain::bag::DocumentBag;
use crate::domain::batch::DocumentBatch;
use crate::error::{BatchError, BatchResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Resolves the strategy a batch names and runs it.
#[derive(Default)]
pub struct BatchProcessor {
    strategies: HashMap<String, Arc<dyn BatchProcessorPort>>,
}

impl BatchProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, strategy: Arc<dyn BatchProcessorPort>) -> &mut Self {
        self.strategies.insert(name.into(), strategy);
        self
    }

    pub fn list_strategies(&self) -> Vec<&str> {
        self.strategies.keys().map(|k| k.as_str()).collect()
    }

    pub async fn process(&self, batch: &DocumentBatch) -> BatchResult<Vec<DocumentBag>> {
        let name = batch.strategy();
        let strategy = self.strategies.get(name).ok_or_else(|| BatchError::UnknownStrategy {
            strategy: name.to_string(),
            batch: Box::new(batch.clone()),
        })?;

        match strategy.process(batch).await {
            Ok(bags) => {
                info!(file = %batch.file().display(), strategy = name, documents = bags.len(), "Batch processed");
                Ok(bags)
            }
            Err(message) => {
                warn!(file = %batch.file().display(), strategy = name, error = %message, "Batch processing failed");
                Err(BatchError::Processing {
                    message,
                    batch: Box::new(batch.clone()),
                })
            }
        }
    }
}
