use crate::error::WizardError;
use crate::models::StylePreset;
use crate::services::llm::StoryGenerator;
use crate::services::wizard::StoryWizard;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::AbortHandle;

struct Inner {
    wizard: StoryWizard,
    /// The spawned generation, if one is running.
    task: Option<AbortHandle>,
}

/// The process-wide wizard and the generation task it may be waiting on.
pub struct Session {
    inner: Mutex<Inner>,
    generator: Arc<dyn StoryGenerator>,
}

impl Session {
    pub fn new(generator: Arc<dyn StoryGenerator>) -> Arc<Self> {
        Arc::new(Session {
            inner: Mutex::new(Inner {
                wizard: StoryWizard::new(),
                task: None,
            }),
            generator,
        })
    }

    /// Runs `f` with exclusive access to the wizard.
    pub async fn with_wizard<R>(&self, f: impl FnOnce(&mut StoryWizard) -> R) -> R {
        let mut inner = self.inner.lock().await;
        f(&mut inner.wizard)
    }

    /// Applies the style form and, if it resolves, starts generation.
    ///
    /// A preset in the form is applied before the typed text, so typed text
    /// wins whenever it is not blank.
    pub async fn submit_style(
        self: &Arc<Self>,
        preset: Option<StylePreset>,
        custom: &str,
    ) -> Result<(), WizardError> {
        let mut inner = self.inner.lock().await;
        if inner.wizard.in_flight().is_some() {
            return Err(WizardError::GenerationInFlight);
        }
        if let Some(preset) = preset {
            inner.wizard.select_preset(preset)?;
        }
        inner.wizard.set_custom_style(custom)?;
        let ticket = inner.wizard.submit_style()?;

        let generator = Arc::clone(&self.generator);
        let (token, theme, style) = (ticket.token, ticket.theme, ticket.style);
        let generation = tokio::spawn(async move { generator.generate(&theme, &style).await });
        inner.task = Some(generation.abort_handle());

        // A panicking generator still has to land the wizard in `Failed`.
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = match generation.await {
                Ok(outcome) => outcome,
                Err(err) if err.is_cancelled() => return,
                Err(err) => {
                    tracing::error!(error = %err, "generation task panicked");
                    Err(err.into())
                }
            };
            let mut inner = session.inner.lock().await;
            if inner.wizard.complete(token, outcome).is_ok() {
                inner.task = None;
            }
        });
        Ok(())
    }

    /// Returns to the start, cancelling any running generation.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(task) = inner.task.take() {
            task.abort();
        }
        inner.wizard.reset();
    }
}
