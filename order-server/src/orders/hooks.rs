//! Post-commit hooks
//!
//! Side effects that must only happen after a projection has committed.
//! The caller of [`Projector::project`](super::Projector::project) runs the
//! list; a failing hook is logged and never undoes or fails the projection.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use super::projector::ProjectionOutcome;

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait PostCommitHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn after_projection(&self, outcome: &ProjectionOutcome) -> Result<(), HookError>;
}

/// Ordered list of hooks, run one after another
#[derive(Clone, Default)]
pub struct PostCommitHooks {
    hooks: Vec<Arc<dyn PostCommitHook>>,
}

impl PostCommitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn run(&self, outcome: &ProjectionOutcome) {
        for hook in &self.hooks {
            if let Err(e) = hook.after_projection(outcome).await {
                warn!(
                    hook = hook.name(),
                    order_id = outcome.order_id,
                    error = %e,
                    "Post-commit hook failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for PostCommitHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    #[async_trait]
    impl PostCommitHook for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn after_projection(&self, _outcome: &ProjectionOutcome) -> Result<(), HookError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl PostCommitHook for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn after_projection(&self, _outcome: &ProjectionOutcome) -> Result<(), HookError> {
            Err("subscriber gone".into())
        }
    }

    #[tokio::test]
    async fn test_failing_hook_does_not_stop_the_rest() {
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let hooks = PostCommitHooks::new()
            .with(Arc::new(Failing))
            .with(counting.clone());

        let outcome = ProjectionOutcome {
            order_id: 1,
            applied: 1,
            skipped: 0,
            cursor: 1,
        };
        hooks.run(&outcome).await;
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }
}
