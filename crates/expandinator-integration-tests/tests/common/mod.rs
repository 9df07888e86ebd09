#![allow(dead_code)]

use std::sync::Arc;

use expandinator_playground::{Playground, PlaygroundOptions, TextDocumentFactory};
use expandinator_registry::{TargetRegistry, TargetSource};

pub async fn playground(source: Arc<dyn TargetSource>) -> Playground {
    expandinator_test::setup_test_logging_default();
    let registry = TargetRegistry::connect(source).await.unwrap();
    Playground::new(registry, &TextDocumentFactory, PlaygroundOptions::default())
}

/// Process completions until `done` holds, failing after `limit` steps.
pub async fn process_until(
    playground: &mut Playground,
    limit: usize,
    done: impl Fn(&Playground) -> bool,
) {
    for _ in 0..limit {
        if done(playground) {
            return;
        }
        assert!(playground.process_next().await, "nothing left in flight");
    }
    assert!(done(playground), "condition not reached");
}
