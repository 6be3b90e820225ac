//! Merges user-supplied task fields with classifier guesses. An explicit
//! user choice always wins; the classifier only fills the gaps.

use crate::ai::{TaskClassifier, DEFAULT_CATEGORY};
use crate::models::task::{Priority, Task, UpdateTaskRequest};

/// Resolve the final category/priority pair for a task mutation.
///
/// The classifier is consulted only when at least one of the two fields is
/// missing. Always returns a usable pair; classification failures have
/// already been collapsed into defaults by the gateway.
pub async fn resolve_fields(
    classifier: &dyn TaskClassifier,
    title: &str,
    description: Option<&str>,
    category: Option<String>,
    priority: Option<Priority>,
) -> (String, Priority) {
    if let (Some(category), Some(priority)) = (&category, priority) {
        return (category.clone(), priority);
    }

    let guess = classifier.classify(title, description.unwrap_or("")).await;

    let mut category = category.unwrap_or(guess.category);
    if category.trim().is_empty() {
        category = DEFAULT_CATEGORY.to_string();
    }
    let priority = priority.unwrap_or(guess.priority);

    (category, priority)
}

/// An update re-triggers classification only when it changes the text the
/// classifier reads (title or description).
pub fn needs_reclassification(stored: &Task, update: &UpdateTaskRequest) -> bool {
    let title_changed = update
        .title
        .as_ref()
        .map_or(false, |t| *t != stored.title);
    let description_changed = update
        .description
        .as_ref()
        .map_or(false, |d| stored.description.as_deref() != Some(d.as_str()));
    title_changed || description_changed
}

/// Resolve category/priority for an update against the stored task.
///
/// Fields explicitly present in the payload always win, even when the text
/// changed; re-classification only overwrites fields the payload left out.
pub async fn resolve_update(
    classifier: &dyn TaskClassifier,
    stored: &Task,
    update: &UpdateTaskRequest,
) -> (String, Priority) {
    if needs_reclassification(stored, update) {
        let title = update.title.as_deref().unwrap_or(&stored.title);
        let description = update.description.as_deref().or(stored.description.as_deref());
        resolve_fields(
            classifier,
            title,
            description,
            update.category.clone(),
            update.priority,
        )
        .await
    } else {
        (
            update
                .category
                .clone()
                .unwrap_or_else(|| stored.category.clone()),
            update.priority.unwrap_or(stored.priority),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::test_support::{task_fixture, MockClassifier};
    use crate::ai::DEFAULT_PRIORITY;

    #[tokio::test]
    async fn user_values_skip_the_classifier() {
        let mock = MockClassifier::returning("work", Priority::High);
        let (category, priority) = resolve_fields(
            &mock,
            "Quarterly report",
            None,
            Some("finance".to_string()),
            Some(Priority::Low),
        )
        .await;

        assert_eq!(category, "finance");
        assert_eq!(priority, Priority::Low);
        assert_eq!(mock.classify_count(), 0);
    }

    #[tokio::test]
    async fn partial_override_keeps_user_field_and_fills_the_rest() {
        // The mock's category is out of the prompt vocabulary on purpose:
        // whatever the classifier answers is passed through.
        let mock = MockClassifier::returning("yak-shaving", Priority::High);
        let (category, priority) = resolve_fields(
            &mock,
            "Pay invoices",
            Some("before the end of the month"),
            Some("finance".to_string()),
            None,
        )
        .await;

        assert_eq!(category, "finance");
        assert_eq!(priority, Priority::High);
        assert_eq!(mock.classify_count(), 1);
    }

    #[tokio::test]
    async fn blank_classifier_category_falls_back_to_default() {
        let mock = MockClassifier::returning("  ", Priority::High);
        let (category, priority) = resolve_fields(&mock, "Untitled chore", None, None, None).await;

        assert_eq!(category, DEFAULT_CATEGORY);
        assert_eq!(priority, Priority::High);
    }

    #[tokio::test]
    async fn failed_classification_yields_hard_defaults() {
        let mock = MockClassifier::returning(DEFAULT_CATEGORY, DEFAULT_PRIORITY);
        let (category, priority) = resolve_fields(&mock, "Anything", None, None, None).await;

        assert_eq!(category, DEFAULT_CATEGORY);
        assert_eq!(priority, DEFAULT_PRIORITY);
    }

    #[tokio::test]
    async fn title_change_triggers_reclassification() {
        let mut stored = task_fixture("A");
        stored.category = "personal".to_string();
        stored.priority = Priority::Low;

        let mock = MockClassifier::returning("work", Priority::High);
        let update = UpdateTaskRequest {
            title: Some("B".to_string()),
            ..Default::default()
        };

        let (category, priority) = resolve_update(&mock, &stored, &update).await;
        assert_eq!(mock.classify_count(), 1);
        assert_eq!(category, "work");
        assert_eq!(priority, Priority::High);
    }

    #[tokio::test]
    async fn explicit_category_survives_reclassification() {
        let stored = task_fixture("A");
        let mock = MockClassifier::returning("work", Priority::High);
        let update = UpdateTaskRequest {
            title: Some("B".to_string()),
            category: Some("home".to_string()),
            ..Default::default()
        };

        let (category, priority) = resolve_update(&mock, &stored, &update).await;
        assert_eq!(mock.classify_count(), 1);
        assert_eq!(category, "home");
        assert_eq!(priority, Priority::High);
    }

    #[tokio::test]
    async fn unchanged_text_keeps_stored_fields() {
        let mut stored = task_fixture("A");
        stored.category = "travel".to_string();
        stored.priority = Priority::Low;

        let mock = MockClassifier::returning("work", Priority::High);
        let update = UpdateTaskRequest {
            completed: Some(true),
            ..Default::default()
        };

        let (category, priority) = resolve_update(&mock, &stored, &update).await;
        assert_eq!(mock.classify_count(), 0);
        assert_eq!(category, "travel");
        assert_eq!(priority, Priority::Low);
    }

    #[tokio::test]
    async fn unchanged_text_still_honours_explicit_fields() {
        let stored = task_fixture("A");
        let mock = MockClassifier::returning("work", Priority::High);
        let update = UpdateTaskRequest {
            priority: Some(Priority::Low),
            ..Default::default()
        };

        let (_, priority) = resolve_update(&mock, &stored, &update).await;
        assert_eq!(mock.classify_count(), 0);
        assert_eq!(priority, Priority::Low);
    }
}
