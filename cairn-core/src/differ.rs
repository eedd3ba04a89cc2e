//! Differ - Compare desired state with current state
//!
//! Decides whether a resource has to be created, updated in place, or left
//! alone, and which of its attributes drifted.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = changed_attributes(&desired.attributes, &current.attributes);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find attributes whose desired value differs from the current one
///
/// Only attributes present in `desired` are compared; attributes the remote
/// side computes on its own are not drift. The result is sorted.
pub fn changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        match current.get(key) {
            Some(current_value) if same_value(current_value, desired_value) => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

/// Lists are compared as sets: remote APIs do not preserve declaration order
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(xs), Value::List(ys)) => {
            xs.len() == ys.len()
                && xs.iter().all(|x| ys.iter().any(|y| same_value(x, y)))
                && ys.iter().all(|y| xs.iter().any(|x| same_value(x, y)))
        }
        (Value::Map(xs), Value::Map(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| same_value(x, y)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn existing(attrs: Vec<(&str, Value)>) -> State {
        let attrs = attrs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        State::existing(ResourceId::new("elasticache.parameter_group", "test"), attrs)
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("elasticache.parameter_group", "test");
        let current = State::not_found(ResourceId::new("elasticache.parameter_group", "test"));

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::Create(_)));
        assert!(result.is_change());
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("elasticache.parameter_group", "test")
            .with_attribute("family", Value::String("redis7".to_string()));
        let current = existing(vec![
            ("family", Value::String("redis7".to_string())),
            ("arn", Value::String("arn:aws:elasticache:::pg".to_string())),
        ]);

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::NoChange(_)));
        assert!(!result.is_change());
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("elasticache.parameter_group", "test")
            .with_attribute("family", Value::String("redis7".to_string()))
            .with_attribute("description", Value::String("new".to_string()));
        let current = existing(vec![
            ("family", Value::String("redis7".to_string())),
            ("description", Value::String("old".to_string())),
        ]);

        match diff(&desired, &current) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["description".to_string()]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn list_order_is_not_drift() {
        let desired = Resource::new("elasticache.serverless_cache", "test").with_attribute(
            "subnet_ids",
            Value::string_list(["subnet-b", "subnet-a"]),
        );
        let current = existing(vec![(
            "subnet_ids",
            Value::string_list(["subnet-a", "subnet-b"]),
        )]);

        assert!(matches!(diff(&desired, &current), Diff::NoChange(_)));
    }

    #[test]
    fn internal_attributes_are_skipped() {
        let desired = Resource::new("elasticache.parameter_group", "test")
            .with_attribute("_note", Value::String("ignored".to_string()));
        let current = existing(vec![]);

        assert!(changed_attributes(&desired.attributes, &current.attributes).is_empty());
    }
}
