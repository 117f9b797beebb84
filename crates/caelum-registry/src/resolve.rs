//! Dependency ordering for component loading.

use caelum_core::RegistryError;
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Topologically sorts components so every dependency precedes its
/// dependents.
///
/// Input pairs are `(qualified name, dependency qualified names)`. Unknown
/// dependencies and cycles are errors.
pub fn sort_components(
    components: &[(String, Vec<String>)],
) -> Result<Vec<String>, RegistryError> {
    let index: HashMap<&str, usize> = components
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name.as_str(), i))
        .collect();

    let mut marks = vec![Mark::Unvisited; components.len()];
    let mut order = Vec::with_capacity(components.len());

    fn visit(
        at: usize,
        components: &[(String, Vec<String>)],
        index: &HashMap<&str, usize>,
        marks: &mut [Mark],
        order: &mut Vec<String>,
    ) -> Result<(), RegistryError> {
        match marks[at] {
            Mark::Done => return Ok(()),
            Mark::InProgress => {
                return Err(RegistryError::DependencyCycle {
                    name: components[at].0.clone(),
                })
            }
            Mark::Unvisited => {}
        }
        marks[at] = Mark::InProgress;
        for dependency in &components[at].1 {
            let &target = index.get(dependency.as_str()).ok_or_else(|| {
                RegistryError::DependencyNotFound {
                    name: components[at].0.clone(),
                    dependency: dependency.clone(),
                }
            })?;
            visit(target, components, index, marks, order)?;
        }
        marks[at] = Mark::Done;
        order.push(components[at].0.clone());
        Ok(())
    }

    for at in 0..components.len() {
        visit(at, components, &index, &mut marks, &mut order)?;
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(name: &str, deps: &[&str]) -> (String, Vec<String>) {
        (
            name.to_string(),
            deps.iter().map(|d| d.to_string()).collect(),
        )
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let order = sort_components(&[
            pair("camera.main", &["focuser.main", "mount.main"]),
            pair("focuser.main", &["mount.main"]),
            pair("mount.main", &[]),
        ])
        .unwrap();
        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        assert!(position("mount.main") < position("focuser.main"));
        assert!(position("focuser.main") < position("camera.main"));
    }

    #[test]
    fn test_cycle_detected() {
        let err = sort_components(&[
            pair("a.x", &["b.y"]),
            pair("b.y", &["a.x"]),
        ])
        .unwrap_err();
        assert!(matches!(err, RegistryError::DependencyCycle { .. }));
    }

    #[test]
    fn test_unknown_dependency() {
        let err = sort_components(&[pair("a.x", &["ghost.z"])]).unwrap_err();
        assert!(matches!(err, RegistryError::DependencyNotFound { .. }));
    }

    #[test]
    fn test_stable_for_independent_components() {
        let order = sort_components(&[pair("a.x", &[]), pair("b.y", &[]), pair("c.z", &[])])
            .unwrap();
        assert_eq!(order, vec!["a.x", "b.y", "c.z"]);
    }
}
