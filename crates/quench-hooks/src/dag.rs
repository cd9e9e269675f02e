//! Dependency layering for hook scheduling.

use std::collections::HashSet;

use quench_core::{HookDefinition, QuenchError};

/// Layer hooks into execution waves.
///
/// Within a wave no two hooks have a dependency edge; every hook's
/// dependencies land in strictly earlier waves. Dependencies on hooks not in
/// `defs` (already satisfied elsewhere, e.g. served from cache) are ignored.
/// An unresolvable remainder means a cycle.
pub fn waves<'a>(
    defs: &[&'a HookDefinition],
) -> Result<Vec<Vec<&'a HookDefinition>>, QuenchError> {
    let names: HashSet<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    let mut remaining: Vec<&HookDefinition> = defs.to_vec();
    let mut satisfied: HashSet<String> = HashSet::new();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let (ready, blocked): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|def| {
            def.depends_on
                .iter()
                .all(|dep| satisfied.contains(dep) || !names.contains(dep.as_str()))
        });
        if ready.is_empty() {
            let cycle = blocked.iter().map(|d| d.name.clone()).collect();
            return Err(QuenchError::DependencyCycle { cycle });
        }
        for def in &ready {
            satisfied.insert(def.name.clone());
        }
        layers.push(ready);
        remaining = blocked;
    }
    Ok(layers)
}
