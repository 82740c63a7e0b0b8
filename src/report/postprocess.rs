//! Fixed-order rewrites applied to a finished report.

use serde_json::Value;
use tracing::debug;

use super::graph::{link_child, unlink_child, Item, Report};

type Step = fn(&mut Report) -> usize;

/// Rewrites in application order. Each returns how many items it changed.
const STEPS: &[(&str, Step)] = &[
    ("rename-by-package", rename_by_package),
    ("hoist-required-wrapper", hoist_required_wrappers),
];

/// Module item type whose single-child wrappers get hoisted.
pub const MODULE_TYPE: &str = "module";

/// Apply every rewrite to a copy of `report`.
pub fn post_process(report: &Report) -> Report {
    let mut out = report.clone();
    for (name, step) in STEPS {
        let changed = step(&mut out);
        debug!(step = *name, changed, "Post-process step applied");
    }
    out
}

/// Items carrying package metadata take the package name.
pub fn rename_by_package(report: &mut Report) -> usize {
    let mut changed = 0;
    for item in report.items.values_mut() {
        let package_name = item
            .attr("package")
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .map(String::from);
        if let Some(name) = package_name {
            item.name = name;
            changed += 1;
        }
    }
    changed
}

/// Elide module wrappers with a single child under required items.
///
/// For `R -> M -> X` where `R` is flagged `required`, `M` is R's only child,
/// is a module and has exactly one child: R lists X in M's place, X lists R
/// in place of M, and M loses both links.
pub fn hoist_required_wrappers(report: &mut Report) -> usize {
    let candidates: Vec<(String, String, String)> = report
        .items
        .values()
        .filter(|r| r.attr("required") == Some(&Value::Bool(true)) && r.items.len() == 1)
        .filter_map(|r| {
            let wrapper = report.items.get(&r.items[0])?;
            if wrapper.kind != MODULE_TYPE || wrapper.items.len() != 1 || wrapper.items[0] == r.key {
                return None;
            }
            Some((r.key.clone(), wrapper.key.clone(), wrapper.items[0].clone()))
        })
        .collect();

    let mut changed = 0;
    for (required, wrapper, inner) in candidates {
        // An earlier hoist may have rewired this chain
        let still_applies = report.items.get(&required).map_or(false, |r| r.items == [wrapper.clone()])
            && report.items.get(&wrapper).map_or(false, |w| w.items == [inner.clone()]);
        if !still_applies || hoist(report, &required, &wrapper, &inner).is_none() {
            continue;
        }
        changed += 1;
    }
    changed
}

fn hoist(report: &mut Report, required: &str, wrapper: &str, inner: &str) -> Option<()> {
    let wrapper_kind = report.items.get(wrapper)?.kind.clone();
    let inner_kind = report.items.get(inner)?.kind.clone();

    let r = report.items.get_mut(required)?;
    let already_child = r.items.iter().any(|k| k == inner);
    unlink_child(r, wrapper, &wrapper_kind);
    if !already_child {
        link_child(r, inner, &inner_kind);
    }

    let w = report.items.get_mut(wrapper)?;
    unlink_child(w, inner, &inner_kind);
    w.groups.retain(|g| g != required);

    let x: &mut Item = report.items.get_mut(inner)?;
    x.groups.retain(|g| g != wrapper);
    if !x.groups.iter().any(|g| g == required) {
        x.groups.push(required.to_string());
    }
    Some(())
}
