//! Named rule sets and their resolution order.

use tracing::{debug, warn};

use crate::error::RuleLoadError;
use crate::report::{self, ReportGraph};
use crate::transform;
use crate::walk::RuleSet;

/// Rule set used when nothing else is configured.
pub const DEFAULT_RULE_SET: &str = "default";

/// Rule set with no rules.
pub const EMPTY_RULE_SET: &str = "none";

/// Built-in transform rule sets.
pub fn transform_rule_set(name: &str) -> Option<RuleSet<()>> {
    match name {
        DEFAULT_RULE_SET => Some(transform::default_rules()),
        EMPTY_RULE_SET => Some(Vec::new()),
        _ => None,
    }
}

/// Built-in report rule sets.
pub fn report_rule_set(name: &str) -> Option<RuleSet<ReportGraph>> {
    match name {
        DEFAULT_RULE_SET => Some(report::default_rules()),
        EMPTY_RULE_SET => Some(Vec::new()),
        _ => None,
    }
}

/// Pick the rule set for a pass.
///
/// Order: explicit in-process rules, then the caller-named set, then the
/// project-configured set, then the built-in default. Names that do not
/// resolve are skipped with a warning.
pub fn resolve_rules<S>(
    pass: &str,
    explicit: Option<RuleSet<S>>,
    requested: Option<&str>,
    configured: Option<&str>,
    lookup: impl Fn(&str) -> Option<RuleSet<S>>,
) -> Result<RuleSet<S>, RuleLoadError> {
    if let Some(rules) = explicit {
        debug!(pass, rules = rules.len(), "Using in-process rules");
        return Ok(rules);
    }

    let mut tried = Vec::new();
    let candidates = [("caller", requested), ("project", configured), ("built-in", Some(DEFAULT_RULE_SET))];
    for (origin, name) in candidates {
        let Some(name) = name else {
            continue;
        };
        match lookup(name) {
            Some(rules) => {
                debug!(pass, origin, name, rules = rules.len(), "Resolved rule set");
                return Ok(rules);
            }
            None => {
                warn!(pass, origin, name, "Unknown rule set, falling through");
                tried.push(name.to_string());
            }
        }
    }

    Err(RuleLoadError::Unresolved {
        pass: pass.to_string(),
        tried: tried.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walk::FnRule;
    use pretty_assertions::assert_eq;

    fn lookup(name: &str) -> Option<RuleSet<()>> {
        match name {
            "one" => Some(vec![FnRule::on("a", |_, _| Ok(())).build()]),
            "two" => Some(vec![FnRule::on("a", |_, _| Ok(())).build(), FnRule::on("b", |_, _| Ok(())).build()]),
            _ => None,
        }
    }

    #[test]
    fn test_explicit_rules_win() {
        let rules = resolve_rules("transform", Some(Vec::new()), Some("one"), Some("two"), lookup).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_requested_before_configured() {
        let rules = resolve_rules("transform", None, Some("one"), Some("two"), lookup).unwrap();
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_unknown_names_fall_through() {
        let rules = resolve_rules("transform", None, Some("missing"), Some("two"), lookup).unwrap();
        assert_eq!(rules.len(), 2);
    }

    #[test]
    fn test_nothing_resolves() {
        let err = resolve_rules("report", None, Some("missing"), None, lookup).err();
        assert_eq!(
            err,
            Some(RuleLoadError::Unresolved {
                pass: "report".to_string(),
                tried: "missing, default".to_string(),
            })
        );
    }

    #[test]
    fn test_builtin_sets() {
        assert!(transform_rule_set(DEFAULT_RULE_SET).is_some());
        assert_eq!(report_rule_set(EMPTY_RULE_SET).map(|r| r.len()), Some(0));
        assert!(report_rule_set("custom").is_none());
    }
}
