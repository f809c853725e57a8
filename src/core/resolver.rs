//! ST-003: Indirection resolution — refs, holes and aliases.
//!
//! Refs resolve at run time against a per-run binding environment. Holes and
//! aliases resolve before a run, moving values into `params` in place.

use super::types::*;
use indexmap::IndexMap;

/// Identifier bindings visible to the statement being executed.
/// Scoped to one run; a fresh environment starts empty.
#[derive(Debug, Default)]
pub struct Bindings {
    values: IndexMap<String, Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, name: &str, binding: Binding) {
        self.values.insert(name.to_string(), binding);
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.values.get(name)
    }
}

/// Why a ref could not produce a value.
#[derive(Debug, Clone, PartialEq)]
pub enum RefError {
    /// Never declared earlier in this run.
    Undeclared { param: String, ident: String },
    /// Declared, but the declaring statement failed.
    Failed {
        param: String,
        ident: String,
        reason: String,
    },
}

/// Build the effective parameter bag: params ∪ resolved refs.
/// Ref values overwrite same-named params.
pub fn effective_params(expr: &Expression, env: &Bindings) -> Result<Params, RefError> {
    let mut params = expr.params.clone();
    for (param, ident) in &expr.refs {
        match env.get(ident) {
            Some(Binding::Value(v)) => {
                params.insert(param.clone(), v.clone());
            }
            Some(Binding::Failed(reason)) => {
                return Err(RefError::Failed {
                    param: param.clone(),
                    ident: ident.clone(),
                    reason: reason.clone(),
                });
            }
            None => {
                return Err(RefError::Undeclared {
                    param: param.clone(),
                    ident: ident.clone(),
                });
            }
        }
    }
    Ok(params)
}

/// Move every hole that `fills` satisfies into params.
/// Returns the hole names left open, in insertion order.
pub fn fill_holes(expr: &mut Expression, fills: &Params) -> Vec<String> {
    fill_from(&mut expr.params, &mut expr.holes, |hole| fills.get(hole).cloned())
}

/// Move every hole into params, asking `ask` once per hole.
pub fn ask_holes<F>(expr: &mut Expression, ask: &mut F)
where
    F: FnMut(&str) -> Value,
{
    let holes = std::mem::take(&mut expr.holes);
    for (param, hole) in holes {
        let value = ask(&hole);
        expr.params.insert(param, value);
    }
}

/// Move every alias that `resolved` knows into params.
/// Returns the alias names left pending.
pub fn fill_aliases(expr: &mut Expression, resolved: &Params) -> Vec<String> {
    fill_from(&mut expr.params, &mut expr.aliases, |alias| {
        resolved.get(alias).cloned()
    })
}

fn fill_from<F>(params: &mut Params, pending: &mut Indirections, lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<Value>,
{
    let mut open = Indirections::new();
    for (param, name) in std::mem::take(pending) {
        match lookup(&name) {
            Some(value) => {
                params.insert(param, value);
            }
            None => {
                open.insert(param, name);
            }
        }
    }
    let missing = open.values().cloned().collect();
    *pending = open;
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fills() -> Params {
        let mut f = Params::new();
        f.insert("presidentName".into(), json!("trump"));
        f.insert("presidentRank".into(), json!(45));
        f
    }

    #[test]
    fn test_st003_effective_params_merges_refs() {
        let mut env = Bindings::new();
        env.bind("myvpc", Binding::Value(json!("vpc-1")));
        let expr = Expression::new("create", "subnet")
            .with_param("cidr", "10.0.0.0/24")
            .with_ref("vpc", "myvpc");
        let p = effective_params(&expr, &env).unwrap();
        assert_eq!(p["cidr"], json!("10.0.0.0/24"));
        assert_eq!(p["vpc"], json!("vpc-1"));
        // template is untouched
        assert!(!expr.params.contains_key("vpc"));
    }

    #[test]
    fn test_st003_ref_overwrites_param() {
        let mut env = Bindings::new();
        env.bind("a", Binding::Value(json!("from-ref")));
        let mut expr = Expression::new("create", "x").with_ref("k", "a");
        expr.params.insert("k".into(), json!("literal"));
        let p = effective_params(&expr, &env).unwrap();
        assert_eq!(p["k"], json!("from-ref"));
    }

    #[test]
    fn test_st003_undeclared_ref() {
        let env = Bindings::new();
        let expr = Expression::new("create", "subnet").with_ref("vpc", "ghost");
        assert_eq!(
            effective_params(&expr, &env),
            Err(RefError::Undeclared {
                param: "vpc".into(),
                ident: "ghost".into()
            })
        );
    }

    #[test]
    fn test_st003_failed_ref() {
        let mut env = Bindings::new();
        env.bind("v", Binding::Failed("quota exceeded".into()));
        let expr = Expression::new("create", "subnet").with_ref("vpc", "v");
        match effective_params(&expr, &env) {
            Err(RefError::Failed { reason, .. }) => assert_eq!(reason, "quota exceeded"),
            other => panic!("expected failed ref, got {:?}", other),
        }
    }

    #[test]
    fn test_st003_fill_holes_all() {
        let mut expr = Expression::new("", "")
            .with_hole("name", "presidentName")
            .with_hole("rank", "presidentRank");
        let open = fill_holes(&mut expr, &fills());
        assert!(open.is_empty());
        assert!(expr.holes.is_empty());
        assert_eq!(expr.params["name"], json!("trump"));
        assert_eq!(expr.params["rank"], json!(45));
    }

    #[test]
    fn test_st003_fill_holes_partial_keeps_pending() {
        let mut expr = Expression::new("", "")
            .with_hole("name", "presidentName")
            .with_hole("wife", "presidentWife");
        let open = fill_holes(&mut expr, &fills());
        assert_eq!(open, vec!["presidentWife"]);
        assert_eq!(expr.holes.len(), 1);
        assert_eq!(expr.holes["wife"], "presidentWife");
        assert!(!expr.params.contains_key("wife"));
    }

    #[test]
    fn test_st003_ask_holes_in_order() {
        let mut expr = Expression::new("", "")
            .with_hole("age", "age_of_president")
            .with_hole("name", "name_of_president");
        let mut asked = Vec::new();
        ask_holes(&mut expr, &mut |q: &str| {
            asked.push(q.to_string());
            json!(q.len())
        });
        assert_eq!(asked, vec!["age_of_president", "name_of_president"]);
        assert!(expr.holes.is_empty());
        assert_eq!(expr.params["age"], json!(16));
    }

    #[test]
    fn test_st003_fill_aliases() {
        let mut expr = Expression::new("create", "instance")
            .with_alias("image", "ubuntu")
            .with_alias("subnet", "prod-subnet");
        let mut resolved = Params::new();
        resolved.insert("ubuntu".into(), json!("ami-123"));
        let open = fill_aliases(&mut expr, &resolved);
        assert_eq!(open, vec!["prod-subnet"]);
        assert_eq!(expr.params["image"], json!("ami-123"));
        assert_eq!(expr.aliases.len(), 1);
    }
}
