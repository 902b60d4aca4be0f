//! Composable FQL query templates.
//!
//! A [`Query`] is a template split on its holes: `n + 1` text fragments
//! around `n` interpolations. Each interpolation is either a literal
//! [`Value`] or another [`Query`]. Rendering walks the pairs in order and
//! produces the wire request:
//!
//! ```text
//! fql!("let x = ", 5, " in ", inner, "")
//!   ──▶ { "query":     { "fql": ["let x = ", { "value": { "@int": "5" } },
//!                                " in ", { "fql": [...] }] },
//!         "arguments": { "_arg0": { "@int": "5" }, ... } }
//! ```
//!
//! Use the [`fql!`](crate::fql) macro to build templates; it always produces
//! a well-formed fragment/interpolation split.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FaunaError, FaunaResult};
use crate::options::QueryOptions;
use crate::tagged;
use crate::values::Value;

/// A value placed in a template hole.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpolation {
    /// Encoded through the codec and inlined as a `value` token.
    Literal(Value),
    /// Rendered recursively and inlined as a nested `fql` token.
    SubQuery(Query),
}

impl From<Query> for Interpolation {
    fn from(query: Query) -> Self {
        Interpolation::SubQuery(query)
    }
}

impl<T: Into<Value>> From<T> for Interpolation {
    fn from(value: T) -> Self {
        Interpolation::Literal(value.into())
    }
}

/// A query template: text fragments with interpolations between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    fragments: Vec<String>,
    interpolations: Vec<Interpolation>,
}

impl Query {
    /// Build a template. Fails unless there is exactly one more fragment
    /// than there are interpolations.
    pub fn new<S: Into<String>>(
        fragments: impl IntoIterator<Item = S>,
        interpolations: impl IntoIterator<Item = Interpolation>,
    ) -> FaunaResult<Self> {
        let fragments: Vec<String> = fragments.into_iter().map(Into::into).collect();
        let interpolations: Vec<Interpolation> = interpolations.into_iter().collect();

        if fragments.is_empty() || fragments.len() != interpolations.len() + 1 {
            return Err(FaunaError::InvalidTemplate {
                fragments: fragments.len(),
                interpolations: interpolations.len(),
            });
        }

        Ok(Self {
            fragments,
            interpolations,
        })
    }

    /// A template with no holes.
    pub fn text(fql: impl Into<String>) -> Self {
        Self {
            fragments: vec![fql.into()],
            interpolations: Vec::new(),
        }
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn interpolations(&self) -> &[Interpolation] {
        &self.interpolations
    }

    /// Render into the wire request. Nested queries are rendered with the
    /// same options.
    ///
    /// Literals are named `_arg0`, `_arg1`, ... in token order across the
    /// whole tree, so equal templates always render equal requests.
    pub fn render(&self, options: &QueryOptions) -> FaunaResult<QueryRequest> {
        let mut arguments = BTreeMap::new();
        let query = self.render_parts(options, &mut arguments)?;
        Ok(QueryRequest {
            query,
            arguments,
            options: options.clone(),
        })
    }

    /// Emit this template's tokens, adding each literal to `arguments`
    /// under the next free `_argN`.
    fn render_parts(
        &self,
        options: &QueryOptions,
        arguments: &mut BTreeMap<String, serde_json::Value>,
    ) -> FaunaResult<FqlQuery> {
        if self.interpolations.is_empty() {
            return Ok(FqlQuery {
                fql: vec![QueryFragment::Text(self.fragments[0].clone())],
            });
        }

        let mut fql = Vec::with_capacity(self.fragments.len() + self.interpolations.len());

        for (fragment, interp) in self.fragments.iter().zip(&self.interpolations) {
            if !fragment.is_empty() {
                fql.push(QueryFragment::Text(fragment.clone()));
            }
            match interp {
                Interpolation::SubQuery(sub) => {
                    fql.push(QueryFragment::Query(sub.render_parts(options, arguments)?));
                }
                Interpolation::Literal(value) => {
                    let encoded = tagged::encode(value)?;
                    arguments.insert(format!("_arg{}", arguments.len()), encoded.clone());
                    fql.push(QueryFragment::Value { value: encoded });
                }
            }
        }

        if let Some(last) = self.fragments.last().filter(|f| !f.is_empty()) {
            fql.push(QueryFragment::Text(last.clone()));
        }

        Ok(FqlQuery { fql })
    }
}

/// One token of a rendered query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryFragment {
    /// Literal query text.
    Text(String),
    /// An encoded literal.
    Value { value: serde_json::Value },
    /// A nested sub-query.
    Query(FqlQuery),
}

/// A rendered token stream, serialized as `{"fql": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FqlQuery {
    pub fql: Vec<QueryFragment>,
}

/// A rendered query ready for the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub query: FqlQuery,
    pub arguments: BTreeMap<String, serde_json::Value>,
    /// Options the request was rendered with; sent as headers, not in the body.
    #[serde(skip)]
    pub options: QueryOptions,
}

/// Build a [`Query`] from alternating text fragments and interpolations.
///
/// The template starts and ends with a string literal; every interpolation
/// sits between two literals (use `""` for an empty fragment).
///
/// ```
/// use fauna_fql::fql;
///
/// let name = "Alice";
/// let by_name = fql!("Users.byName(", name, ")");
/// let first = fql!("", by_name, ".first()");
/// let request = first.render(&Default::default()).unwrap();
/// assert_eq!(request.arguments.len(), 1);
/// ```
#[macro_export]
macro_rules! fql {
    ($first:literal $(, $arg:expr, $fragment:literal)* $(,)?) => {{
        let interpolations: ::std::vec::Vec<$crate::query::Interpolation> =
            ::std::vec![$($crate::query::Interpolation::from($arg)),*];
        $crate::query::Query::new([$first $(, $fragment)*], interpolations)
            .expect("fql! always yields one more fragment than interpolations")
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn opts() -> QueryOptions {
        QueryOptions::default()
    }

    #[test]
    fn test_single_fragment() {
        let q = Query::new(["SELECT 1"], Vec::new()).unwrap();
        let request = q.render(&opts()).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "query": { "fql": ["SELECT 1"] }, "arguments": {} })
        );
    }

    #[test]
    fn test_single_empty_fragment_is_kept() {
        let request = Query::text("").render(&opts()).unwrap();
        assert_eq!(request.query.fql, vec![QueryFragment::Text(String::new())]);
    }

    #[test]
    fn test_count_mismatch_fails() {
        let err = Query::new(
            ["a", "b"],
            [Interpolation::from(1), Interpolation::from(2)],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FaunaError::InvalidTemplate {
                fragments: 2,
                interpolations: 2
            }
        ));

        assert!(Query::new(Vec::<String>::new(), Vec::new()).is_err());
    }

    #[test]
    fn test_literal_object() {
        let mut user = BTreeMap::new();
        user.insert("firstName".to_string(), Value::from("a"));

        let q = Query::new(["Users.create(", ")"], [Interpolation::from(user)]).unwrap();
        let request = q.render(&opts()).unwrap();

        assert_eq!(
            serde_json::to_value(&request.query).unwrap(),
            json!({ "fql": ["Users.create(", { "value": { "firstName": "a" } }, ")"] })
        );
        assert_eq!(request.arguments.len(), 1);
        assert_eq!(
            request.arguments.values().next(),
            Some(&json!({ "firstName": "a" }))
        );
    }

    #[test]
    fn test_sub_query_splices_and_merges() {
        let inner = fql!("let x = ", 5, "\nx");
        let outer = fql!("", inner, " + ", 1.5, "");

        let request = outer.render(&opts()).unwrap();
        assert_eq!(
            serde_json::to_value(&request.query).unwrap(),
            json!({
                "fql": [
                    { "fql": ["let x = ", { "value": { "@int": "5" } }, "\nx"] },
                    " + ",
                    { "value": { "@double": "1.5" } }
                ]
            })
        );
        assert_eq!(request.arguments.len(), 2);
    }

    #[test]
    fn test_distinct_sub_queries_do_not_collide() {
        let a = fql!("", 1, "");
        let b = fql!("", 2, "");
        let request = fql!("[", a, ", ", b, "]").render(&opts()).unwrap();
        assert_eq!(
            request.arguments,
            BTreeMap::from([
                ("_arg0".to_string(), json!({ "@int": "1" })),
                ("_arg1".to_string(), json!({ "@int": "2" })),
            ])
        );
    }

    #[test]
    fn test_equal_templates_render_equal() {
        let a = fql!("a(", 1, ")");
        let b = fql!("a(", 1, ")");
        assert_eq!(a, b);
        assert_eq!(a.render(&opts()).unwrap(), b.render(&opts()).unwrap());
    }

    #[test]
    fn test_arguments_follow_token_order() {
        let inner = fql!("", "x", "");
        let request = fql!("f(", 1, ", ", inner, ", ", 2.5, ")")
            .render(&opts())
            .unwrap();
        let names: Vec<_> = request.arguments.keys().cloned().collect();
        assert_eq!(names, vec!["_arg0", "_arg1", "_arg2"]);
        assert_eq!(request.arguments["_arg1"], json!("x"));
        assert_eq!(request.arguments["_arg2"], json!({ "@double": "2.5" }));
    }

    #[test]
    fn test_render_is_idempotent() {
        let q = fql!("Users.byId(", "42", ")");
        assert_eq!(q.render(&opts()).unwrap(), q.render(&opts()).unwrap());
    }

    #[test]
    fn test_render_keeps_options() {
        let options = QueryOptions::new().linearized(true);
        let request = fql!("", fql!("1"), "").render(&options).unwrap();
        assert_eq!(request.options, options);
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "query": { "fql": [{ "fql": ["1"] }] }, "arguments": {} })
        );
    }

    #[test]
    fn test_encoding_errors_bubble_up() {
        let q = fql!("", f64::INFINITY, "");
        assert!(matches!(q.render(&opts()), Err(FaunaError::NotFinite(_))));
    }
}
