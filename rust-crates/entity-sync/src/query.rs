use crate::entity::ParsedEntity;
use generated_bindings::{
    Models,
    models::lookup,
    parse_felt,
};
use serde_json::{
    Map,
    Value,
    json,
};
use std::{
    borrow::Cow,
    cmp::Ordering,
    fmt,
};

pub const DEFAULT_LIMIT: u32 = 100;

/// Comparison operators understood by the indexer's `where` filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Is,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Eq => "$eq",
            Op::Is => "$is",
            Op::Neq => "$neq",
            Op::Gt => "$gt",
            Op::Gte => "$gte",
            Op::Lt => "$lt",
            Op::Lte => "$lte",
        }
    }

    fn accepts(self, ordering: Option<Ordering>) -> bool {
        match self {
            Op::Eq | Op::Is => ordering == Some(Ordering::Equal),
            Op::Neq => ordering != Some(Ordering::Equal),
            Op::Gt => ordering == Some(Ordering::Greater),
            Op::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            Op::Lt => ordering == Some(Ordering::Less),
            Op::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

/// A filter over one model, optionally narrowed by field clauses that are
/// combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub namespace: String,
    pub model: String,
    pub clauses: Vec<Clause>,
    pub limit: u32,
    pub offset: u32,
}

impl Query {
    pub fn new(namespace: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            model: model.into(),
            clauses: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn for_model(model: Models) -> Self {
        Self::new(model.namespace(), model.name())
    }

    pub fn where_field(
        mut self,
        field: impl Into<String>,
        op: Op,
        value: impl Into<Value>,
    ) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn tag(&self) -> String {
        format!("{}-{}", self.namespace, self.model)
    }

    /// Renders the query in the indexer's nested filter shape:
    /// `{ns: {Model: {"$": {"where": {field: {"$op": value}}}}}}`.
    pub fn to_filter_json(&self) -> Value {
        let mut conditions = Map::new();
        for clause in &self.clauses {
            let entry = conditions
                .entry(clause.field.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(ops) = entry {
                ops.insert(clause.op.as_str().to_owned(), clause.value.clone());
            }
        }

        let filter = if conditions.is_empty() {
            json!({ "$": {} })
        } else {
            json!({ "$": { "where": Value::Object(conditions) } })
        };
        let mut model = Map::new();
        model.insert(self.model.clone(), filter);
        let mut root = Map::new();
        root.insert(self.namespace.clone(), Value::Object(model));
        Value::Object(root)
    }

    /// Evaluates the query locally against an entity. Legacy field names on
    /// registered models are folded before comparison.
    pub fn matches(&self, entity: &ParsedEntity) -> bool {
        let Some(Value::Object(raw)) = entity.model(&self.namespace, &self.model) else {
            return false;
        };
        let record = match lookup(&self.namespace, &self.model) {
            Some(schema) => Cow::Owned(schema.normalize(raw)),
            None => Cow::Borrowed(raw),
        };

        self.clauses.iter().all(|clause| {
            let actual = record.get(&clause.field).unwrap_or(&Value::Null);
            clause.op.accepts(compare(actual, &clause.value))
        })
    }
}

/// Felt-looking strings compare numerically, so padded and unpadded
/// addresses are equal.
fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_felt(actual), as_felt(expected)) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) {
        return a.partial_cmp(&b);
    }
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ if actual == expected => Some(Ordering::Equal),
        _ => None,
    }
}

fn as_felt(value: &Value) -> Option<generated_bindings::Felt> {
    value.as_str().and_then(|raw| parse_felt(raw).ok())
}
