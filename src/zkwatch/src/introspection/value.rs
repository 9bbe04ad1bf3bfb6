use std::collections::BTreeMap;

/// A value read from an introspection session.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Long(i64),
    Int(i32),
    Double(f64),
    Bool(bool),
    Text(String),
    Composite(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// Widening integer view; `Int` and `Long` both qualify.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Long(v) => Some(*v),
            AttributeValue::Int(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&BTreeMap<String, AttributeValue>> {
        match self {
            AttributeValue::Composite(v) => Some(v),
            _ => None,
        }
    }
}

/// Builds the `{init, used, committed, max}` composite used for memory usage values.
pub fn memory_usage(init: i64, used: i64, committed: i64, max: i64) -> AttributeValue {
    let fields = [
        ("init", init),
        ("used", used),
        ("committed", committed),
        ("max", max),
    ];
    AttributeValue::Composite(
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), AttributeValue::Long(v)))
            .collect(),
    )
}
