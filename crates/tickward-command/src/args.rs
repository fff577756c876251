//! Parsed command arguments.

/// One parsed argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Int(i64),
    Float(f64),
}

/// Arguments in parameter order. Optional parameters that were not given
/// are absent, so `len()` may be shorter than the parameter list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<ArgValue>,
}

impl Args {
    pub(crate) fn push(&mut self, value: ArgValue) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ArgValue> {
        self.values.get(index)
    }

    /// String parameter at `index` (`s` and `r` kinds).
    pub fn string(&self, index: usize) -> Option<&str> {
        match self.values.get(index)? {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer parameter at `index`.
    pub fn int(&self, index: usize) -> Option<i64> {
        match self.values.get(index)? {
            ArgValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float parameter at `index`. Integers widen.
    pub fn float(&self, index: usize) -> Option<f64> {
        match self.values.get(index)? {
            ArgValue::Float(v) => Some(*v),
            ArgValue::Int(v) => Some(*v as f64),
            ArgValue::Str(_) => None,
        }
    }
}
