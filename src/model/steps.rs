use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use super::StepResult;

/// Insertion-ordered map of step id to [`StepResult`].
///
/// Serialized as a JSON object whose key order is the execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepMap {
    entries: Vec<(String, StepResult)>,
}

impl StepMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result keyed by its step id.
    ///
    /// An existing entry keeps its position and is replaced; the previous
    /// value is returned.
    pub fn insert(&mut self, result: StepResult) -> Option<StepResult> {
        match self.entries.iter_mut().find(|(id, _)| *id == result.step_id) {
            Some((_, existing)) => Some(std::mem::replace(existing, result)),
            None => {
                self.entries.push((result.step_id.clone(), result));
                None
            }
        }
    }

    pub fn get(&self, step_id: &str) -> Option<&StepResult> {
        self.entries
            .iter()
            .find(|(id, _)| id == step_id)
            .map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Step ids in execution order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &StepResult> {
        self.entries.iter().map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StepResult)> {
        self.entries.iter().map(|(id, r)| (id.as_str(), r))
    }
}

impl Serialize for StepMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, result) in &self.entries {
            map.serialize_entry(id, result)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StepMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StepMapVisitor;

        impl<'de> Visitor<'de> for StepMapVisitor {
            type Value = StepMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of step id to step result")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<StepMap, A::Error> {
                let mut entries: Vec<(String, StepResult)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, result)) = access.next_entry::<String, StepResult>()? {
                    if entries.iter().any(|(existing, _)| *existing == id) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate step id: {}",
                            id
                        )));
                    }
                    entries.push((id, result));
                }
                Ok(StepMap { entries })
            }
        }

        deserializer.deserialize_map(StepMapVisitor)
    }
}
