use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};
use std::fmt;

/// Disease name to probability in percent, kept in source order.
///
/// Values are independent multi-label probabilities and are not expected to
/// sum to 100. The order is the order in which entries were produced (JSON
/// document order for the remote API, classifier output order locally) and is
/// the order bars are drawn in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Prediction {
    entries: Vec<(String, f64)>,
}

impl Prediction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, replacing the value of an existing name in place.
    pub fn insert(&mut self, name: impl Into<String>, percent: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = percent,
            None => self.entries.push((name, percent)),
        }
    }

    /// Percentage for `name`, if present.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Splits the mapping into index-aligned name and value sequences.
    pub fn normalize(&self) -> NormalizedPrediction {
        let (names, values) = self.entries.iter().cloned().unzip();
        NormalizedPrediction { names, values }
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Prediction {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut prediction = Prediction::new();
        for (name, value) in iter {
            prediction.insert(name, value);
        }
        prediction
    }
}

impl Serialize for Prediction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct PredictionVisitor;

impl<'de> Visitor<'de> for PredictionVisitor {
    type Value = Prediction;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of disease name to percentage")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut prediction = Prediction::new();
        while let Some((name, value)) = access.next_entry::<String, f64>()? {
            prediction.insert(name, value);
        }
        Ok(prediction)
    }
}

impl<'de> Deserialize<'de> for Prediction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PredictionVisitor)
    }
}

/// Parallel disease names and percentages, ready for charting.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedPrediction {
    pub names: Vec<String>,
    pub values: Vec<f64>,
}

impl NormalizedPrediction {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
