use std::collections::BTreeSet;

use serde_json::Value;

use crate::capture::RESERVED_FIELDS;
use crate::sweep::Sweep;
use crate::validation::{type_name, Validator};
use crate::Parameters;

/// The reserved key that lists parameters to iterate in lock-step.
pub const ZIP_KEY: &str = "zip";

/// The parameters to sweep for one application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Benchmark {
    parameters: Vec<(String, Vec<Value>)>,
    zip: Vec<String>,
}

impl Benchmark {
    /// Build a benchmark from parameter lists in declaration order.
    ///
    /// Zipped lists of different lengths are rejected, as are zip entries that do not name a
    /// parameter and parameters named like a reserved field.
    pub fn new(
        parameters: Vec<(String, Vec<Value>)>,
        zip: Vec<String>,
    ) -> Result<Self, crate::ValidationError> {
        let mut v = Validator::new();
        let benchmark = Self { parameters, zip };
        benchmark.check_names(&mut v);
        benchmark.check_zip(&mut v);
        v.finish().map(|_| benchmark)
    }

    /// Parameter names in declaration order, without the `zip` key.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|(name, _)| name.as_str())
    }

    pub fn parameters(&self) -> BTreeSet<String> {
        self.keys().map(str::to_string).collect()
    }

    pub fn values(&self, name: &str) -> Option<&[Value]> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values.as_slice())
    }

    /// The parameter names iterated in lock-step.
    pub fn zipped(&self) -> &[String] {
        &self.zip
    }

    pub fn is_zipped(&self, name: &str) -> bool {
        self.zip.iter().any(|zipped| zipped == name)
    }

    /// The number of combinations a sweep without extra parameters produces.
    pub fn num_jobs(&self) -> usize {
        let zipped = self
            .parameters
            .iter()
            .find(|(name, _)| self.is_zipped(name))
            .map_or(1, |(_, values)| values.len());
        let independent = self
            .parameters
            .iter()
            .filter(|(name, _)| !self.is_zipped(name))
            .map(|(_, values)| values.len())
            .product::<usize>();
        zipped * independent
    }

    /// Expand the parameter lists into every combination to run, in a fixed order.
    ///
    /// `extra` parameters add dimensions: list values are swept like any other parameter and
    /// scalars are held constant. An extra parameter replaces a benchmark parameter of the same
    /// name.
    pub fn sweep<'a>(&'a self, extra: Option<&'a Parameters>) -> Sweep<'a> {
        Sweep::new(self, extra)
    }

    pub(crate) fn raw_parameters(&self) -> &[(String, Vec<Value>)] {
        &self.parameters
    }

    pub(crate) fn from_value(value: &Value, v: &mut Validator) -> Option<Self> {
        let map = match value {
            // `name:` with nothing under it
            Value::Null => return Some(Self::default()),
            other => v.object(other)?,
        };
        let errors_before = v.error_count();

        let mut parameters = Vec::with_capacity(map.len());
        let mut zip = Vec::new();

        for (key, value) in map {
            if key == ZIP_KEY {
                v.at(ZIP_KEY, |v| match value {
                    Value::Array(names) => {
                        for (index, name) in names.iter().enumerate() {
                            match name {
                                Value::String(name) => zip.push(name.clone()),
                                other => v.at(index, |v| {
                                    v.error(format!("expected a string, got {}", type_name(other)))
                                }),
                            }
                        }
                    }
                    other => v.error(format!(
                        "expected a list of parameter names, got {}",
                        type_name(other)
                    )),
                });
                continue;
            }

            match value {
                Value::Array(values) => parameters.push((key.clone(), values.clone())),
                other => v.at(key.as_str(), |v| {
                    v.error(format!("expected a list of values, got {}", type_name(other)))
                }),
            }
        }

        let benchmark = Self { parameters, zip };
        benchmark.check_names(v);
        benchmark.check_zip(v);

        if v.error_count() > errors_before {
            None
        } else {
            Some(benchmark)
        }
    }

    fn check_names(&self, v: &mut Validator) {
        for name in self.keys().filter(|name| RESERVED_FIELDS.contains(name)) {
            v.at(name, |v| v.error(format!("'{name}' is a reserved field name")));
        }
    }

    fn check_zip(&self, v: &mut Validator) {
        let mut zipped_length: Option<(&str, usize)> = None;
        v.at(ZIP_KEY, |v| {
            for (index, name) in self.zip.iter().enumerate() {
                let Some(values) = self.values(name) else {
                    v.at(index, |v| v.error(format!("parameter '{name}' is undefined")));
                    continue;
                };
                match zipped_length {
                    None => zipped_length = Some((name.as_str(), values.len())),
                    Some((first, length)) if length != values.len() => v.at(index, |v| {
                        v.error(format!(
                            "zipped parameter '{name}' has {} values but '{first}' has {length}",
                            values.len()
                        ))
                    }),
                    Some(_) => {}
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<Benchmark, crate::ValidationError> {
        let mut v = Validator::new();
        let benchmark = Benchmark::from_value(&value, &mut v);
        v.finish().map(|_| benchmark.unwrap())
    }

    #[test]
    fn num_jobs_is_product_of_lengths() {
        let benchmark = parse(json!({"a": [1, 2, 3], "b": ["x", "y"], "c": [true]})).unwrap();
        assert_eq!(benchmark.num_jobs(), 6);
    }

    #[test]
    fn empty_benchmark_has_one_job() {
        assert_eq!(parse(json!({})).unwrap().num_jobs(), 1);
        assert_eq!(parse(Value::Null).unwrap().num_jobs(), 1);
    }

    #[test]
    fn num_jobs_with_zip() {
        let benchmark = parse(json!({
            "image": ["a", "b", "c"],
            "tb_path": ["p1", "p2", "p3"],
            "threads": [1, 2],
            "zip": ["image", "tb_path"],
        }))
        .unwrap();
        assert_eq!(benchmark.num_jobs(), 6);
        assert_eq!(benchmark.keys().collect::<Vec<_>>(), vec!["image", "tb_path", "threads"]);
    }

    #[test]
    fn unequal_zip_lengths_are_rejected() {
        let err = parse(json!({
            "image": ["a", "b"],
            "tb_path": ["p1"],
            "zip": ["image", "tb_path"],
        }))
        .unwrap_err();
        assert!(err.issue_at(&["zip", "1"]).is_some());

        let err = Benchmark::new(
            vec![
                ("a".to_string(), vec![json!(1)]),
                ("b".to_string(), vec![json!(1), json!(2)]),
            ],
            vec!["a".to_string(), "b".to_string()],
        )
        .unwrap_err();
        assert_eq!(err.issues().len(), 1);
    }

    #[test]
    fn zip_must_name_parameters() {
        let err = parse(json!({"a": [1], "zip": ["a", "b"]})).unwrap_err();
        assert_eq!(
            err.issue_at(&["zip", "1"]).unwrap().message,
            "parameter 'b' is undefined"
        );
    }

    #[test]
    fn parameter_values_must_be_lists() {
        let err = parse(json!({"a": 1, "b": [1], "c": "x"})).unwrap_err();
        assert!(err.issue_at(&["a"]).is_some());
        assert!(err.issue_at(&["c"]).is_some());
    }

    #[test]
    fn reserved_parameter_names() {
        let err = parse(json!({"name": ["alpha"], "time": ["noon"], "size": [1]})).unwrap_err();
        assert_eq!(err.issues().len(), 2);
        assert_eq!(
            err.issue_at(&["name"]).unwrap().message,
            "'name' is a reserved field name"
        );
        assert!(err.issue_at(&["time"]).is_some());

        assert!(Benchmark::new(vec![("time".to_string(), vec![json!(1)])], Vec::new()).is_err());
    }
}
