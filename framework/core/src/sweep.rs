use serde_json::Value;

use crate::benchmark::Benchmark;
use crate::Parameters;

/// One axis of the sweep. Each alternative assigns a value to every key of the axis, so a zipped
/// group is a single axis with several keys.
#[derive(Debug)]
struct Axis<'a> {
    keys: Vec<&'a str>,
    alternatives: Vec<Vec<&'a Value>>,
}

/// The ordered parameter combinations of a benchmark.
///
/// Axes are iterated like an odometer with the last axis moving fastest. The zipped group, when
/// present, is the outermost axis, followed by the independent parameters in declaration order,
/// followed by list-valued extra parameters.
#[derive(Debug)]
pub struct Sweep<'a> {
    order: Vec<&'a str>,
    axes: Vec<Axis<'a>>,
    indices: Vec<usize>,
    remaining: usize,
}

impl<'a> Sweep<'a> {
    pub(crate) fn new(benchmark: &'a Benchmark, extra: Option<&'a Parameters>) -> Self {
        let overridden = |name: &str| extra.is_some_and(|extra| extra.contains_key(name));

        let mut order = Vec::new();
        let mut axes = Vec::new();

        let mut zipped = Axis {
            keys: Vec::new(),
            alternatives: Vec::new(),
        };
        let mut independent = Vec::new();

        for (name, values) in benchmark.raw_parameters() {
            if overridden(name.as_str()) {
                continue;
            }
            order.push(name.as_str());

            if benchmark.is_zipped(name) {
                if zipped.keys.is_empty() {
                    zipped.alternatives = values.iter().map(|value| vec![value]).collect();
                } else {
                    // Lengths are checked at load time, so this only ever pairs equal lists
                    for (alternative, value) in zipped.alternatives.iter_mut().zip(values) {
                        alternative.push(value);
                    }
                }
                zipped.keys.push(name.as_str());
            } else {
                independent.push(Axis {
                    keys: vec![name.as_str()],
                    alternatives: values.iter().map(|value| vec![value]).collect(),
                });
            }
        }

        if !zipped.keys.is_empty() {
            axes.push(zipped);
        }
        axes.extend(independent);

        for (name, value) in extra.into_iter().flatten() {
            order.push(name.as_str());
            let alternatives = match value {
                Value::Array(values) => values.iter().map(|value| vec![value]).collect(),
                scalar => vec![vec![scalar]],
            };
            axes.push(Axis {
                keys: vec![name.as_str()],
                alternatives,
            });
        }

        let remaining = axes
            .iter()
            .map(|axis| axis.alternatives.len())
            .product::<usize>();

        Self {
            order,
            indices: vec![0; axes.len()],
            axes,
            remaining,
        }
    }

    fn current(&self) -> Parameters {
        let mut assigned = Vec::with_capacity(self.order.len());
        for (axis, &index) in self.axes.iter().zip(&self.indices) {
            assigned.extend(axis.keys.iter().copied().zip(axis.alternatives[index].iter().copied()));
        }

        let mut parameters = Parameters::new();
        for name in &self.order {
            if let Some((_, value)) = assigned.iter().find(|(key, _)| key == name) {
                parameters.insert(name.to_string(), (*value).clone());
            }
        }
        parameters
    }

    fn advance(&mut self) {
        for (axis, index) in self.axes.iter().zip(self.indices.iter_mut()).rev() {
            *index += 1;
            if *index < axis.alternatives.len() {
                return;
            }
            *index = 0;
        }
    }
}

impl Iterator for Sweep<'_> {
    type Item = Parameters;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let parameters = self.current();
        self.remaining -= 1;
        self.advance();
        Some(parameters)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Sweep<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    fn benchmark(parameters: Value, zip: &[&str]) -> Benchmark {
        let parameters = params(parameters)
            .into_iter()
            .map(|(name, values)| (name, values.as_array().cloned().unwrap()))
            .collect();
        Benchmark::new(parameters, zip.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    #[test]
    fn cartesian_product_in_declaration_order() {
        let bench = benchmark(json!({"a": [1, 2], "b": ["x", "y"]}), &[]);
        let combos = bench.sweep(None).collect::<Vec<_>>();
        assert_eq!(
            combos,
            vec![
                params(json!({"a": 1, "b": "x"})),
                params(json!({"a": 1, "b": "y"})),
                params(json!({"a": 2, "b": "x"})),
                params(json!({"a": 2, "b": "y"})),
            ]
        );
    }

    #[test]
    fn zip_iterates_in_lock_step() {
        let bench = benchmark(
            json!({"image": ["a", "b"], "tb_path": ["p1", "p2"]}),
            &["image", "tb_path"],
        );
        assert_eq!(
            bench.sweep(None).collect::<Vec<_>>(),
            vec![
                params(json!({"image": "a", "tb_path": "p1"})),
                params(json!({"image": "b", "tb_path": "p2"})),
            ]
        );
    }

    #[test]
    fn zip_is_outer_to_independent_parameters() {
        let bench = benchmark(
            json!({"threads": [1, 2], "image": ["a", "b"], "tb_path": ["p1", "p2"]}),
            &["image", "tb_path"],
        );
        let combos = bench.sweep(None).collect::<Vec<_>>();
        assert_eq!(combos.len(), bench.num_jobs());
        assert_eq!(
            combos,
            vec![
                params(json!({"threads": 1, "image": "a", "tb_path": "p1"})),
                params(json!({"threads": 2, "image": "a", "tb_path": "p1"})),
                params(json!({"threads": 1, "image": "b", "tb_path": "p2"})),
                params(json!({"threads": 2, "image": "b", "tb_path": "p2"})),
            ]
        );
        let keys = combos[0].keys().map(String::as_str).collect::<Vec<_>>();
        assert_eq!(keys, vec!["threads", "image", "tb_path"]);
    }

    #[test]
    fn scalar_extra_is_constant() {
        let bench = benchmark(json!({"node_count": [1, 2]}), &[]);
        let extra = params(json!({"hosts": "A,B"}));
        assert_eq!(
            bench.sweep(Some(&extra)).collect::<Vec<_>>(),
            vec![
                params(json!({"node_count": 1, "hosts": "A,B"})),
                params(json!({"node_count": 2, "hosts": "A,B"})),
            ]
        );
    }

    #[test]
    fn list_extra_adds_a_dimension() {
        let bench = benchmark(json!({"sleep_amount": [1, 2]}), &[]);
        let extra = params(json!({"extra_time": [3, 4]}));
        assert_eq!(
            bench.sweep(Some(&extra)).collect::<Vec<_>>(),
            vec![
                params(json!({"sleep_amount": 1, "extra_time": 3})),
                params(json!({"sleep_amount": 1, "extra_time": 4})),
                params(json!({"sleep_amount": 2, "extra_time": 3})),
                params(json!({"sleep_amount": 2, "extra_time": 4})),
            ]
        );
    }

    #[test]
    fn extra_replaces_benchmark_parameter() {
        let bench = benchmark(json!({"size": [1, 2, 3], "mode": ["a"]}), &[]);
        let extra = params(json!({"size": 10}));
        assert_eq!(
            bench.sweep(Some(&extra)).collect::<Vec<_>>(),
            vec![params(json!({"mode": "a", "size": 10}))]
        );
    }

    #[test]
    fn empty_benchmark_yields_one_empty_combination() {
        let bench = Benchmark::default();
        assert_eq!(bench.sweep(None).collect::<Vec<_>>(), vec![Parameters::new()]);
    }

    #[test]
    fn empty_list_yields_nothing() {
        let bench = benchmark(json!({"a": [1, 2], "b": []}), &[]);
        assert_eq!(bench.sweep(None).len(), 0);
        assert_eq!(bench.sweep(None).count(), 0);
    }

    #[test]
    fn sweep_is_restartable_and_deterministic() {
        let bench = benchmark(json!({"a": [1, 2, 3], "b": [4, 5]}), &[]);
        let first = bench.sweep(None).collect::<Vec<_>>();
        let second = bench.sweep(None).collect::<Vec<_>>();
        assert_eq!(first, second);
        assert_eq!(bench.sweep(None).len(), 6);

        let extra = params(json!({"c": [7, 8]}));
        assert_eq!(bench.sweep(Some(&extra)).len(), 12);
        assert_eq!(bench.sweep(None).len(), 6);
    }
}
