//! Run-length encoding of waveform samples.
//!
//! A run of one value is written as `[v]`, a longer run as `[v, n]`. Flat
//! readout pulses shrink from thousands of samples to a single pair.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::error::{CompileError, CompileResult};

/// One run of equal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RleRun<T> {
    /// `value` repeated `count` times, written `[value, count]`.
    Repeated(T, usize),
    /// A single occurrence, written `[value]`.
    Single((T,)),
}

impl<T> RleRun<T> {
    /// The repeated value.
    pub fn value(&self) -> &T {
        match self {
            RleRun::Repeated(v, _) | RleRun::Single((v,)) => v,
        }
    }

    /// How many times the value occurs.
    pub fn count(&self) -> usize {
        match self {
            RleRun::Repeated(_, n) => *n,
            RleRun::Single(_) => 1,
        }
    }
}

/// Encode a sequence into runs.
pub fn encode<T: PartialEq + Clone>(seq: &[T]) -> Vec<RleRun<T>> {
    let mut runs = Vec::new();
    let mut iter = seq.iter().peekable();
    while let Some(value) = iter.next() {
        let mut count = 1;
        while iter.next_if(|next| *next == value).is_some() {
            count += 1;
        }
        runs.push(if count > 1 {
            RleRun::Repeated(value.clone(), count)
        } else {
            RleRun::Single((value.clone(),))
        });
    }
    runs
}

/// Expand runs back into the sequence.
pub fn decode<T: Clone>(runs: &[RleRun<T>]) -> Vec<T> {
    let mut seq = Vec::with_capacity(runs.iter().map(RleRun::count).sum());
    for run in runs {
        seq.extend(std::iter::repeat_n(run.value().clone(), run.count()));
    }
    seq
}

fn library_items(qobj: &mut Value) -> CompileResult<Option<&mut Vec<Value>>> {
    match qobj.pointer_mut("/config/pulse_library") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(CompileError::MalformedPayload(
            "config.pulse_library is not an array".into(),
        )),
    }
}

fn samples_of<'a>(item: &'a mut Value, index: usize) -> CompileResult<Option<&'a mut Value>> {
    let Value::Object(entry) = item else {
        return Err(CompileError::MalformedPayload(format!(
            "pulse_library[{index}] is not an object"
        )));
    };
    Ok(entry.get_mut("samples"))
}

/// Run-length encode every `config.pulse_library[*].samples` in place.
pub fn compress_qobj(qobj: &mut Value) -> CompileResult<()> {
    let Some(items) = library_items(qobj)? else {
        return Ok(());
    };
    for (index, item) in items.iter_mut().enumerate() {
        let Some(samples) = samples_of(item, index)? else {
            continue;
        };
        let Value::Array(raw) = samples else {
            return Err(CompileError::MalformedPayload(format!(
                "pulse_library[{index}].samples is not an array"
            )));
        };
        let runs = encode(raw);
        trace!(index, samples = raw.len(), runs = runs.len(), "compressed waveform");
        *samples = serde_json::to_value(runs)?;
    }
    Ok(())
}

/// Reverse [`compress_qobj`].
pub fn decompress_qobj(qobj: &mut Value) -> CompileResult<()> {
    let Some(items) = library_items(qobj)? else {
        return Ok(());
    };
    for (index, item) in items.iter_mut().enumerate() {
        let Some(samples) = samples_of(item, index)? else {
            continue;
        };
        let runs: Vec<RleRun<Value>> = serde_json::from_value(samples.take()).map_err(|e| {
            CompileError::MalformedPayload(format!("pulse_library[{index}].samples: {e}"))
        })?;
        *samples = Value::Array(decode(&runs));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_example() {
        let runs = encode(&[1, 1, 1, 2, 3, 3]);
        assert_eq!(
            runs,
            vec![
                RleRun::Repeated(1, 3),
                RleRun::Single((2,)),
                RleRun::Repeated(3, 2)
            ]
        );
        assert_eq!(serde_json::to_value(&runs).unwrap(), json!([[1, 3], [2], [3, 2]]));
    }

    #[test]
    fn test_decode_example() {
        let runs: Vec<RleRun<i32>> = serde_json::from_value(json!([[1, 3], [2], [3, 2]])).unwrap();
        assert_eq!(decode(&runs), vec![1, 1, 1, 2, 3, 3]);
    }

    #[test]
    fn test_empty_sequence() {
        assert!(encode::<u8>(&[]).is_empty());
        assert!(decode::<u8>(&[]).is_empty());
    }

    #[test]
    fn test_compress_qobj_in_place() {
        let mut qobj = json!({
            "config": {
                "shots": 10,
                "pulse_library": [
                    {"name": "flat", "samples": [[0.1, 0.0], [0.1, 0.0], [0.1, 0.0], [0.2, 0.0]]},
                    {"name": "empty", "samples": []}
                ]
            }
        });
        let original = qobj.clone();

        compress_qobj(&mut qobj).unwrap();
        assert_eq!(
            qobj["config"]["pulse_library"][0]["samples"],
            json!([[[0.1, 0.0], 3], [[0.2, 0.0]]])
        );
        assert_eq!(qobj["config"]["shots"], 10);

        decompress_qobj(&mut qobj).unwrap();
        assert_eq!(qobj, original);
    }

    #[test]
    fn test_qobj_without_library_untouched() {
        let mut qobj = json!({"config": {"shots": 1}});
        compress_qobj(&mut qobj).unwrap();
        assert_eq!(qobj, json!({"config": {"shots": 1}}));
    }

    #[test]
    fn test_malformed_samples() {
        let mut qobj = json!({"config": {"pulse_library": [{"name": "w", "samples": 3}]}});
        assert!(matches!(
            compress_qobj(&mut qobj),
            Err(CompileError::MalformedPayload(_))
        ));
        let mut qobj = json!({"config": {"pulse_library": [{"name": "w", "samples": [[1, 2, 3]]}]}});
        assert!(decompress_qobj(&mut qobj).is_err());
    }
}
