//! Feature-extraction response shapes
//!
//! A feature-extraction endpoint answers with one of:
//!
//! | Shape                   | When                         | Reduction          |
//! |-------------------------|------------------------------|--------------------|
//! | `[f; dim]`              | single input, pooled model   | as is              |
//! | `[[f; dim]; tokens]`    | single input, token outputs  | mean over tokens   |
//! | `[[f; dim]; n]`         | batch, pooled model          | as is              |
//! | `[[[f; dim]; tokens]; n]` | batch, token outputs       | mean over tokens   |
//!
//! A 2-D answer is read as a token matrix for a single input and as a batch of
//! vectors otherwise. Every reduced vector is L2-normalized.

use serde::Deserialize;

use crate::error::ProviderError;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum FeatureOutput {
    Flat(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
    Tensor(Vec<Vec<Vec<f64>>>),
}

fn shape_error(msg: impl Into<String>) -> ProviderError {
    ProviderError::Shape(msg.into())
}

/// Arithmetic mean over the token axis of a `tokens × dim` matrix.
pub(crate) fn mean_pool(matrix: &[Vec<f64>]) -> Result<Vec<f64>, ProviderError> {
    let Some(first) = matrix.first() else {
        return Err(shape_error("empty token matrix"));
    };
    let dim = first.len();
    if matrix.iter().any(|row| row.len() != dim) {
        return Err(shape_error("ragged token matrix"));
    }

    let mut out = vec![0.0; dim];
    for row in matrix {
        for (acc, x) in out.iter_mut().zip(row) {
            *acc += x;
        }
    }
    let n = matrix.len() as f64;
    for x in out.iter_mut() {
        *x /= n;
    }
    Ok(out)
}

/// Reduce a provider answer to exactly `inputs` normalized vectors.
pub(crate) fn reduce(output: FeatureOutput, inputs: usize) -> Result<Vec<Vec<f64>>, ProviderError> {
    let mut vectors = match output {
        FeatureOutput::Flat(v) if inputs == 1 => vec![v],
        FeatureOutput::Flat(_) => {
            return Err(shape_error(format!(
                "flat vector returned for {inputs} inputs"
            )))
        }
        FeatureOutput::Matrix(m) if inputs == 1 => vec![mean_pool(&m)?],
        FeatureOutput::Matrix(m) => m,
        FeatureOutput::Tensor(t) => t
            .iter()
            .map(|m| mean_pool(m))
            .collect::<Result<Vec<_>, _>>()?,
    };

    if vectors.len() != inputs {
        return Err(shape_error(format!(
            "{} vectors returned for {} inputs",
            vectors.len(),
            inputs
        )));
    }

    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    if dim == 0 {
        return Err(shape_error("empty embedding vector"));
    }
    if vectors.iter().any(|v| v.len() != dim) {
        return Err(shape_error("embedding vectors differ in length"));
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(shape_error("non-finite embedding value"));
    }

    for v in vectors.iter_mut() {
        crate::normalize(v);
    }
    Ok(vectors)
}

/// Parse and reduce a raw response body.
pub(crate) fn reduce_body(body: &str, inputs: usize) -> Result<Vec<Vec<f64>>, ProviderError> {
    let output: FeatureOutput = serde_json::from_str(body)
        .map_err(|e| shape_error(format!("unrecognized response: {e}")))?;
    reduce(output, inputs)
}
