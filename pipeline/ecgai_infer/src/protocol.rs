//! JSON bodies of the KServe v2 inference protocol.

use serde::{Deserialize, Serialize};

use crate::dtype::{Datatype, TensorData, TensorElement};
use crate::error::InferError;

/// One named input tensor of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub datatype: Datatype,
    pub data: TensorData,
}

impl InputTensor {
    /// Build a tensor whose datatype follows from `T`. `values` must hold
    /// exactly `shape.iter().product()` elements in row-major order.
    pub fn new<T: TensorElement>(
        name: impl Into<String>,
        shape: Vec<usize>,
        values: Vec<T>,
    ) -> Result<Self, InferError> {
        let name = name.into();
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(InferError::InvalidRequest(format!(
                "input `{name}`: shape {shape:?} needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self {
            name,
            shape,
            datatype: T::DATATYPE,
            data: T::into_data(values),
        })
    }
}

/// Request for one output by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestedOutput {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferRequest {
    pub inputs: Vec<InputTensor>,
    pub outputs: Vec<RequestedOutput>,
}

/// One output tensor of a response. Values are widened to `f64`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OutputTensor {
    pub name: String,
    #[serde(default)]
    pub shape: Vec<usize>,
    pub datatype: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InferResponse {
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub model_version: Option<String>,
    pub outputs: Vec<OutputTensor>,
}

impl InferResponse {
    pub fn output(&self, name: &str) -> Option<&OutputTensor> {
        self.outputs.iter().find(|output| output.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TensorMetadata {
    pub name: String,
    pub datatype: String,
    /// `-1` marks a variable dimension.
    #[serde(default)]
    pub shape: Vec<i64>,
}

/// Served model description from `GET /v2/models/{name}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModelMetadata {
    pub name: String,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub inputs: Vec<TensorMetadata>,
    #[serde(default)]
    pub outputs: Vec<TensorMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_body_matches_wire_format() {
        let request = InferRequest {
            inputs: vec![InputTensor::new("input_1", vec![1, 2, 1], vec![0.5f32, -1.0]).unwrap()],
            outputs: vec![RequestedOutput {
                name: "dense_1/Sigmoid".into(),
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "inputs": [{
                    "name": "input_1",
                    "shape": [1, 2, 1],
                    "datatype": "FP32",
                    "data": [0.5, -1.0]
                }],
                "outputs": [{"name": "dense_1/Sigmoid"}]
            })
        );
    }

    #[test]
    fn shape_must_cover_values() {
        let err = InputTensor::new("x", vec![1, 3], vec![1i32, 2]).unwrap_err();
        assert!(matches!(err, InferError::InvalidRequest(_)));
    }

    #[test]
    fn response_tolerates_missing_version() {
        let body = r#"{"model_name":"m",
            "outputs":[{"name":"y","shape":[1,2],"datatype":"FP32","data":[0.1,0.9]}]}"#;
        let response: InferResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.model_version, None);
        assert_eq!(response.output("y").unwrap().data, vec![0.1, 0.9]);
        assert!(response.output("z").is_none());
    }
}
