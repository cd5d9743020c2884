//! Tensor datatypes and their negotiation from Rust element types.

use serde::{Deserialize, Serialize};

/// Datatype names of the KServe v2 tensor protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Datatype {
    Bool,
    Uint8,
    Uint16,
    Int8,
    Int16,
    Int32,
    Int64,
    Fp16,
    Fp32,
    Fp64,
    Bytes,
}

impl Datatype {
    pub fn as_str(self) -> &'static str {
        match self {
            Datatype::Bool => "BOOL",
            Datatype::Uint8 => "UINT8",
            Datatype::Uint16 => "UINT16",
            Datatype::Int8 => "INT8",
            Datatype::Int16 => "INT16",
            Datatype::Int32 => "INT32",
            Datatype::Int64 => "INT64",
            Datatype::Fp16 => "FP16",
            Datatype::Fp32 => "FP32",
            Datatype::Fp64 => "FP64",
            Datatype::Bytes => "BYTES",
        }
    }
}

/// Flattened tensor payload as it appears in a JSON request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TensorData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    Uint(Vec<u64>),
    Fp32(Vec<f32>),
    Fp64(Vec<f64>),
}

impl TensorData {
    pub fn len(&self) -> usize {
        match self {
            TensorData::Bool(v) => v.len(),
            TensorData::Int(v) => v.len(),
            TensorData::Uint(v) => v.len(),
            TensorData::Fp32(v) => v.len(),
            TensorData::Fp64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A Rust numeric type with a fixed protocol datatype.
pub trait TensorElement: Copy {
    const DATATYPE: Datatype;

    fn into_data(values: Vec<Self>) -> TensorData;
}

impl TensorElement for f32 {
    const DATATYPE: Datatype = Datatype::Fp32;

    fn into_data(values: Vec<Self>) -> TensorData {
        TensorData::Fp32(values)
    }
}

impl TensorElement for f64 {
    const DATATYPE: Datatype = Datatype::Fp64;

    fn into_data(values: Vec<Self>) -> TensorData {
        TensorData::Fp64(values)
    }
}

impl TensorElement for bool {
    const DATATYPE: Datatype = Datatype::Bool;

    fn into_data(values: Vec<Self>) -> TensorData {
        TensorData::Bool(values)
    }
}

macro_rules! signed_element {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(impl TensorElement for $ty {
            const DATATYPE: Datatype = Datatype::$dt;

            fn into_data(values: Vec<Self>) -> TensorData {
                TensorData::Int(values.into_iter().map(i64::from).collect())
            }
        })*
    };
}

macro_rules! unsigned_element {
    ($($ty:ty => $dt:ident),* $(,)?) => {
        $(impl TensorElement for $ty {
            const DATATYPE: Datatype = Datatype::$dt;

            fn into_data(values: Vec<Self>) -> TensorData {
                TensorData::Uint(values.into_iter().map(u64::from).collect())
            }
        })*
    };
}

signed_element!(i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64);
unsigned_element!(u8 => Uint8, u16 => Uint16);
