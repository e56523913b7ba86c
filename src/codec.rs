//! Value Codec
//!
//! Turns values into the text stored in the `value` column and back.
//!
//! Scalars (booleans, integers, floats, single characters) are written as
//! their plain literal text, so `42` is stored as `42` and `'x'` as `x`.
//! Floats keep their fractional marker (`1.0`, `NaN`, `inf`) so they are
//! never read back as integers.
//! Everything else goes through `serde_json`. Newtype wrappers and `Some`
//! are transparent, so `Some(3u8)` is stored as `3` and `None` as `null`.
//!
//! Decoding is driven by the requested type: when the target asks for a
//! scalar the text is parsed literally, otherwise it is handed to
//! `serde_json`. Self-describing targets such as `serde_json::Value` read
//! JSON text as JSON, a lone character as a char and `NaN`/`inf` as floats.
//! A mismatch is always an error, never a default value.

use std::fmt::Display;
use std::str::FromStr;

use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::ser::{self, Impossible, Serialize, Serializer};
use thiserror::Error;

/// Errors produced by the codec.
pub type CodecError = serde_json::Error;

// == Encode ==
/// Encodes a value into its stored text form.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    match value.serialize(ScalarProbe) {
        Ok(text) => Ok(text),
        Err(Probe::Structured) => serde_json::to_string(value),
        Err(Probe::Failed(msg)) => Err(ser::Error::custom(msg)),
    }
}

// == Decode ==
/// Decodes stored text into `T`.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    T::deserialize(TextDeserializer { text })
}

#[derive(Debug, Error)]
enum Probe {
    #[error("value is not a scalar")]
    Structured,
    #[error("{0}")]
    Failed(String),
}

impl ser::Error for Probe {
    fn custom<T: Display>(msg: T) -> Self {
        Probe::Failed(msg.to_string())
    }
}

/// Serializer that only succeeds for scalar kinds.
struct ScalarProbe;

macro_rules! literal {
    ($($method:ident: $ty:ty),* $(,)?) => {$(
        fn $method(self, v: $ty) -> Result<String, Probe> {
            Ok(v.to_string())
        }
    )*};
}

// Debug keeps `1.0` distinct from `1`, and `FromStr` accepts its output.
macro_rules! float_literal {
    ($($method:ident: $ty:ty),* $(,)?) => {$(
        fn $method(self, v: $ty) -> Result<String, Probe> {
            Ok(format!("{:?}", v))
        }
    )*};
}

impl Serializer for ScalarProbe {
    type Ok = String;
    type Error = Probe;
    type SerializeSeq = Impossible<String, Probe>;
    type SerializeTuple = Impossible<String, Probe>;
    type SerializeTupleStruct = Impossible<String, Probe>;
    type SerializeTupleVariant = Impossible<String, Probe>;
    type SerializeMap = Impossible<String, Probe>;
    type SerializeStruct = Impossible<String, Probe>;
    type SerializeStructVariant = Impossible<String, Probe>;

    literal! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_char: char,
    }

    float_literal! {
        serialize_f32: f32,
        serialize_f64: f64,
    }

    fn serialize_str(self, _v: &str) -> Result<String, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_none(self) -> Result<String, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<String, Probe> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<String, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<String, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, Probe> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Probe> {
        Err(Probe::Structured)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Probe> {
        Err(Probe::Structured)
    }
}

/// Deserializer over stored text that parses scalar requests literally.
struct TextDeserializer<'de> {
    text: &'de str,
}

impl<'de> TextDeserializer<'de> {
    fn parse<T>(&self, kind: &str) -> Result<T, CodecError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.text.parse::<T>().map_err(|e| {
            de::Error::custom(format!("invalid {} literal {:?}: {}", kind, self.text, e))
        })
    }

    /// Scalar literals that are not valid JSON: a lone char or a non-finite float.
    fn non_json_literal<V: Visitor<'de>>(
        &self,
        visitor: V,
    ) -> Option<Result<V::Value, CodecError>> {
        let mut chars = self.text.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(visitor.visit_char(c));
        }
        match self.text.parse::<f64>() {
            Ok(v) if !v.is_finite() => Some(visitor.visit_f64(v)),
            _ => None,
        }
    }
}

macro_rules! parse_scalar {
    ($($method:ident => $visit:ident: $ty:ty),* $(,)?) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
            visitor.$visit(self.parse::<$ty>(stringify!($ty))?)
        }
    )*};
}

macro_rules! forward_to_json {
    ($($method:ident($($arg:ident: $ty:ty),*)),* $(,)?) => {$(
        fn $method<V: Visitor<'de>>(
            self,
            $($arg: $ty,)*
            visitor: V,
        ) -> Result<V::Value, CodecError> {
            let mut json = serde_json::Deserializer::from_str(self.text);
            let value = Deserializer::$method(&mut json, $($arg,)* visitor)?;
            json.end()?;
            Ok(value)
        }
    )*};
}

impl<'de> Deserializer<'de> for TextDeserializer<'de> {
    type Error = CodecError;

    parse_scalar! {
        deserialize_bool => visit_bool: bool,
        deserialize_i8 => visit_i8: i8,
        deserialize_i16 => visit_i16: i16,
        deserialize_i32 => visit_i32: i32,
        deserialize_i64 => visit_i64: i64,
        deserialize_i128 => visit_i128: i128,
        deserialize_u8 => visit_u8: u8,
        deserialize_u16 => visit_u16: u16,
        deserialize_u32 => visit_u32: u32,
        deserialize_u64 => visit_u64: u64,
        deserialize_u128 => visit_u128: u128,
        deserialize_f32 => visit_f32: f32,
        deserialize_f64 => visit_f64: f64,
        deserialize_char => visit_char: char,
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        if self.text == "null" {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        if let Err(err) = serde_json::from_str::<de::IgnoredAny>(self.text) {
            return self.non_json_literal(visitor).unwrap_or(Err(err));
        }
        let mut json = serde_json::Deserializer::from_str(self.text);
        let value = Deserializer::deserialize_any(&mut json, visitor)?;
        json.end()?;
        Ok(value)
    }

    forward_to_json! {
        deserialize_str(),
        deserialize_string(),
        deserialize_bytes(),
        deserialize_byte_buf(),
        deserialize_unit(),
        deserialize_unit_struct(name: &'static str),
        deserialize_seq(),
        deserialize_tuple(len: usize),
        deserialize_tuple_struct(name: &'static str, len: usize),
        deserialize_map(),
        deserialize_struct(name: &'static str, fields: &'static [&'static str]),
        deserialize_enum(name: &'static str, variants: &'static [&'static str]),
        deserialize_identifier(),
        deserialize_ignored_any(),
    }
}
