//! ABI-driven binary encoder and decoder.
//!
//! Values use the node's JSON conventions: integers up to 64 bits are JSON numbers
//! (numeric strings are accepted on encode), 128-bit integers are decimal strings,
//! byte arrays and checksums are hex, variants are `["type", value]`, and names,
//! symbols, assets, keys and timestamps use their text forms.

use std::fmt::Display;
use std::str::FromStr;

use serde_json::{Map, Number, Value, json};

use super::descriptor::{Abi, BuiltinType, MAX_TYPE_DEPTH, TypeKind};
use super::definition::AbiStruct;
use super::serializer::{ByteReader, ByteWriter};
use crate::error::SerializationError;
use crate::types::{
    Asset, BlockTimestamp, ExtendedAsset, Name, PublicKey, Signature, Symbol, SymbolCode,
    TimePoint, TimePointSec,
};

/// Encode `value` as `type_name` using the types declared in `abi`.
pub fn encode(value: &Value, type_name: &str, abi: &Abi) -> Result<Vec<u8>, SerializationError> {
    let mut w = ByteWriter::new();
    encode_value(abi, type_name, value, &mut w, 0)?;
    Ok(w.into_bytes())
}

/// Decode `bytes` as `type_name`. Every byte must be consumed.
pub fn decode(bytes: &[u8], type_name: &str, abi: &Abi) -> Result<Value, SerializationError> {
    let mut r = ByteReader::new(bytes);
    let value = decode_value(abi, type_name, &mut r, 0)?;
    r.finish()?;
    Ok(value)
}

impl Abi {
    /// Encode a value. See [`encode`].
    pub fn encode(&self, type_name: &str, value: &Value) -> Result<Vec<u8>, SerializationError> {
        encode(value, type_name, self)
    }

    /// Encode a field map as the struct `type_name`.
    pub fn encode_fields(
        &self,
        type_name: &str,
        fields: &Map<String, Value>,
    ) -> Result<Vec<u8>, SerializationError> {
        let mut w = ByteWriter::new();
        match self.resolve(type_name)?.kind {
            TypeKind::Struct(structure) => encode_struct(self, structure, fields, &mut w, 0)?,
            _ => {
                return Err(SerializationError::invalid(type_name, "not a struct type"));
            }
        }
        Ok(w.into_bytes())
    }

    /// Decode bytes. See [`decode`].
    pub fn decode(&self, type_name: &str, bytes: &[u8]) -> Result<Value, SerializationError> {
        decode(bytes, type_name, self)
    }
}

// ============================================================================
// Encoding
// ============================================================================

fn encode_value(
    abi: &Abi,
    type_name: &str,
    value: &Value,
    w: &mut ByteWriter,
    depth: usize,
) -> Result<(), SerializationError> {
    if depth > MAX_TYPE_DEPTH {
        return Err(SerializationError::RecursionLimit(type_name.to_string()));
    }

    match abi.resolve(type_name)?.kind {
        TypeKind::Builtin(builtin) => encode_builtin(builtin, type_name, value, w),
        TypeKind::Array(inner) => {
            let items = expect_array(type_name, value)?;
            w.write_len(items.len())?;
            for item in items {
                encode_value(abi, inner, item, w, depth + 1)?;
            }
            Ok(())
        }
        TypeKind::FixedArray(inner, len) => {
            let items = expect_array(type_name, value)?;
            if items.len() != len {
                return Err(SerializationError::invalid(
                    type_name,
                    format!("expected {} elements, got {}", len, items.len()),
                ));
            }
            for item in items {
                encode_value(abi, inner, item, w, depth + 1)?;
            }
            Ok(())
        }
        TypeKind::Optional(inner) => {
            if value.is_null() {
                w.write_u8(0);
                Ok(())
            } else {
                w.write_u8(1);
                encode_value(abi, inner, value, w, depth + 1)
            }
        }
        TypeKind::Extension(inner) | TypeKind::Alias(inner) => {
            encode_value(abi, inner, value, w, depth + 1)
        }
        TypeKind::Struct(structure) => {
            let fields = value
                .as_object()
                .ok_or_else(|| SerializationError::invalid(type_name, "expected an object"))?;
            encode_struct(abi, structure, fields, w, depth)
        }
        TypeKind::Variant(alternatives) => {
            let (alternative, inner) = variant_parts(type_name, value)?;
            let index = alternatives
                .iter()
                .position(|t| t == alternative)
                .ok_or_else(|| SerializationError::InvalidVariant {
                    variant: type_name.to_string(),
                    alternative: alternative.to_string(),
                })?;
            w.write_len(index)?;
            encode_value(abi, &alternatives[index], inner, w, depth + 1)
        }
    }
}

fn encode_struct(
    abi: &Abi,
    structure: &AbiStruct,
    values: &Map<String, Value>,
    w: &mut ByteWriter,
    depth: usize,
) -> Result<(), SerializationError> {
    let fields = abi.struct_fields(structure)?;

    if let Some(unknown) = values
        .keys()
        .find(|key| !fields.iter().any(|f| &f.name == *key))
    {
        return Err(SerializationError::UnknownField {
            structure: structure.name.clone(),
            field: unknown.clone(),
        });
    }

    let mut extensions_omitted = false;
    for field in fields {
        let is_extension = field.type_name.ends_with('$');
        let value = values.get(&field.name);

        if extensions_omitted {
            // only further omitted extensions may follow an omitted extension
            if value.is_some() || !is_extension {
                return Err(SerializationError::invalid(
                    &structure.name,
                    format!("field '{}' follows an omitted binary extension", field.name),
                ));
            }
            continue;
        }

        match value {
            Some(v) => encode_value(abi, &field.type_name, v, w, depth + 1)?,
            None if is_extension => extensions_omitted = true,
            None if field.type_name.ends_with('?') => w.write_u8(0),
            None => {
                return Err(SerializationError::MissingField {
                    structure: structure.name.clone(),
                    field: field.name.clone(),
                });
            }
        }
    }
    Ok(())
}

fn variant_parts<'v>(
    type_name: &str,
    value: &'v Value,
) -> Result<(&'v str, &'v Value), SerializationError> {
    match value.as_array().map(Vec::as_slice) {
        Some([Value::String(alternative), inner]) => Ok((alternative.as_str(), inner)),
        _ => Err(SerializationError::invalid(
            type_name,
            "expected a [\"type\", value] pair",
        )),
    }
}

fn expect_array<'v>(type_name: &str, value: &'v Value) -> Result<&'v Vec<Value>, SerializationError> {
    value
        .as_array()
        .ok_or_else(|| SerializationError::invalid(type_name, "expected an array"))
}

fn expect_str<'v>(type_name: &str, value: &'v Value) -> Result<&'v str, SerializationError> {
    value
        .as_str()
        .ok_or_else(|| SerializationError::invalid(type_name, "expected a string"))
}

fn parse_text<T>(type_name: &str, value: &Value) -> Result<T, SerializationError>
where
    T: FromStr,
    T::Err: Display,
{
    expect_str(type_name, value)?
        .parse()
        .map_err(|e: T::Err| SerializationError::invalid(type_name, e.to_string()))
}

fn parse_number<T>(type_name: &str, value: &Value) -> Result<T, SerializationError>
where
    T: FromStr + TryFrom<i64> + TryFrom<u64>,
{
    let out_of_range = || SerializationError::invalid(type_name, format!("{} is out of range", value));
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                T::try_from(v).map_err(|_| out_of_range())
            } else if let Some(v) = n.as_i64() {
                T::try_from(v).map_err(|_| out_of_range())
            } else {
                Err(SerializationError::invalid(type_name, "expected an integer"))
            }
        }
        Value::String(s) => s.trim().parse().map_err(|_| out_of_range()),
        _ => Err(SerializationError::invalid(type_name, "expected an integer")),
    }
}

fn parse_float(type_name: &str, value: &Value) -> Result<f64, SerializationError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| SerializationError::invalid(type_name, "expected a number")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| SerializationError::invalid(type_name, "expected a number")),
        _ => Err(SerializationError::invalid(type_name, "expected a number")),
    }
}

fn parse_hex(type_name: &str, value: &Value, len: Option<usize>) -> Result<Vec<u8>, SerializationError> {
    let bytes = hex::decode(expect_str(type_name, value)?)
        .map_err(|e| SerializationError::invalid(type_name, e.to_string()))?;
    match len {
        Some(len) if bytes.len() != len => Err(SerializationError::invalid(
            type_name,
            format!("expected {} bytes, got {}", len, bytes.len()),
        )),
        _ => Ok(bytes),
    }
}

fn write_asset(w: &mut ByteWriter, asset: &Asset) {
    w.write_u64(asset.amount() as u64);
    w.write_u64(asset.symbol().as_u64());
}

fn encode_builtin(
    builtin: BuiltinType,
    type_name: &str,
    value: &Value,
    w: &mut ByteWriter,
) -> Result<(), SerializationError> {
    use BuiltinType as B;

    match builtin {
        B::Bool => {
            let v = value
                .as_bool()
                .ok_or_else(|| SerializationError::invalid(type_name, "expected a boolean"))?;
            w.write_u8(v as u8);
        }
        B::Int8 => w.write_u8(parse_number::<i8>(type_name, value)? as u8),
        B::Uint8 => w.write_u8(parse_number::<u8>(type_name, value)?),
        B::Int16 => w.write_u16(parse_number::<i16>(type_name, value)? as u16),
        B::Uint16 => w.write_u16(parse_number::<u16>(type_name, value)?),
        B::Int32 => w.write_u32(parse_number::<i32>(type_name, value)? as u32),
        B::Uint32 => w.write_u32(parse_number::<u32>(type_name, value)?),
        B::Int64 => w.write_u64(parse_number::<i64>(type_name, value)? as u64),
        B::Uint64 => w.write_u64(parse_number::<u64>(type_name, value)?),
        B::Int128 => w.write_u128(parse_number::<i128>(type_name, value)? as u128),
        B::Uint128 => w.write_u128(parse_number::<u128>(type_name, value)?),
        B::VarInt32 => w.write_varint32(parse_number::<i32>(type_name, value)?),
        B::VarUint32 => w.write_varuint32(parse_number::<u32>(type_name, value)?),
        B::Float32 => w.write_raw(&(parse_float(type_name, value)? as f32).to_le_bytes()),
        B::Float64 => w.write_raw(&parse_float(type_name, value)?.to_le_bytes()),
        B::Float128 => w.write_raw(&parse_hex(type_name, value, Some(16))?),
        B::TimePoint => {
            let tp: TimePoint = parse_text(type_name, value)?;
            w.write_u64(tp.as_micros() as u64);
        }
        B::TimePointSec => {
            let tp: TimePointSec = parse_text(type_name, value)?;
            w.write_u32(tp.as_secs());
        }
        B::BlockTimestamp => {
            let ts: BlockTimestamp = parse_text(type_name, value)?;
            w.write_u32(ts.slot());
        }
        B::Name => w.write_u64(parse_text::<Name>(type_name, value)?.as_u64()),
        B::Bytes => w.write_bytes(&parse_hex(type_name, value, None)?)?,
        B::String => w.write_bytes(expect_str(type_name, value)?.as_bytes())?,
        B::Checksum160 => w.write_raw(&parse_hex(type_name, value, Some(20))?),
        B::Checksum256 => w.write_raw(&parse_hex(type_name, value, Some(32))?),
        B::Checksum512 => w.write_raw(&parse_hex(type_name, value, Some(64))?),
        B::PublicKey => w.write_raw(&parse_text::<PublicKey>(type_name, value)?.to_packed()),
        B::Signature => w.write_raw(&parse_text::<Signature>(type_name, value)?.to_packed()),
        B::Symbol => w.write_u64(parse_text::<Symbol>(type_name, value)?.as_u64()),
        B::SymbolCode => w.write_u64(parse_text::<SymbolCode>(type_name, value)?.as_u64()),
        B::Asset => write_asset(w, &parse_text::<Asset>(type_name, value)?),
        B::ExtendedAsset => {
            let ext: ExtendedAsset = serde_json::from_value(value.clone())
                .map_err(|e| SerializationError::invalid(type_name, e.to_string()))?;
            write_asset(w, &ext.quantity);
            w.write_u64(ext.contract.as_u64());
        }
    }
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

fn decode_value(
    abi: &Abi,
    type_name: &str,
    r: &mut ByteReader<'_>,
    depth: usize,
) -> Result<Value, SerializationError> {
    if depth > MAX_TYPE_DEPTH {
        return Err(SerializationError::RecursionLimit(type_name.to_string()));
    }

    match abi.resolve(type_name)?.kind {
        TypeKind::Builtin(builtin) => decode_builtin(builtin, type_name, r),
        TypeKind::Array(inner) => {
            let len = r.read_len(type_name, min_encoded_size(abi, inner, depth + 1))?;
            (0..len)
                .map(|_| decode_value(abi, inner, r, depth + 1))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        TypeKind::FixedArray(inner, len) => (0..len)
            .map(|_| decode_value(abi, inner, r, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        TypeKind::Optional(inner) => match r.read_u8(type_name)? {
            0 => Ok(Value::Null),
            1 => decode_value(abi, inner, r, depth + 1),
            flag => Err(SerializationError::invalid(
                type_name,
                format!("invalid presence flag {}", flag),
            )),
        },
        TypeKind::Extension(inner) | TypeKind::Alias(inner) => {
            decode_value(abi, inner, r, depth + 1)
        }
        TypeKind::Struct(structure) => {
            let mut out = Map::new();
            for field in abi.struct_fields(structure)? {
                if field.type_name.ends_with('$') && r.is_empty() {
                    break;
                }
                let value = decode_value(abi, &field.type_name, r, depth + 1)?;
                out.insert(field.name.clone(), value);
            }
            Ok(Value::Object(out))
        }
        TypeKind::Variant(alternatives) => {
            let index = r.read_varuint32(type_name)? as usize;
            let alternative = alternatives.get(index).ok_or_else(|| {
                SerializationError::InvalidVariant {
                    variant: type_name.to_string(),
                    alternative: index.to_string(),
                }
            })?;
            let inner = decode_value(abi, alternative, r, depth + 1)?;
            Ok(json!([alternative, inner]))
        }
    }
}

/// Fewest bytes a value of `type_name` can encode to.
///
/// Empty structs and `T[0]` encode to nothing. Unresolvable types count as one
/// byte; decoding them fails anyway.
fn min_encoded_size(abi: &Abi, type_name: &str, depth: usize) -> usize {
    if depth > MAX_TYPE_DEPTH {
        return 0;
    }
    let Ok(descriptor) = abi.resolve(type_name) else {
        return 1;
    };
    match descriptor.kind {
        TypeKind::Builtin(_)
        | TypeKind::Array(_)
        | TypeKind::Optional(_)
        | TypeKind::Variant(_) => 1,
        TypeKind::FixedArray(inner, len) => {
            len.saturating_mul(min_encoded_size(abi, inner, depth + 1))
        }
        TypeKind::Extension(inner) | TypeKind::Alias(inner) => {
            min_encoded_size(abi, inner, depth + 1)
        }
        TypeKind::Struct(structure) => match abi.struct_fields(structure) {
            Ok(fields) => fields
                .iter()
                .filter(|field| !field.type_name.ends_with('$'))
                .map(|field| min_encoded_size(abi, &field.type_name, depth + 1))
                .fold(0, usize::saturating_add),
            Err(_) => 1,
        },
    }
}

fn read_asset(type_name: &str, r: &mut ByteReader<'_>) -> Result<Asset, SerializationError> {
    let amount = r.read_u64(type_name)? as i64;
    let symbol = Symbol::from_u64(r.read_u64(type_name)?)
        .map_err(|e| SerializationError::invalid(type_name, e.to_string()))?;
    Ok(Asset::new(amount, symbol))
}

fn float_value(type_name: &str, v: f64) -> Result<Value, SerializationError> {
    Number::from_f64(v)
        .map(Value::Number)
        .ok_or_else(|| SerializationError::invalid(type_name, "non-finite float"))
}

fn decode_builtin(
    builtin: BuiltinType,
    type_name: &str,
    r: &mut ByteReader<'_>,
) -> Result<Value, SerializationError> {
    use BuiltinType as B;

    let key_error = |e: crate::error::ParseKeyError| SerializationError::invalid(type_name, e.to_string());

    Ok(match builtin {
        B::Bool => match r.read_u8(type_name)? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => {
                return Err(SerializationError::invalid(
                    type_name,
                    format!("invalid boolean byte {}", other),
                ));
            }
        },
        B::Int8 => Value::from(r.read_u8(type_name)? as i8),
        B::Uint8 => Value::from(r.read_u8(type_name)?),
        B::Int16 => Value::from(r.read_u16(type_name)? as i16),
        B::Uint16 => Value::from(r.read_u16(type_name)?),
        B::Int32 => Value::from(r.read_u32(type_name)? as i32),
        B::Uint32 => Value::from(r.read_u32(type_name)?),
        B::Int64 => Value::from(r.read_u64(type_name)? as i64),
        B::Uint64 => Value::from(r.read_u64(type_name)?),
        B::Int128 => Value::String((r.read_u128(type_name)? as i128).to_string()),
        B::Uint128 => Value::String(r.read_u128(type_name)?.to_string()),
        B::VarInt32 => Value::from(r.read_varint32(type_name)?),
        B::VarUint32 => Value::from(r.read_varuint32(type_name)?),
        B::Float32 => float_value(type_name, f32::from_bits(r.read_u32(type_name)?) as f64)?,
        B::Float64 => float_value(type_name, f64::from_bits(r.read_u64(type_name)?))?,
        B::Float128 => Value::String(hex::encode(r.read_raw(16, type_name)?)),
        B::TimePoint => Value::String(TimePoint::from_micros(r.read_u64(type_name)? as i64).to_string()),
        B::TimePointSec => Value::String(TimePointSec::from_secs(r.read_u32(type_name)?).to_string()),
        B::BlockTimestamp => {
            Value::String(BlockTimestamp::from_slot(r.read_u32(type_name)?).to_string())
        }
        B::Name => Value::String(Name::from_u64(r.read_u64(type_name)?).to_string()),
        B::Bytes => Value::String(hex::encode(r.read_bytes(type_name)?)),
        B::String => {
            let bytes = r.read_bytes(type_name)?;
            let s = std::str::from_utf8(bytes)
                .map_err(|e| SerializationError::invalid(type_name, e.to_string()))?;
            Value::String(s.to_string())
        }
        B::Checksum160 => Value::String(hex::encode(r.read_raw(20, type_name)?)),
        B::Checksum256 => Value::String(hex::encode(r.read_raw(32, type_name)?)),
        B::Checksum512 => Value::String(hex::encode(r.read_raw(64, type_name)?)),
        B::PublicKey => {
            let key = PublicKey::from_packed(r.read_raw(34, type_name)?).map_err(key_error)?;
            Value::String(key.to_string())
        }
        B::Signature => {
            let sig = Signature::from_packed(r.read_raw(66, type_name)?).map_err(key_error)?;
            Value::String(sig.to_string())
        }
        B::Symbol => {
            let symbol = Symbol::from_u64(r.read_u64(type_name)?)
                .map_err(|e| SerializationError::invalid(type_name, e.to_string()))?;
            Value::String(symbol.to_string())
        }
        B::SymbolCode => Value::String(SymbolCode::from_u64(r.read_u64(type_name)?).to_string()),
        B::Asset => Value::String(read_asset(type_name, r)?.to_string()),
        B::ExtendedAsset => {
            let quantity = read_asset(type_name, r)?;
            let contract = Name::from_u64(r.read_u64(type_name)?);
            json!({
                "quantity": quantity.to_string(),
                "contract": contract.to_string(),
            })
        }
    })
}
