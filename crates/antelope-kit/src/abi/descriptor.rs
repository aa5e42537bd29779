//! Compiled ABI and type descriptors.

use std::collections::HashMap;

use super::definition::{AbiDefinition, AbiStruct};
use crate::error::SerializationError;
use crate::types::Name;

/// Maximum alias / nesting depth followed while resolving or encoding a type.
pub const MAX_TYPE_DEPTH: usize = 32;

/// Built-in types every ABI can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Int128,
    Uint128,
    VarInt32,
    VarUint32,
    Float32,
    Float64,
    Float128,
    TimePoint,
    TimePointSec,
    BlockTimestamp,
    Name,
    Bytes,
    String,
    Checksum160,
    Checksum256,
    Checksum512,
    PublicKey,
    Signature,
    Symbol,
    SymbolCode,
    Asset,
    ExtendedAsset,
}

impl BuiltinType {
    /// Look up a built-in type by its ABI name.
    pub fn from_name(name: &str) -> Option<Self> {
        use BuiltinType::*;
        Some(match name {
            "bool" => Bool,
            "int8" => Int8,
            "uint8" => Uint8,
            "int16" => Int16,
            "uint16" => Uint16,
            "int32" => Int32,
            "uint32" => Uint32,
            "int64" => Int64,
            "uint64" => Uint64,
            "int128" => Int128,
            "uint128" => Uint128,
            "varint32" => VarInt32,
            "varuint32" => VarUint32,
            "float32" => Float32,
            "float64" => Float64,
            "float128" => Float128,
            "time_point" => TimePoint,
            "time_point_sec" => TimePointSec,
            "block_timestamp_type" => BlockTimestamp,
            "name" => Name,
            "bytes" => Bytes,
            "string" => String,
            "checksum160" => Checksum160,
            "checksum256" => Checksum256,
            "checksum512" => Checksum512,
            "public_key" => PublicKey,
            "signature" => Signature,
            "symbol" => Symbol,
            "symbol_code" => SymbolCode,
            "asset" => Asset,
            "extended_asset" => ExtendedAsset,
            _ => return None,
        })
    }
}

/// What a type name denotes, one resolution step deep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind<'a> {
    Builtin(BuiltinType),
    /// `T[]`
    Array(&'a str),
    /// `T[N]`
    FixedArray(&'a str, usize),
    /// `T?`
    Optional(&'a str),
    /// `T$`: a trailing struct field that may be absent.
    Extension(&'a str),
    Struct(&'a AbiStruct),
    /// Alternative type names, indexed by position.
    Variant(&'a [String]),
    /// `typedef`
    Alias(&'a str),
}

/// A named type and its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor<'a> {
    pub name: &'a str,
    pub kind: TypeKind<'a>,
}

/// A contract ABI indexed for lookups.
///
/// Cheap to share behind an `Arc`; all lookups borrow from the definition.
#[derive(Debug, Clone)]
pub struct Abi {
    definition: AbiDefinition,
    aliases: HashMap<String, usize>,
    structs: HashMap<String, usize>,
    variants: HashMap<String, usize>,
    actions: HashMap<Name, usize>,
    tables: HashMap<Name, usize>,
}

impl Abi {
    /// Index a definition.
    pub fn new(definition: AbiDefinition) -> Self {
        fn index<T, K: std::hash::Hash + Eq>(
            items: &[T],
            key: impl Fn(&T) -> K,
        ) -> HashMap<K, usize> {
            items.iter().enumerate().map(|(i, t)| (key(t), i)).collect()
        }

        Self {
            aliases: index(&definition.types, |t| t.new_type_name.clone()),
            structs: index(&definition.structs, |s| s.name.clone()),
            variants: index(&definition.variants, |v| v.name.clone()),
            actions: index(&definition.actions, |a| a.name),
            tables: index(&definition.tables, |t| t.name),
            definition,
        }
    }

    /// The underlying definition.
    pub fn definition(&self) -> &AbiDefinition {
        &self.definition
    }

    /// Payload type of an action, if the contract declares it.
    pub fn action_type(&self, action: Name) -> Option<&str> {
        self.actions
            .get(&action)
            .map(|&i| self.definition.actions[i].type_name.as_str())
    }

    /// Row type of a table, if the contract declares it.
    pub fn table_type(&self, table: Name) -> Option<&str> {
        self.tables
            .get(&table)
            .map(|&i| self.definition.tables[i].type_name.as_str())
    }

    /// Look up a struct by name.
    pub fn get_struct(&self, name: &str) -> Option<&AbiStruct> {
        self.structs.get(name).map(|&i| &self.definition.structs[i])
    }

    /// Describe `type_name` one step deep (aliases are not followed).
    pub fn describe<'a>(&'a self, type_name: &'a str) -> Result<TypeDescriptor<'a>, SerializationError> {
        let kind = if let Some(inner) = type_name.strip_suffix('$') {
            TypeKind::Extension(inner)
        } else if let Some(inner) = type_name.strip_suffix('?') {
            TypeKind::Optional(inner)
        } else if let Some(inner) = type_name.strip_suffix("[]") {
            TypeKind::Array(inner)
        } else if let Some((inner, len)) = parse_fixed_array(type_name) {
            TypeKind::FixedArray(inner, len)
        } else if let Some(builtin) = BuiltinType::from_name(type_name) {
            TypeKind::Builtin(builtin)
        } else if let Some(&i) = self.aliases.get(type_name) {
            TypeKind::Alias(&self.definition.types[i].type_name)
        } else if let Some(&i) = self.structs.get(type_name) {
            TypeKind::Struct(&self.definition.structs[i])
        } else if let Some(&i) = self.variants.get(type_name) {
            TypeKind::Variant(&self.definition.variants[i].types)
        } else {
            return Err(SerializationError::UnknownType(type_name.to_string()));
        };

        Ok(TypeDescriptor {
            name: type_name,
            kind,
        })
    }

    /// Describe `type_name`, following aliases.
    pub fn resolve<'a>(&'a self, type_name: &'a str) -> Result<TypeDescriptor<'a>, SerializationError> {
        let mut current = type_name;
        for _ in 0..MAX_TYPE_DEPTH {
            let descriptor = self.describe(current)?;
            match descriptor.kind {
                TypeKind::Alias(target) => current = target,
                _ => return Ok(descriptor),
            }
        }
        Err(SerializationError::RecursionLimit(type_name.to_string()))
    }

    /// All fields of a struct, base fields first.
    pub fn struct_fields<'a>(
        &'a self,
        structure: &'a AbiStruct,
    ) -> Result<Vec<&'a super::definition::AbiField>, SerializationError> {
        let mut chain = vec![structure];
        let mut current = structure;
        while !current.base.is_empty() {
            if chain.len() > MAX_TYPE_DEPTH {
                return Err(SerializationError::RecursionLimit(structure.name.clone()));
            }
            current = match self.resolve(&current.base)?.kind {
                TypeKind::Struct(base) => base,
                _ => {
                    return Err(SerializationError::invalid(
                        &structure.name,
                        format!("base '{}' is not a struct", current.base),
                    ));
                }
            };
            chain.push(current);
        }
        Ok(chain
            .iter()
            .rev()
            .flat_map(|s| s.fields.iter())
            .collect())
    }
}

impl From<AbiDefinition> for Abi {
    fn from(definition: AbiDefinition) -> Self {
        Self::new(definition)
    }
}

fn parse_fixed_array(type_name: &str) -> Option<(&str, usize)> {
    let body = type_name.strip_suffix(']')?;
    let (inner, len) = body.rsplit_once('[')?;
    Some((inner, len.parse().ok()?))
}
