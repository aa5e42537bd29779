//! Contract ABIs: definitions, type resolution, binary encoding and the per-account cache.
//!
//! # Example
//!
//! ```
//! use antelope_kit::abi::{Abi, AbiDefinition};
//! use serde_json::json;
//!
//! let definition: AbiDefinition = serde_json::from_value(json!({
//!     "version": "eosio::abi/1.2",
//!     "structs": [{
//!         "name": "greet",
//!         "base": "",
//!         "fields": [{"name": "who", "type": "name"}, {"name": "times", "type": "uint8"}]
//!     }],
//!     "actions": [{"name": "greet", "type": "greet", "ricardian_contract": ""}]
//! }))
//! .unwrap();
//!
//! let abi = Abi::new(definition);
//! let bytes = abi.encode("greet", &json!({"who": "alice", "times": 3})).unwrap();
//! assert_eq!(bytes.len(), 9);
//! assert_eq!(abi.decode("greet", &bytes).unwrap()["times"], 3);
//! ```

mod codec;
mod definition;
mod descriptor;
mod registry;
pub mod serializer;

pub use codec::{decode, encode};
pub use definition::{
    AbiAction, AbiActionResult, AbiClause, AbiDefinition, AbiErrorMessage, AbiField, AbiStruct,
    AbiTable, AbiTypeDef, AbiVariant,
};
pub use descriptor::{Abi, BuiltinType, MAX_TYPE_DEPTH, TypeDescriptor, TypeKind};
pub use registry::AbiRegistry;
