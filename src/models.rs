//! SunSpec model definitions.
//!
//! A [`ModelDefinition`] ties a SunSpec model id to a [`FieldLayout`] that
//! starts at the block header (`ID`, `L`). Device-specific tables are supplied
//! by the caller through a [`ModelRegistry`]; only the common model (id 1),
//! which every SunSpec device carries first, ships with the crate.
//!
//! # Example
//!
//! ```
//! use sunspec_modbus::{FieldLayout, ModelDefinition, ModelRegistry, COMMON_MODEL_ID};
//!
//! let mut registry = ModelRegistry::with_common_model();
//! assert!(registry.get(COMMON_MODEL_ID).is_some());
//!
//! let nameplate = FieldLayout::from_entries([
//!     (0, "ID", "uint16", 1),
//!     (1, "L", "uint16", 1),
//!     (2, "DERTyp", "enum16", 1),
//! ]).unwrap();
//! registry.register(ModelDefinition::new(120, "nameplate", nameplate));
//! assert_eq!(registry.len(), 2);
//! ```

use std::borrow::Cow;
use std::collections::HashMap;

use crate::layout::{Field, FieldLayout, FieldType};

/// Model id of the SunSpec common model.
pub const COMMON_MODEL_ID: u16 = 1;

static COMMON_MODEL_FIELDS: &[Field] = &[
    Field::new(0, "ID", FieldType::Uint16, 1),
    Field::new(1, "L", FieldType::Uint16, 1),
    Field::new(2, "Mn", FieldType::String, 16),
    Field::new(18, "Md", FieldType::String, 16),
    Field::new(34, "Opt", FieldType::String, 8),
    Field::new(42, "Vr", FieldType::String, 8),
    Field::new(50, "SN", FieldType::String, 16),
    Field::new(66, "DA", FieldType::Uint16, 1),
    Field::new(67, "Pad", FieldType::Pad, 1),
];

/// Layout of the SunSpec common model, header included.
pub fn common_model() -> FieldLayout {
    FieldLayout::from_static(COMMON_MODEL_FIELDS)
}

/// A SunSpec model: id, group name and field layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    /// SunSpec model id.
    pub id: u16,
    /// Group name, used to prefix decoded field names.
    pub name: Cow<'static, str>,
    /// Field layout starting at the block header.
    pub layout: FieldLayout,
}

impl ModelDefinition {
    /// Creates a model definition.
    pub fn new(id: u16, name: impl Into<Cow<'static, str>>, layout: FieldLayout) -> Self {
        Self {
            id,
            name: name.into(),
            layout,
        }
    }

    /// The common model (id 1).
    pub fn common() -> Self {
        Self::new(COMMON_MODEL_ID, "common", common_model())
    }
}

/// Model definitions keyed by model id.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<u16, ModelDefinition>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the common model.
    pub fn with_common_model() -> Self {
        let mut registry = Self::new();
        registry.register(ModelDefinition::common());
        registry
    }

    /// Adds a definition, returning the one it replaces.
    pub fn register(&mut self, model: ModelDefinition) -> Option<ModelDefinition> {
        self.models.insert(model.id, model)
    }

    /// Looks up a definition by model id.
    pub fn get(&self, id: u16) -> Option<&ModelDefinition> {
        self.models.get(&id)
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns whether no model is registered.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_model_spans_block() {
        // 66 registers of body plus the two header registers
        let layout = common_model();
        assert_eq!(layout.register_count(), 68);
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn test_common_model_offsets_are_contiguous() {
        let layout = common_model();
        let fields = layout.fields();
        for pair in fields.windows(2) {
            assert_eq!(pair[0].end(), u32::from(pair[1].offset), "gap after {}", pair[0].name);
        }
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ModelRegistry::with_common_model();
        let replaced = registry.register(ModelDefinition::new(
            COMMON_MODEL_ID,
            "custom",
            common_model(),
        ));
        assert_eq!(replaced.unwrap().name, "common");
        assert_eq!(registry.get(COMMON_MODEL_ID).unwrap().name, "custom");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_registry() {
        let registry = ModelRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(COMMON_MODEL_ID).is_none());
    }
}
