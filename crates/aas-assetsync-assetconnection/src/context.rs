//! Model lookups available to protocol providers.

use aas_assetsync_core::{Reference, SubmodelElement, TypeInfo};

/// Read access to the model, used by providers to interpret raw payloads.
pub trait ServiceContext: Send + Sync {
    /// Declared value type of the element at `reference`.
    fn type_info(&self, reference: &Reference) -> Option<TypeInfo>;

    /// Declared output variables of the operation at `reference`.
    fn operation_output_variables(&self, reference: &Reference) -> Option<Vec<SubmodelElement>>;
}
