//! Macros for wiring business types into the engine.

/// Implement [`TransactedObject`](crate::transaction::TransactedObject) for a
/// struct that keeps its id in an `Option<ObjectId>` field and its version in
/// an `Option<String>` field.
///
/// # Example
///
/// ```
/// use objtx::core::ObjectId;
/// use objtx::transaction::TransactedObject;
///
/// struct Vertrag {
///     oid: Option<ObjectId>,
///     stand: Option<String>,
/// }
///
/// objtx::transacted_object!(Vertrag { id: oid, version: stand });
///
/// let mut vertrag = Vertrag { oid: None, stand: None };
/// vertrag.set_object_id(ObjectId::new("vertrag", "nummer", "7"));
/// assert_eq!(vertrag.object_id().unwrap().field("nummer"), Some("7"));
/// ```
#[macro_export]
macro_rules! transacted_object {
    ($name:ident { id: $id:ident, version: $version:ident $(,)? }) => {
        impl $crate::transaction::TransactedObject for $name {
            fn object_id(&self) -> Option<$crate::core::ObjectId> {
                self.$id.clone()
            }

            fn set_object_id(&mut self, object_id: $crate::core::ObjectId) {
                self.$id = Some(object_id);
            }

            fn version(&self) -> Option<String> {
                self.$version.clone()
            }

            fn set_version(&mut self, version: String) {
                self.$version = Some(version);
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }
    };
}
