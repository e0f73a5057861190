//! Capability surface business objects expose to the engine.

use crate::core::ObjectId;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a live business object.
///
/// The engine keeps these to resolve ids back to instances. Objects are
/// single-owner and single-threaded, like the transactions themselves.
pub type ObjectRef = Rc<RefCell<dyn TransactedObject>>;

/// What the engine needs from a participating object: its id and version.
///
/// Everything else about the object stays opaque. Use the
/// [`transacted_object!`](crate::transacted_object) macro to implement it for
/// a struct with an id field and a version field.
pub trait TransactedObject: Any {
    /// Current id; `None` until one has been assigned.
    fn object_id(&self) -> Option<ObjectId>;

    /// Adopt a new id.
    fn set_object_id(&mut self, object_id: ObjectId);

    /// Current version stamp.
    fn version(&self) -> Option<String>;

    fn set_version(&mut self, version: String);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Wrap a concrete object into an [`ObjectRef`].
pub fn object_ref<T: TransactedObject>(object: T) -> ObjectRef {
    Rc::new(RefCell::new(object))
}

pub(crate) fn id_of(object: &ObjectRef) -> Option<ObjectId> {
    object.borrow().object_id()
}

pub(crate) fn version_of(object: &ObjectRef) -> Option<String> {
    object.borrow().version()
}
