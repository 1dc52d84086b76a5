//! The entity traits: dynamic attribute access for the engine, static
//! declaration for the caller.
//!
//! There is no field reflection here. Every persistent type implements
//! [`Entity`] by hand (or through caller-side codegen), switching on the
//! attribute name, and [`Schema`] to declare its descriptor once. The engine
//! only ever sees `dyn Entity` plus the descriptor; the concrete type comes
//! back out through the `Any` plumbing at the facade.

use std::any::Any;

use crate::error::Result;
use crate::schema::EntityDescriptor;
use crate::value::Value;

/// Object-safe dynamic access to one entity instance.
///
/// All accessors take attribute names as declared in the descriptor, not
/// column names. Unknown names return [`Error::UnknownAttribute`]; accessing
/// a relation attribute through the scalar accessors (or vice versa) is
/// likewise an error.
///
/// [`Error::UnknownAttribute`]: crate::error::Error::UnknownAttribute
pub trait Entity: Any {
    /// Read a scalar attribute. Unset optionals read as [`Value::Null`].
    fn get(&self, attribute: &str) -> Result<Value>;

    /// Write a scalar attribute. Implementations convert through
    /// [`Value::convert`] so loosely-typed row values land in typed fields.
    fn set(&mut self, attribute: &str, value: Value) -> Result<()>;

    /// Borrow the nested entity of a to-one attribute, if present.
    fn to_one(&self, attribute: &str) -> Result<Option<&dyn Entity>>;

    /// Mutably borrow the nested entity of a to-one attribute, if present.
    fn to_one_mut(&mut self, attribute: &str) -> Result<Option<&mut dyn Entity>>;

    /// Store `child` as the to-one value and return the stored instance.
    fn attach_one(&mut self, attribute: &str, child: Box<dyn Entity>) -> Result<&mut dyn Entity>;

    /// Borrow every element of a to-many attribute.
    fn to_many(&self, attribute: &str) -> Result<Vec<&dyn Entity>>;

    /// Mutably borrow every element of a to-many attribute.
    fn to_many_mut(&mut self, attribute: &str) -> Result<Vec<&mut dyn Entity>>;

    /// Append `child` to a to-many attribute and return the stored instance.
    fn attach_many(&mut self, attribute: &str, child: Box<dyn Entity>) -> Result<&mut dyn Entity>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl dyn Entity {
    /// Downcast a boxed entity back to its concrete type.
    pub fn downcast<T: Entity>(self: Box<Self>) -> std::result::Result<Box<T>, Box<dyn Any>> {
        self.into_any().downcast::<T>()
    }
}

/// Declares the descriptor of a persistent type. Implemented once per type;
/// the engine memoizes the result via [`descriptor_of`].
///
/// [`descriptor_of`]: crate::schema::descriptor_of
pub trait Schema: Entity + Default + Sized + 'static {
    fn declare() -> Result<EntityDescriptor>;
}
