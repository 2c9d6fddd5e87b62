mod blob;
mod geom_type;
mod scaling;
mod value;

pub use blob::Blob;
pub use geom_type::GeomType;
pub use scaling::Scaling;
pub use value::{AttributeValue, PropertyValue};
