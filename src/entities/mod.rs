// Entity Models
// Fixed vocabularies shared by every source: what kind of unit a park is,
// and which states it lies in.

pub mod designation;
pub mod state;

pub use designation::Designation;
pub use state::StateRegistry;
