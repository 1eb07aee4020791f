//! Type system shared by every MGen backend
//!
//! This crate defines the abstract source types the frontend infers
//! (`Type`), the per-target concrete type descriptors the emitters consume
//! (`TypeDescriptor`), and the registry that maps one to the other
//! (`TargetTypeRegistry`).

pub mod descriptor;
pub mod registry;
pub mod types;

pub use descriptor::TypeDescriptor;
pub use registry::TargetTypeRegistry;
pub use types::{ScalarType, Target, Type};
