// Network adapter modules split by node sockets vs object management routes.

pub mod client;
pub mod internal;

pub use client::{spawn_object_serializer, ws_handler};
pub use internal::{create_object_handler, delete_object_handler};
