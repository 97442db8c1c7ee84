pub mod directory;
pub mod list;

pub use directory::DirectoryPlugin;
pub use list::ListPlugin;
