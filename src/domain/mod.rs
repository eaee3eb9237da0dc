pub mod bump;
pub mod status;
pub mod version;

pub use bump::Bump;
pub use status::TaskStatus;
pub use version::Version;
