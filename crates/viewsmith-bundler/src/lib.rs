pub mod adapter;
pub mod command;
pub mod transform;

pub use adapter::{BuildError, BundleRequest, Bundler};
pub use command::CommandBundler;
pub use transform::Transform;
