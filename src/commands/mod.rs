mod handle;
pub use handle::handle;

mod transit;
pub use transit::transit;
