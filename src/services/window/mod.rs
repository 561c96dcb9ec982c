pub mod sliding;

pub use sliding::SlidingWindow;
