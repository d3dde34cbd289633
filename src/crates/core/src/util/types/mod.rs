pub mod answer;
pub mod document;
pub mod question;
pub mod step;

pub use answer::*;
pub use document::*;
pub use question::*;
pub use step::*;
