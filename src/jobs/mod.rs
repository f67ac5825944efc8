pub mod table;

pub use table::{JobReporter, JobTable};
