pub mod replay;
pub mod stats;
pub mod study;
pub mod view;

pub use stats::{StatsScope, StudyReport};
pub use study::{StudyService, SubmitOutcome};
pub use view::{CardView, SessionStart, SessionView};
