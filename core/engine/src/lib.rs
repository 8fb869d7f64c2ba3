pub mod clock;
pub mod error;
pub mod normalizer;
pub mod scheduler;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{NormalizeError, ScheduleError};
pub use normalizer::{normalize, normalize_as, strip_code_fence, with_json_instruction, JSON_INSTRUCTION};
pub use scheduler::{due_for_review, ReviewScheduler, Scheduled, DEFAULT_INTERVALS};
