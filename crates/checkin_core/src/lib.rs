pub mod error;
pub mod format;
pub mod interval;
pub mod model;
pub mod snapshot;
pub mod status;
pub mod storage;
pub mod store;
pub mod undo;
pub mod view;

pub use crate::error::{TrackerError, ValidationError};
pub use crate::model::{parse_labels, CheckIn, FrequencyUnit, Task};
pub use crate::status::Severity;
pub use crate::store::{ItemStore, ItemStoreBuilder, Mutation};
