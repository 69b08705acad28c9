pub mod directory;
pub mod identity;
pub mod reconciler;

pub use crate::domain::model::{CommittedGroup, GroupRecord, GroupView, Student};
pub use crate::domain::ports::{KeySource, RecordStore};
pub use crate::utils::error::Result;
