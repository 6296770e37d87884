//! Value objects - Immutable objects defined by their attributes

mod names;
mod status;

pub use names::GameTitle;
pub use status::{
    apply_status_changes, is_percentage_attribute, StatusChange, StatusOp, StatusState,
    PERCENT_MAX, PERCENT_MIN,
};
