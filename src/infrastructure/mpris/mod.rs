//! MPRIS infrastructure module

mod source;

pub use source::{
    apply_entry, bus_name, event_from_changes, metadata_from_value, MprisEventSource,
};
