pub mod palette;
pub mod raw;
pub mod record;

pub use palette::{color_for_call_type, CallTypeCatalog, Rgb};
pub use raw::{RawDispatchCall, RawPoint, RecordRejection};
pub use record::{DispatchRecord, GeoPoint, Priority};
