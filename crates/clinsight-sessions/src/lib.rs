pub mod decode;
pub mod error;
pub mod source;
pub mod store;
pub mod types;

pub use decode::{decode_record, parse_day};
pub use error::SessionsError;
pub use source::{HttpSessionSource, SessionSource, DEFAULT_SESSIONS_URL};
pub use store::{clinic_bounds, SessionStore};
pub use types::{Bounds, Clinic, Gender, LatLng, Session, SessionHistograms, UserType};
