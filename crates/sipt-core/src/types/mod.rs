pub mod date;
pub mod method;
pub mod status;
pub mod uri;
pub mod via;

pub use date::HttpDate;
pub use method::Method;
pub use status::StatusCode;
pub use uri::Uri;
pub use via::ViaEntry;
