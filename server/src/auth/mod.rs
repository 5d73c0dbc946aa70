//! Authentication: Telegram WebApp login verification and the short-lived
//! bearer tokens the rest of the API consumes.

pub mod token;
pub mod webapp;

pub use token::{generate_token, parse_token, Claims, TokenError, TOKEN_ISSUER};
pub use webapp::{validate_init_data, InitDataError, InitDataFields, DEFAULT_INIT_DATA_MAX_AGE};
