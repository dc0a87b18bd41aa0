pub mod callback_token;
pub mod error;
pub mod response;
pub mod retry;
