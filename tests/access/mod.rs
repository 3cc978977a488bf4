mod error_disclosure;
mod permission;
mod session;
