pub mod credentials;

pub use credentials::print_credentials;
