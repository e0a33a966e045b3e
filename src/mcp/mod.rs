pub mod server;

pub use server::{OntomapServer, run_server};
