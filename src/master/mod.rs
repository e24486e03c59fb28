mod peers_list;
mod server;

pub use peers_list::*;
pub use server::*;
