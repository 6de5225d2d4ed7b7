mod bridge;
mod drivers;
mod router;
mod store;

pub use bridge::{
    delete_token_file, generate_token, read_port_file, read_token_file, serve, token_file_path,
    write_token_file, BridgeHandle, BridgeServer, ExtensionEvents, PROTOCOL_VERSION,
};
pub use drivers::{BridgeBrowserOps, BridgePageDriver};
pub use router::{BrowserOps, ContextInfo, Relay};
pub use store::VarStore;
